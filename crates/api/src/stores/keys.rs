//! Redis key layout, all under the configured namespace.

/// Builds namespaced keys.
#[derive(Debug, Clone)]
pub struct Keys {
    namespace: String,
}

impl Keys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Hash holding the pending login token of `username`.
    pub fn login(&self, username: &str) -> String {
        format!("{}:login:{}", self.namespace, username)
    }

    /// Hash holding one session.
    pub fn session(&self, session_id: &str) -> String {
        format!("{}:session:{}", self.namespace, session_id)
    }

    /// List of the newest session ids of `username`.
    ///
    /// Shares the `session:` prefix with session hashes; usernames are at
    /// most 32 characters and session ids are 33, so they never collide.
    pub fn session_list(&self, username: &str) -> String {
        format!("{}:session:{}", self.namespace, username)
    }

    /// String holding the role granted to `username`.
    pub fn user(&self, username: &str) -> String {
        format!("{}:user:{}", self.namespace, username)
    }

    /// Set of every user with a granted role.
    pub fn users(&self) -> String {
        format!("{}:user", self.namespace)
    }

    /// Set of every role with at least one member.
    pub fn roles(&self) -> String {
        format!("{}:role", self.namespace)
    }

    /// Set of the members of `role`.
    pub fn role(&self, role: &str) -> String {
        format!("{}:role:{}", self.namespace, role)
    }

    /// Hash recording the last process start.
    pub fn started(&self) -> String {
        format!("{}:started", self.namespace)
    }
}
