//! Chat command grammar.
//!
//! ```text
//! /login
//! /logout
//! /sessions
//! /users [#role]
//! /roles [#role]
//! /grant @username #role
//! /revoke @username
//! ```
//!
//! Usernames and roles are lowercase word tokens (`[a-z0-9_]+`). Telegram
//! appends `@botname` to commands picked from the menu in groups; that
//! suffix is ignored.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login,
    /// Terminate the sender's recent sessions.
    Logout,
    ListSessions,
    ListUsers { role: Option<String> },
    ListRoles { role: Option<String> },
    Grant { user: String, role: String },
    Revoke { user: String },
    /// Known command with arguments that don't match its syntax.
    Malformed(Usage),
    Unrecognized,
}

/// Which usage help to reply with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Users,
    Roles,
    Grant,
    Revoke,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let mut words = text.split_whitespace();
        let Some(head) = words.next() else {
            return Command::Unrecognized;
        };
        let name = head.split('@').next().unwrap_or(head);
        let args: Vec<&str> = words.collect();

        match name {
            "/login" => Command::Login,
            "/logout" => Command::Logout,
            "/users" | "/user" => match args.as_slice() {
                [] => Command::ListUsers { role: None },
                [role] => match tagged(role, '#') {
                    Some(role) => Command::ListUsers { role: Some(role) },
                    None => Command::Malformed(Usage::Users),
                },
                _ => Command::Malformed(Usage::Users),
            },
            "/roles" | "/role" => match args.as_slice() {
                [] => Command::ListRoles { role: None },
                [role] => match tagged(role, '#') {
                    Some(role) => Command::ListRoles { role: Some(role) },
                    None => Command::Malformed(Usage::Roles),
                },
                _ => Command::Malformed(Usage::Roles),
            },
            "/grant" => match args.as_slice() {
                [user, role] => match (tagged(user, '@'), tagged(role, '#')) {
                    (Some(user), Some(role)) => Command::Grant { user, role },
                    _ => Command::Malformed(Usage::Grant),
                },
                _ => Command::Malformed(Usage::Grant),
            },
            "/revoke" => match args.as_slice() {
                [user] => match tagged(user, '@') {
                    Some(user) => Command::Revoke { user },
                    None => Command::Malformed(Usage::Revoke),
                },
                _ => Command::Malformed(Usage::Revoke),
            },
            name if name.starts_with("/session") => Command::ListSessions,
            _ => Command::Unrecognized,
        }
    }

    /// Short name used in failure replies, e.g. "the grant command failed".
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login => "login",
            Command::Logout => "logout",
            Command::ListSessions => "sessions",
            Command::ListUsers { .. } | Command::Malformed(Usage::Users) => "users",
            Command::ListRoles { .. } | Command::Malformed(Usage::Roles) => "roles",
            Command::Grant { .. } | Command::Malformed(Usage::Grant) => "grant",
            Command::Revoke { .. } | Command::Malformed(Usage::Revoke) => "revoke",
            Command::Unrecognized => "unknown",
        }
    }

    /// Commands only an admin may run.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Command::ListUsers { .. }
                | Command::ListRoles { .. }
                | Command::Grant { .. }
                | Command::Revoke { .. }
                | Command::Malformed(_)
        )
    }
}

/// `@alice` → `alice` for `sigil = '@'`, if the rest is a lowercase word.
fn tagged(word: &str, sigil: char) -> Option<String> {
    let rest = word.strip_prefix(sigil)?;
    let valid = !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    valid.then(|| rest.to_string())
}
