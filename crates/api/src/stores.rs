//! Redis-backed stores.
//!
//! Every mutation goes through [`AtomicStore`], which runs a batch of commands
//! inside `MULTI`/`EXEC`. The session and role stores are built on top of it
//! and hold no state of their own.
//!
//! ## Redis Key Patterns
//!
//! ```text
//! {ns}:login:{username}     → LoginToken hash (login TTL)
//! {ns}:session:{id}         → Session hash (session TTL)
//! {ns}:session:{username}   → List of the newest 4 session ids
//! {ns}:user:{username}      → Granted role
//! {ns}:user                 → Set of users with a role
//! {ns}:role                 → Set of roles with members
//! {ns}:role:{role}          → Set of role members
//! ```
//!
//! ## Usage in Handlers
//!
//! ```ignore
//! async fn handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
//!     let session = state.stores.sessions.lookup_session(&session_id).await?;
//!     let admin = state.stores.roles.is_admin(&session.username).await?;
//! }
//! ```

mod atomic;
mod keys;
mod roles;
mod sessions;

pub use atomic::{AtomicStore, Op, RedisAtomicStore};
pub use keys::Keys;
pub use roles::{NO_ROLE, RedisRoleStore, RoleStore};
#[cfg(test)]
pub use roles::ADMIN_ROLE;
pub use sessions::{Exchange, RECENT_SESSIONS, RedisSessionStore, Rejection, SessionStore};

#[cfg(test)]
pub use atomic::{MemoryStore, MockAtomicStore};
#[cfg(test)]
pub use roles::MockRoleStore;
#[cfg(test)]
pub use sessions::MockSessionStore;

use std::sync::Arc;

use crate::config::Config;

/// Collection of all stores.
#[derive(Clone)]
pub struct Stores {
    pub atomic: Arc<dyn AtomicStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub roles: Arc<dyn RoleStore>,
}

impl Stores {
    /// Build the session and role stores over one atomic store.
    pub fn new(atomic: Arc<dyn AtomicStore>, config: &Config) -> Self {
        let keys = Keys::new(&config.namespace);
        Self {
            sessions: Arc::new(RedisSessionStore::new(
                atomic.clone(),
                keys.clone(),
                config.login_expire,
                config.session_expire,
            )),
            roles: Arc::new(RedisRoleStore::new(atomic.clone(), keys, &config.admin)),
            atomic,
        }
    }

    /// Record this process start under `{ns}:started`.
    pub async fn record_start(&self, config: &Config, started: i64) -> anyhow::Result<()> {
        let fields = vec![
            ("started".to_string(), started.to_string()),
            ("pid".to_string(), std::process::id().to_string()),
        ];
        self.atomic
            .execute_atomic(vec![Op::HSet(Keys::new(&config.namespace).started(), fields)])
            .await?;
        Ok(())
    }
}
