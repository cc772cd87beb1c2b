//! Shared test utilities for API handler tests.
//!
//! Provides a test configuration and a flexible `TestStateBuilder` for
//! constructing `AppState` instances with only the mocks needed for each test.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::TestStateBuilder;
//!
//! let mut sessions = MockSessionStore::new();
//! sessions.expect_lookup_session().returning(|_| Ok(None));
//!
//! let state = TestStateBuilder::new()
//!     .with_session_store(sessions)
//!     .build();
//! ```
//!
//! Tests that exercise real store semantics use `with_memory_store` instead
//! of mocking the session and role stores.

use std::sync::Arc;

use crate::config::Config;
use crate::models::Session;
use crate::services::MockNotifier;
use crate::state::AppState;
use crate::stores::{
    AtomicStore, MemoryStore, MockAtomicStore, MockRoleStore, MockSessionStore, RoleStore,
    SessionStore, Stores,
};

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 8080,
        redis_url: "redis://test".to_string(),
        namespace: "authbot".to_string(),
        domain: "authdemo.example.com".to_string(),
        bot: "ExAuthDemoBot".to_string(),
        secret: "test-secret".to_string(),
        token: "123:test".to_string(),
        admin: "evan".to_string(),
        login_expire: 30,
        session_expire: 300,
        cookie_expire: 60_000,
        send_timeout: 1_000,
        redirect_auth: "/auth".to_string(),
        redirect_no_auth: "/noauth".to_string(),
        session_route: true,
        telegram_api_url: "http://telegram.test".to_string(),
        hub_redis: None,
        hub_namespace: None,
        env: "test".to_string(),
        sentry_dsn: None,
    }
}

/// Creates a session for `username` started `age_millis` ago.
pub fn mock_session(username: &str, age_millis: i64) -> Session {
    Session {
        id: "AbCdEfGh12345678_ZyXwVuTs98765432".to_string(),
        token: "AbCdEfGh12345678".to_string(),
        username: username.to_string(),
        name: "Alice".to_string(),
        chat_id: 42,
        started: chrono::Utc::now().timestamp_millis() - age_millis,
    }
}

/// A notifier that accepts any message.
pub fn quiet_notifier() -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_send_message().returning(|_, _| Ok(()));
    notifier
}

/// Builder for constructing test `AppState` with custom mocks.
///
/// Uses default (empty) mocks for any store/service not explicitly set.
pub struct TestStateBuilder {
    config: Config,
    memory: Option<Arc<MemoryStore>>,
    atomic_store: Option<MockAtomicStore>,
    session_store: Option<MockSessionStore>,
    role_store: Option<MockRoleStore>,
    notifier: Option<MockNotifier>,
}

impl TestStateBuilder {
    /// Creates a new builder with no mocks configured.
    pub fn new() -> Self {
        Self {
            config: test_config(),
            memory: None,
            atomic_store: None,
            session_store: None,
            role_store: None,
            notifier: None,
        }
    }

    /// Back the session and role stores with an in-memory Redis stand-in.
    pub fn with_memory_store(mut self, memory: Arc<MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_atomic_store(mut self, store: MockAtomicStore) -> Self {
        self.atomic_store = Some(store);
        self
    }

    pub fn with_session_store(mut self, store: MockSessionStore) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn with_role_store(mut self, store: MockRoleStore) -> Self {
        self.role_store = Some(store);
        self
    }

    pub fn with_notifier(mut self, notifier: MockNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Builds the `AppState` using configured mocks or defaults.
    pub fn build(self) -> AppState {
        let mut stores = match self.memory {
            Some(memory) => Stores::new(memory, &self.config),
            None => Stores {
                atomic: Arc::new(MockAtomicStore::new()),
                sessions: Arc::new(MockSessionStore::new()),
                roles: Arc::new(MockRoleStore::new()),
            },
        };
        if let Some(store) = self.atomic_store {
            stores.atomic = Arc::new(store) as Arc<dyn AtomicStore>;
        }
        if let Some(store) = self.session_store {
            stores.sessions = Arc::new(store) as Arc<dyn SessionStore>;
        }
        if let Some(store) = self.role_store {
            stores.roles = Arc::new(store) as Arc<dyn RoleStore>;
        }

        let notifier = Arc::new(self.notifier.unwrap_or_else(MockNotifier::new));

        AppState::new(self.config, stores, notifier)
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
