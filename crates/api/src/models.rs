use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Pending login stored in Redis as a hash with the login TTL.
///
/// Field names (`token`, `username`, `name`, `chatId`) are the on-store layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginToken {
    pub token: String,
    pub username: String,
    /// Display name shown in chat replies.
    pub name: String,
    pub chat_id: i64,
}

impl LoginToken {
    pub fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("token".to_string(), self.token.clone()),
            ("username".to_string(), self.username.clone()),
            ("name".to_string(), self.name.clone()),
            ("chatId".to_string(), self.chat_id.to_string()),
        ]
    }

    pub fn from_hash(hash: &HashMap<String, String>) -> Option<Self> {
        let username = hash.get("username")?.clone();
        Some(Self {
            token: hash.get("token")?.clone(),
            name: hash.get("name").cloned().unwrap_or_else(|| username.clone()),
            chat_id: hash.get("chatId")?.parse().ok()?,
            username,
        })
    }
}

/// Web session created by exchanging a login token.
///
/// Stored as a hash keyed by `id` with the session TTL. `started` is epoch millis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub token: String,
    pub username: String,
    pub name: String,
    pub chat_id: i64,
    pub started: i64,
}

impl Session {
    pub fn from_login(id: String, login: LoginToken, started: i64) -> Self {
        Self {
            id,
            token: login.token,
            username: login.username,
            name: login.name,
            chat_id: login.chat_id,
            started,
        }
    }

    pub fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("token".to_string(), self.token.clone()),
            ("username".to_string(), self.username.clone()),
            ("name".to_string(), self.name.clone()),
            ("chatId".to_string(), self.chat_id.to_string()),
            ("started".to_string(), self.started.to_string()),
        ]
    }

    pub fn from_hash(id: &str, hash: &HashMap<String, String>) -> Option<Self> {
        let login = LoginToken::from_hash(hash)?;
        let started = hash.get("started")?.parse().ok()?;
        Some(Self::from_login(id.to_string(), login, started))
    }

    /// Milliseconds since the session was created.
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis - self.started
    }
}
