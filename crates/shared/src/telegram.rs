//! Subset of the Telegram Bot API `Update` object that the bot consumes.
//!
//! See <https://core.telegram.org/bots/api#update>. Unknown fields are ignored.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    /// Absent for edited messages, callback queries and the like.
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    /// Unix time in seconds.
    pub date: i64,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_webhook_payload_ignoring_extra_fields() {
        let json = r#"{
            "update_id": 10000,
            "message": {
                "message_id": 1365,
                "date": 1441645532,
                "chat": {"id": 1111111, "type": "private", "first_name": "Alice"},
                "from": {"id": 1111111, "is_bot": false, "first_name": "Alice", "username": "alice"},
                "text": "/login"
            }
        }"#;

        let update: Update = serde_json::from_str(json).unwrap();
        let message = update.message.unwrap();

        assert_eq!(message.chat.id, 1111111);
        assert_eq!(message.text.as_deref(), Some("/login"));
        assert_eq!(message.from.unwrap().username.as_deref(), Some("alice"));
    }

    #[test]
    fn parses_update_without_message() {
        let update: Update =
            serde_json::from_str(r#"{"update_id": 1, "edited_message": {}}"#).unwrap();

        assert!(update.message.is_none());
    }
}
