//! Development hub.
//!
//! Instead of a public webhook, a development instance can receive Telegram
//! updates relayed over Redis pub/sub on `<hub_namespace>:<secret>`. Each
//! payload is the JSON update as Telegram posted it.

use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use shared::telegram::Update;

use crate::dispatch::{Dispatcher, InboundMessage};

/// Subscribe to `channel` and dispatch every update until the connection ends.
pub async fn run(client: redis::Client, channel: String, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(&channel).await?;
    tracing::info!(channel = %channel, "hub subscribed");

    let mut messages = pubsub.on_message();
    while let Some(msg) = messages.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("hub payload is not text: {}", e);
                continue;
            }
        };

        if let Some(message) = decode(&channel, msg.get_channel_name(), &payload) {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher.handle(&message).await;
            });
        }
    }

    tracing::warn!(channel = %channel, "hub subscription closed");
    Ok(())
}

fn decode(expected: &str, channel: &str, payload: &str) -> Option<InboundMessage> {
    if channel != expected {
        tracing::warn!(channel, "hub message on unexpected channel");
        return None;
    }

    match serde_json::from_str::<Update>(payload) {
        Ok(update) => InboundMessage::from_update(update),
        Err(e) => {
            tracing::warn!("unparseable hub update: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL: &str = "hub:test-secret";

    fn payload(text: &str) -> String {
        serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 3,
                "from": { "id": 9, "username": "bob" },
                "chat": { "id": 9 },
                "date": 1_700_000_000,
                "text": text
            }
        })
        .to_string()
    }

    #[test]
    fn decodes_update_on_subscribed_channel() {
        let message = decode(CHANNEL, CHANNEL, &payload("/sessions")).unwrap();

        assert_eq!(message.username, "bob");
        assert_eq!(message.name, "bob");
        assert_eq!(message.text, "/sessions");
    }

    #[test]
    fn drops_other_channels() {
        assert!(decode(CHANNEL, "hub:other", &payload("/login")).is_none());
    }

    #[test]
    fn drops_invalid_json() {
        assert!(decode(CHANNEL, CHANNEL, "not json").is_none());
    }
}
