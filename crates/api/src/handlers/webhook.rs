//! Telegram webhook.
//!
//! Telegram retries deliveries that do not get a 2xx, so every request is
//! answered with an empty 200: a wrong secret or an unparseable update is
//! logged and dropped. Accepted messages are dispatched in the background.

use axum::{
    Router,
    body::Bytes,
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use shared::telegram::Update;

use crate::{dispatch::InboundMessage, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/webhook/{secret}", post(receive_update))
}

#[debug_handler]
async fn receive_update(
    State(state): State<AppState>,
    Path(secret): Path<String>,
    body: Bytes,
) -> StatusCode {
    if secret != state.config.secret {
        tracing::warn!("webhook called with invalid secret");
        return StatusCode::OK;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!("unparseable webhook update: {}", e);
            return StatusCode::OK;
        }
    };

    let update_id = update.update_id;
    let Some(message) = InboundMessage::from_update(update) else {
        tracing::debug!(update_id, "ignoring update without text message");
        return StatusCode::OK;
    };

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        dispatcher.handle(&message).await;
    });

    StatusCode::OK
}
