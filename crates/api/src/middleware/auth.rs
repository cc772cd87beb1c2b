//! Session cookie authentication.
//!
//! Usage: Add `SessionUser` as an extractor parameter to require a live session.
//!
//! ```ignore
//! async fn my_handler(user: SessionUser, ...) -> ... {
//!     // user.session.username is available here
//! }
//! ```

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;

use crate::{models::Session, state::AppState};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "sessionId";

/// Holder of a live session, resolved from the `sessionId` cookie.
pub struct SessionUser {
    pub session: Session,
}

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingSession)?;

        let session = state
            .stores
            .sessions
            .lookup_session(&session_id)
            .await
            .map_err(|e| {
                tracing::error!("session lookup error: {:?}", e);
                AuthError::Unavailable
            })?
            .ok_or(AuthError::InvalidSession)?;

        let max_age = state.config.session_expire as i64 * 1000;
        if session.age_millis(Utc::now().timestamp_millis()) >= max_age {
            return Err(AuthError::InvalidSession);
        }

        Ok(SessionUser { session })
    }
}

pub enum AuthError {
    MissingSession,
    InvalidSession,
    Unavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingSession => (StatusCode::UNAUTHORIZED, "Missing session cookie"),
            AuthError::InvalidSession => (StatusCode::UNAUTHORIZED, "Invalid or expired session"),
            AuthError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Session store unavailable",
            ),
        };

        let body = serde_json::json!({ "error": message });

        (status, Json(body)).into_response()
    }
}
