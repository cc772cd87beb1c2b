//! Shared HTTP request/response types for the authbot routes.

use garde::Validate;
use serde::{Deserialize, Serialize};

/// Path parameters of the login link sent to the user via chat.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginParams {
    /// Telegram username the token was issued to.
    #[garde(pattern(r"^[A-Za-z0-9_]{1,32}$"))]
    pub username: String,
    /// Single-use login token (16 alphanumerics).
    #[garde(length(min = 16, max = 16), pattern(r"^[A-Za-z0-9]+$"))]
    pub token: String,
}

/// Path parameters of the session-check route used by reverse proxies.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SessionParams {
    #[garde(pattern(r"^[A-Za-z0-9_]{1,32}$"))]
    pub username: String,
    /// `<token>_<suffix>`, both 16 alphanumerics.
    #[garde(pattern(r"^[A-Za-z0-9]{16}_[A-Za-z0-9]{16}$"))]
    pub session_id: String,
}

/// Current session info.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub username: String,
    pub name: String,
    /// Granted role, `none` when the user has no role.
    pub role: String,
    pub admin: bool,
    /// Session start, epoch milliseconds.
    pub started: i64,
}
