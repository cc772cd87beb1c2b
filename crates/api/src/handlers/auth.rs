//! Login link exchange and session routes.
//!
//! Flow:
//! 1. User sends `/login` to the bot and receives a link with a single-use token
//! 2. GET /authbot/login/{username}/{token} exchanges the token for a session
//! 3. The session id is set as the `sessionId` cookie and the user is redirected
//! 4. A reverse proxy checks GET /authbot-session/{username}/{sessionId}
//!
//! Security notes:
//! - Telegram's link preview fetcher is refused so it cannot burn the token
//! - Invalid links redirect exactly like expired ones
//! - Tokens are deleted in the same transaction that creates the session

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::{
    TypedHeader,
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::UserAgent,
};
use chrono::Utc;
use garde::Validate;
use shared::api::{LoginParams, MeResponse, SessionParams};
use time::Duration as TimeDuration;

use crate::{
    error::AppError,
    format::escape_html,
    middleware::auth::{SESSION_COOKIE, SessionUser},
    state::AppState,
    stores::{Exchange, NO_ROLE, Rejection},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/{username}/{token}", get(login))
        .route("/logout", get(logout))
        .route("/me", get(get_me))
}

/// Session check for reverse proxies, mounted only when enabled.
pub fn session_router() -> Router<AppState> {
    Router::new().route("/{username}/{session_id}", get(check_session))
}

fn is_link_preview(user_agent: Option<&TypedHeader<UserAgent>>) -> bool {
    user_agent.is_some_and(|TypedHeader(agent)| agent.as_str().starts_with("TelegramBot"))
}

fn session_cookie(state: &AppState, session_id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .domain(state.config.domain.clone())
        .path("/")
        .http_only(true)
        .secure(state.config.is_production())
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::milliseconds(state.config.cookie_expire as i64))
        .build()
}

/// Notify in the background so the redirect is not held up by Telegram.
fn notify_later(state: &AppState, chat_id: i64, text: String) {
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        dispatcher.notify(chat_id, &text).await;
    });
}

#[debug_handler]
async fn login(
    State(state): State<AppState>,
    Path(params): Path<LoginParams>,
    user_agent: Option<TypedHeader<UserAgent>>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if is_link_preview(user_agent.as_ref()) {
        tracing::debug!(username = %params.username, "link preview refused");
        return Err(AppError::External(
            StatusCode::FORBIDDEN,
            "Link previews are not permitted",
        ));
    }

    if let Err(e) = params.validate() {
        tracing::warn!(username = %params.username, "invalid login link: {}", e);
        return Ok(Redirect::to(&state.config.redirect_no_auth).into_response());
    }

    let session = match state
        .stores
        .sessions
        .exchange_token(&params.username, &params.token)
        .await?
    {
        Exchange::Created(session) => session,
        Exchange::Rejected(Rejection::NotFound) => {
            tracing::info!(username = %params.username, "login token not found");
            return Ok(Redirect::to(&state.config.redirect_no_auth).into_response());
        }
        Exchange::Rejected(Rejection::Mismatch) => {
            tracing::warn!(username = %params.username, "login token mismatch");
            return Ok(Redirect::to(&state.config.redirect_no_auth).into_response());
        }
    };

    tracing::info!(username = %session.username, "logged in");

    notify_later(
        &state,
        session.chat_id,
        format!("Thanks {}, you have logged in.", escape_html(&session.name)),
    );

    let jar = jar.add(session_cookie(&state, session.id));

    Ok((jar, Redirect::to(&state.config.redirect_auth)).into_response())
}

#[debug_handler]
async fn logout(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|id| !id.is_empty());

    if let Some(session_id) = session_id {
        if let Some(session) = state.stores.sessions.terminate_session(&session_id).await? {
            state
                .stores
                .sessions
                .delete_login_token(&session.username)
                .await?;

            tracing::info!(username = %session.username, "logged out");

            notify_later(
                &state,
                session.chat_id,
                format!("Thanks {}, you have logged out.", escape_html(&session.name)),
            );
        }
    }

    let removal = Cookie::build((SESSION_COOKIE, ""))
        .domain(state.config.domain.clone())
        .path("/");
    let jar = jar.remove(removal);

    Ok((jar, Redirect::to(&state.config.redirect_no_auth)).into_response())
}

#[debug_handler]
async fn check_session(
    State(state): State<AppState>,
    Path(params): Path<SessionParams>,
) -> Result<impl IntoResponse, AppError> {
    const DENIED: (StatusCode, &str) = (StatusCode::FORBIDDEN, "Access prohibited");

    if params.validate().is_err() {
        return Ok(DENIED);
    }

    let Some(session) = state
        .stores
        .sessions
        .lookup_session(&params.session_id)
        .await?
    else {
        return Ok(DENIED);
    };

    let max_age = state.config.session_expire as i64 * 1000;
    if session.username != params.username
        || session.age_millis(Utc::now().timestamp_millis()) >= max_age
    {
        tracing::debug!(username = %params.username, "session check denied");
        return Ok(DENIED);
    }

    Ok((StatusCode::OK, "Authenticated"))
}

#[debug_handler]
async fn get_me(
    user: SessionUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let session = user.session;
    let role = state.stores.roles.role_of(&session.username).await?;
    let admin = state.stores.roles.is_admin(&session.username).await?;

    Ok(Json(MeResponse {
        username: session.username,
        name: session.name,
        role: role.unwrap_or_else(|| NO_ROLE.to_string()),
        admin,
        started: session.started,
    }))
}
