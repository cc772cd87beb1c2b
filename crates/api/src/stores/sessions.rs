//! Login token and session storage.
//!
//! A login token bridges a Telegram identity to a web session: it is issued
//! over chat, then exchanged exactly once via the login link. The exchange
//! deletes the token in the same atomic batch that creates the session.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use super::atomic::{AtomicStore, Op};
use super::keys::Keys;
use crate::models::{LoginToken, Session};

/// Default number of recent session ids read when listing or terminating.
pub const RECENT_SESSIONS: usize = 6;

/// The per-user session list is trimmed to this many ids.
pub const SESSION_LIST_MAX: usize = 4;

const TOKEN_LEN: usize = 16;
const TOKEN_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Random alphanumeric string from the thread-local CSPRNG.
pub fn generate_token(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| TOKEN_CHARSET[rng.random_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}

/// Outcome of exchanging a login token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exchange {
    Created(Session),
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No pending token with this value: never issued, expired, overwritten
    /// by a newer login, or already used.
    NotFound,
    /// The pending token was issued to a different username.
    Mismatch,
}

/// Whether `id` has the shape of a session id: `<token>_<suffix>`, both 16
/// alphanumerics. Anything else would address a non-session key.
pub fn is_session_id(id: &str) -> bool {
    let bytes = id.as_bytes();
    bytes.len() == 2 * TOKEN_LEN + 1
        && bytes[TOKEN_LEN] == b'_'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == TOKEN_LEN || b.is_ascii_alphanumeric())
}

/// Sessions removed by a bulk logout. Times are epoch millis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionsTerminated {
    pub count: usize,
    pub newest_started: Option<i64>,
    pub oldest_started: Option<i64>,
}

/// Store for the token/session lifecycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Issue a login token for `username`, replacing any pending one.
    async fn issue_login_token(&self, username: &str, name: &str, chat_id: i64) -> Result<String>;

    /// Exchange a pending login token for a new session.
    async fn exchange_token(&self, username: &str, token: &str) -> Result<Exchange>;

    /// Get a live session.
    async fn lookup_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Delete a session, returning it if it was live.
    async fn terminate_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Delete any pending login token of `username`.
    async fn delete_login_token(&self, username: &str) -> Result<()>;

    /// Live sessions among the newest `limit` ids, newest first.
    async fn list_recent_sessions(&self, username: &str, limit: usize) -> Result<Vec<Session>>;

    /// Delete the newest `limit` sessions of `username`.
    async fn terminate_recent_sessions(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<SessionsTerminated>;
}

/// SessionStore on top of atomic Redis batches.
#[derive(Clone)]
pub struct RedisSessionStore {
    store: Arc<dyn AtomicStore>,
    keys: Keys,
    login_expire: u64,
    session_expire: u64,
}

impl RedisSessionStore {
    pub fn new(
        store: Arc<dyn AtomicStore>,
        keys: Keys,
        login_expire: u64,
        session_expire: u64,
    ) -> Self {
        Self {
            store,
            keys,
            login_expire,
            session_expire,
        }
    }

    async fn recent_session_ids(&self, username: &str, limit: usize) -> Result<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let list_key = self.keys.session_list(username);
        let mut replies = self
            .store
            .execute_atomic(vec![Op::LRange(list_key, 0, limit as i64 - 1)])
            .await?;
        Ok(replies.remove(0).into_list())
    }

    /// Resolve ids to live sessions, skipping expired ones.
    async fn resolve_sessions(&self, session_ids: &[String]) -> Result<Vec<Session>> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ops = session_ids
            .iter()
            .map(|id| Op::HGetAll(self.keys.session(id)))
            .collect();
        let replies = self.store.execute_atomic(ops).await?;

        Ok(session_ids
            .iter()
            .zip(replies)
            .filter_map(|(id, reply)| Session::from_hash(id, &reply.into_hash()?))
            .collect())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn issue_login_token(&self, username: &str, name: &str, chat_id: i64) -> Result<String> {
        let login = LoginToken {
            token: generate_token(TOKEN_LEN),
            username: username.to_string(),
            name: name.to_string(),
            chat_id,
        };
        let key = self.keys.login(username);

        // DEL first so fields of an older token never survive the overwrite.
        self.store
            .execute_atomic(vec![
                Op::Del(key.clone()),
                Op::HSet(key.clone(), login.to_fields()),
                Op::Expire(key, self.login_expire),
            ])
            .await?;

        tracing::debug!(username, "login token issued");

        Ok(login.token)
    }

    async fn exchange_token(&self, username: &str, token: &str) -> Result<Exchange> {
        let login_key = self.keys.login(username);
        let mut replies = self
            .store
            .execute_atomic(vec![Op::HGetAll(login_key.clone())])
            .await?;

        let Some(login) = replies
            .remove(0)
            .into_hash()
            .and_then(|hash| LoginToken::from_hash(&hash))
        else {
            return Ok(Exchange::Rejected(Rejection::NotFound));
        };

        if login.username != username {
            tracing::warn!(username, "login rejected: username mismatch");
            return Ok(Exchange::Rejected(Rejection::Mismatch));
        }
        if login.token != token {
            tracing::info!(username, "login rejected: token superseded or unknown");
            return Ok(Exchange::Rejected(Rejection::NotFound));
        }

        let session_id = format!("{}_{}", token, generate_token(TOKEN_LEN));
        let session = Session::from_login(session_id, login, Utc::now().timestamp_millis());
        let session_key = self.keys.session(&session.id);
        let list_key = self.keys.session_list(username);

        let replies = self
            .store
            .execute_atomic(vec![
                Op::HGetAll(login_key.clone()),
                Op::Del(login_key.clone()),
                Op::HSet(session_key.clone(), session.to_fields()),
                Op::Expire(session_key.clone(), self.session_expire),
                Op::LPush(list_key.clone(), session.id.clone()),
                Op::LTrim(list_key.clone(), 0, SESSION_LIST_MAX as i64 - 1),
            ])
            .await?;

        // Between the read and this batch the token may have been used by a
        // concurrent exchange or replaced by a newer login. Undo the session;
        // a newer token deleted by this batch is put back with a fresh TTL.
        let current = replies
            .into_iter()
            .next()
            .and_then(|reply| reply.into_hash())
            .and_then(|hash| LoginToken::from_hash(&hash));
        match current {
            Some(current) if current.token == token => {}
            newer => {
                tracing::warn!(username, "login rejected: token changed during exchange");
                let mut undo = vec![
                    Op::Del(session_key),
                    Op::LRem(list_key, 0, session.id.clone()),
                ];
                if let Some(newer) = newer {
                    undo.push(Op::HSet(login_key.clone(), newer.to_fields()));
                    undo.push(Op::Expire(login_key, self.login_expire));
                }
                self.store.execute_atomic(undo).await?;
                return Ok(Exchange::Rejected(Rejection::NotFound));
            }
        }

        tracing::info!(username, "session created");

        Ok(Exchange::Created(session))
    }

    async fn lookup_session(&self, session_id: &str) -> Result<Option<Session>> {
        if !is_session_id(session_id) {
            return Ok(None);
        }
        let mut replies = self
            .store
            .execute_atomic(vec![Op::HGetAll(self.keys.session(session_id))])
            .await?;

        Ok(replies
            .remove(0)
            .into_hash()
            .and_then(|hash| Session::from_hash(session_id, &hash)))
    }

    async fn terminate_session(&self, session_id: &str) -> Result<Option<Session>> {
        if !is_session_id(session_id) {
            return Ok(None);
        }
        let key = self.keys.session(session_id);
        let mut replies = self
            .store
            .execute_atomic(vec![Op::HGetAll(key.clone()), Op::Del(key)])
            .await?;

        Ok(replies
            .remove(0)
            .into_hash()
            .and_then(|hash| Session::from_hash(session_id, &hash)))
    }

    async fn delete_login_token(&self, username: &str) -> Result<()> {
        self.store
            .execute_atomic(vec![Op::Del(self.keys.login(username))])
            .await?;
        Ok(())
    }

    async fn list_recent_sessions(&self, username: &str, limit: usize) -> Result<Vec<Session>> {
        let session_ids = self.recent_session_ids(username, limit).await?;
        self.resolve_sessions(&session_ids).await
    }

    async fn terminate_recent_sessions(
        &self,
        username: &str,
        limit: usize,
    ) -> Result<SessionsTerminated> {
        let session_ids = self.recent_session_ids(username, limit).await?;
        let sessions = self.resolve_sessions(&session_ids).await?;

        if !session_ids.is_empty() {
            let ops = session_ids
                .iter()
                .map(|id| Op::Del(self.keys.session(id)))
                .collect();
            self.store.execute_atomic(ops).await?;
        }

        tracing::info!(username, count = sessions.len(), "sessions terminated");

        Ok(SessionsTerminated {
            count: sessions.len(),
            newest_started: sessions.first().map(|s| s.started),
            oldest_started: sessions.last().map(|s| s.started),
        })
    }
}
