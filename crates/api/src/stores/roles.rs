//! Role grants, stored redundantly for lookups in both directions.
//!
//! ```text
//! {ns}:user:{username}  → role name
//! {ns}:user             → set of usernames with a role
//! {ns}:role             → set of roles with members
//! {ns}:role:{role}      → set of member usernames
//! ```
//!
//! Grant and revoke span several batches with no isolation between them, so
//! a revoke racing a grant of the same role can leave a role in `{ns}:role`
//! with no members. `list_roles` only reports roles whose member set is
//! non-empty, so such a leftover is never visible.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::atomic::{AtomicStore, Op};
use super::keys::Keys;

pub const ADMIN_ROLE: &str = "admin";

/// Reported for a user listed in `{ns}:user` without a role record.
pub const NO_ROLE: &str = "none";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Granted {
    /// Role held before this grant, if any.
    pub previous: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revoked {
    pub role: String,
    /// Members left in `role` after the revoke.
    pub remaining: usize,
}

/// Store for role-based access control.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Bootstrap admin, or a user granted the `admin` role.
    async fn is_admin(&self, username: &str) -> Result<bool>;

    /// Role granted to `username`.
    async fn role_of(&self, username: &str) -> Result<Option<String>>;

    /// Grant `role` to `username`, replacing any previous role.
    async fn grant(&self, username: &str, role: &str) -> Result<Granted>;

    /// Revoke the role of `username`. `None` when the user had no role.
    async fn revoke(&self, username: &str) -> Result<Option<Revoked>>;

    /// Users and their roles, optionally only the members of one role.
    async fn list_users(&self, role: Option<String>) -> Result<BTreeMap<String, String>>;

    /// Roles with at least one member, and their member counts.
    async fn list_roles(&self) -> Result<BTreeMap<String, usize>>;
}

/// RoleStore on top of atomic Redis batches.
#[derive(Clone)]
pub struct RedisRoleStore {
    store: Arc<dyn AtomicStore>,
    keys: Keys,
    admin: String,
}

impl RedisRoleStore {
    pub fn new(store: Arc<dyn AtomicStore>, keys: Keys, admin: impl Into<String>) -> Self {
        Self {
            store,
            keys,
            admin: admin.into(),
        }
    }

    /// Remove `username` from the members of `role`, dropping the role once empty.
    ///
    /// Membership goes first so `{ns}:role` never lists a role that still
    /// has members after a failure between the two batches.
    async fn leave_role(&self, username: &str, role: &str) -> Result<usize> {
        let role_key = self.keys.role(role);
        let replies = self
            .store
            .execute_atomic(vec![
                Op::SRem(role_key.clone(), username.to_string()),
                Op::SCard(role_key),
            ])
            .await?;
        let remaining = match replies.into_iter().nth(1) {
            Some(reply) => reply.into_int()? as usize,
            None => bail!("SCARD reply missing for role {role}"),
        };

        if remaining == 0 {
            self.store
                .execute_atomic(vec![Op::SRem(self.keys.roles(), role.to_string())])
                .await?;
        }

        Ok(remaining)
    }
}

#[async_trait]
impl RoleStore for RedisRoleStore {
    async fn is_admin(&self, username: &str) -> Result<bool> {
        if username == self.admin {
            return Ok(true);
        }
        Ok(self.role_of(username).await?.as_deref() == Some(ADMIN_ROLE))
    }

    async fn role_of(&self, username: &str) -> Result<Option<String>> {
        let mut replies = self
            .store
            .execute_atomic(vec![Op::Get(self.keys.user(username))])
            .await?;
        Ok(replies.remove(0).into_text())
    }

    async fn grant(&self, username: &str, role: &str) -> Result<Granted> {
        let replies = self
            .store
            .execute_atomic(vec![
                Op::Get(self.keys.user(username)),
                Op::Set(self.keys.user(username), role.to_string()),
                Op::SAdd(self.keys.users(), username.to_string()),
                Op::SAdd(self.keys.roles(), role.to_string()),
                Op::SAdd(self.keys.role(role), username.to_string()),
            ])
            .await?;
        let previous = replies.into_iter().next().and_then(|r| r.into_text());

        if let Some(previous) = previous.as_deref().filter(|p| *p != role) {
            self.leave_role(username, previous).await?;
        }

        tracing::info!(username, role, previous = ?previous, "role granted");

        Ok(Granted { previous })
    }

    async fn revoke(&self, username: &str) -> Result<Option<Revoked>> {
        let user_key = self.keys.user(username);
        let replies = self
            .store
            .execute_atomic(vec![
                Op::Get(user_key.clone()),
                Op::Del(user_key),
                Op::SRem(self.keys.users(), username.to_string()),
            ])
            .await?;

        let Some(role) = replies.into_iter().next().and_then(|r| r.into_text()) else {
            return Ok(None);
        };

        let remaining = self.leave_role(username, &role).await?;

        tracing::info!(username, role, remaining, "role revoked");

        Ok(Some(Revoked { role, remaining }))
    }

    async fn list_users(&self, role: Option<String>) -> Result<BTreeMap<String, String>> {
        if let Some(role) = role {
            let mut replies = self
                .store
                .execute_atomic(vec![Op::SMembers(self.keys.role(&role))])
                .await?;
            return Ok(replies
                .remove(0)
                .into_list()
                .into_iter()
                .map(|username| (username, role.clone()))
                .collect());
        }

        let mut replies = self
            .store
            .execute_atomic(vec![Op::SMembers(self.keys.users())])
            .await?;
        let usernames = replies.remove(0).into_list();
        if usernames.is_empty() {
            return Ok(BTreeMap::new());
        }

        let ops = usernames.iter().map(|u| Op::Get(self.keys.user(u))).collect();
        let roles = self.store.execute_atomic(ops).await?;

        Ok(usernames
            .into_iter()
            .zip(roles)
            .map(|(username, role)| {
                let role = role.into_text().unwrap_or_else(|| NO_ROLE.to_string());
                (username, role)
            })
            .collect())
    }

    async fn list_roles(&self) -> Result<BTreeMap<String, usize>> {
        let mut replies = self
            .store
            .execute_atomic(vec![Op::SMembers(self.keys.roles())])
            .await?;
        let roles = replies.remove(0).into_list();
        if roles.is_empty() {
            return Ok(BTreeMap::new());
        }

        let ops = roles.iter().map(|r| Op::SCard(self.keys.role(r))).collect();
        let counts = self.store.execute_atomic(ops).await?;

        let mut listed = BTreeMap::new();
        for (role, count) in roles.into_iter().zip(counts) {
            let count = count.into_int()? as usize;
            if count > 0 {
                listed.insert(role, count);
            }
        }
        Ok(listed)
    }
}
