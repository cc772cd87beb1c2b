//! Chat command dispatch.
//!
//! Turns an inbound Telegram message into session or role store calls and
//! replies to the sender. Authorization, malformed commands and missing
//! records all end in a reply; store failures are logged and answered with
//! a generic apology. Nothing here fails the webhook request.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use shared::telegram::Update;

use crate::{
    commands::{Command, Usage},
    config::Config,
    format::{escape_html, format_elapsed, plural},
    services::Notifier,
    stores::{RECENT_SESSIONS, RoleStore, SessionStore, Stores},
};

/// A chat message normalized from a Telegram update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Telegram username, empty when the sender has none.
    pub username: String,
    /// First name, falling back to the username.
    pub name: String,
    pub chat_id: i64,
    pub text: String,
    /// Unix time in seconds.
    pub timestamp: i64,
}

impl InboundMessage {
    /// `None` for updates that carry no text message from a user.
    pub fn from_update(update: Update) -> Option<Self> {
        let message = update.message?;
        let from = message.from?;
        let text = message.text?;
        let username = from.username.unwrap_or_default();
        let name = from
            .first_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| username.clone());

        Some(Self {
            username,
            name,
            chat_id: message.chat.id,
            text,
            timestamp: message.date,
        })
    }
}

pub struct Dispatcher {
    sessions: Arc<dyn SessionStore>,
    roles: Arc<dyn RoleStore>,
    notifier: Arc<dyn Notifier>,
    config: Config,
}

impl Dispatcher {
    pub fn new(stores: &Stores, notifier: Arc<dyn Notifier>, config: Config) -> Self {
        Self {
            sessions: stores.sessions.clone(),
            roles: stores.roles.clone(),
            notifier,
            config,
        }
    }

    /// Handle one inbound message and send the reply.
    pub async fn handle(&self, message: &InboundMessage) {
        let command = Command::parse(&message.text);
        tracing::debug!(
            username = %message.username,
            command = command.name(),
            "chat command"
        );

        let reply = match self.respond(message, &command).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!(
                    username = %message.username,
                    command = command.name(),
                    "chat command failed: {:?}",
                    err
                );
                thanks(
                    message,
                    &[format!("Apologies, the {} command failed.", command.name())],
                )
            }
        };

        self.notify(message.chat_id, &reply).await;
    }

    /// Send a message, logging instead of failing when delivery fails.
    pub async fn notify(&self, chat_id: i64, text: &str) {
        if let Err(err) = self.notifier.send_message(chat_id, text).await {
            tracing::warn!(chat_id, "telegram send failed: {:?}", err);
        }
    }

    async fn respond(&self, message: &InboundMessage, command: &Command) -> Result<String> {
        if message.username.is_empty() {
            return Ok(thanks(
                message,
                &["Please set a Telegram username to use this bot.".to_string()],
            ));
        }

        if command.requires_admin() && !self.roles.is_admin(&message.username).await? {
            tracing::warn!(username = %message.username, command = command.name(), "admin command denied");
            return Ok(thanks(
                message,
                &[format!(
                    "You are not an admin user, please ask @{}.",
                    escape_html(&self.config.admin)
                )],
            ));
        }

        let lines = match command {
            Command::Login => self.login(message).await?,
            Command::Logout => self.logout(message).await?,
            Command::ListSessions => self.list_sessions(message).await?,
            Command::ListUsers { role } => self.list_users(role.clone()).await?,
            Command::ListRoles { role } => self.list_roles(role.as_deref()).await?,
            Command::Grant { user, role } => self.grant(user, role).await?,
            Command::Revoke { user } => self.revoke(user).await?,
            Command::Malformed(usage) => usage_help(*usage),
            Command::Unrecognized => return Ok("Try <code>/login</code>".to_string()),
        };

        Ok(thanks(message, &lines))
    }

    async fn login(&self, message: &InboundMessage) -> Result<Vec<String>> {
        let token = self
            .sessions
            .issue_login_token(&message.username, &message.name, message.chat_id)
            .await?;

        Ok(vec![
            format!(
                "You can login via {}.",
                self.config.login_url(&message.username, &token)
            ),
            format!(
                "This link expires in {} seconds.",
                self.config.login_expire
            ),
        ])
    }

    async fn logout(&self, message: &InboundMessage) -> Result<Vec<String>> {
        let terminated = self
            .sessions
            .terminate_recent_sessions(&message.username, RECENT_SESSIONS)
            .await?;
        let now = Utc::now().timestamp_millis();

        let lines = match (terminated.newest_started, terminated.oldest_started) {
            (Some(newest), Some(oldest)) if terminated.count > 1 => vec![
                format!("{} have been deleted.", plural(terminated.count, "session")),
                format!("The latest was created {} ago.", format_elapsed(now - newest)),
                format!("The oldest was created {} ago.", format_elapsed(now - oldest)),
            ],
            (Some(started), _) => vec![format!(
                "The session that was created {} ago, has now been deleted.",
                format_elapsed(now - started)
            )],
            _ => vec!["No active sessions.".to_string()],
        };
        Ok(lines)
    }

    async fn list_sessions(&self, message: &InboundMessage) -> Result<Vec<String>> {
        let sessions = self
            .sessions
            .list_recent_sessions(&message.username, RECENT_SESSIONS)
            .await?;
        let now = Utc::now().timestamp_millis();

        let lines = match sessions.as_slice() {
            [] => vec!["No active sessions.".to_string()],
            [session] => vec![format!(
                "Your session was created {} ago.",
                format_elapsed(session.age_millis(now))
            )],
            [newest, .., oldest] => vec![
                format!("You have {} active sessions.", sessions.len()),
                format!(
                    "The latest was created {} ago.",
                    format_elapsed(newest.age_millis(now))
                ),
                format!(
                    "The oldest was created {} ago.",
                    format_elapsed(oldest.age_millis(now))
                ),
            ],
        };
        Ok(lines)
    }

    async fn list_users(&self, role: Option<String>) -> Result<Vec<String>> {
        let users = self.roles.list_users(role.clone()).await?;
        if users.is_empty() {
            return Ok(vec![match role {
                Some(role) => format!("Role <code>{}</code> has no members.", role),
                None => "No users have been granted a role.".to_string(),
            }]);
        }

        Ok(vec![format!(
            "Users:\n{}",
            users
                .iter()
                .map(|(user, role)| format!("@{} <code>{}</code>", escape_html(user), escape_html(role)))
                .collect::<Vec<_>>()
                .join("\n")
        )])
    }

    async fn list_roles(&self, filter: Option<&str>) -> Result<Vec<String>> {
        let roles: BTreeMap<String, usize> = self
            .roles
            .list_roles()
            .await?
            .into_iter()
            .filter(|(role, _)| filter.is_none_or(|f| f == role.as_str()))
            .collect();

        if roles.is_empty() {
            return Ok(vec![match filter {
                Some(role) => format!("Role <code>{}</code> has no members.", role),
                None => "No roles have been granted.".to_string(),
            }]);
        }

        Ok(vec![format!(
            "Roles:\n{}",
            roles
                .iter()
                .map(|(role, count)| {
                    format!("<code>{}</code> {}", escape_html(role), plural(*count, "member"))
                })
                .collect::<Vec<_>>()
                .join("\n")
        )])
    }

    async fn grant(&self, user: &str, role: &str) -> Result<Vec<String>> {
        let granted = self.roles.grant(user, role).await?;

        let mut lines = vec![format!("Granted role <code>{}</code> to @{}.", role, user)];
        if let Some(previous) = granted.previous.filter(|p| p != role) {
            lines.push(format!(
                "Their previous role <code>{}</code> was revoked.",
                escape_html(&previous)
            ));
        }
        Ok(lines)
    }

    async fn revoke(&self, user: &str) -> Result<Vec<String>> {
        let Some(revoked) = self.roles.revoke(user).await? else {
            return Ok(vec![format!("User @{} has no role.", user)]);
        };

        let role = escape_html(&revoked.role);
        let mut lines = vec![format!("Revoked role <code>{}</code> from @{}.", role, user)];
        if revoked.remaining == 0 {
            lines.push(format!("Role <code>{}</code> now has no members.", role));
        } else {
            lines.push(format!(
                "{} of <code>{}</code> remain.",
                plural(revoked.remaining, "member"),
                role
            ));
        }
        Ok(lines)
    }
}

fn usage_help(usage: Usage) -> Vec<String> {
    let (syntax, example) = match usage {
        Usage::Users => ("/users #role", "/users #admin"),
        Usage::Roles => ("/roles #role", "/roles #admin"),
        Usage::Grant => ("/grant @username #role", "/grant @other_user #admin"),
        Usage::Revoke => ("/revoke @username", "/revoke @other_user"),
    };
    vec![
        format!("Try <code>{}</code>", syntax),
        format!("e.g. <code>{}</code>", example),
    ]
}

/// Prefix the reply with a greeting addressed to the sender.
fn thanks(message: &InboundMessage, lines: &[String]) -> String {
    let greeting = format!("Thanks, {}.", escape_html(&message.name));
    std::iter::once(greeting)
        .chain(lines.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}
