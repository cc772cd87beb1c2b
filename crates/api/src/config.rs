use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Prefix for every Redis key, e.g. `authbot:session:<id>`.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// HTTPS web domain the login links and cookies are issued for.
    pub domain: String,
    /// Telegram bot name, e.g. `ExAuthDemoBot`.
    pub bot: String,
    /// Webhook path secret registered via `setWebhook`.
    pub secret: String,
    /// Telegram bot API token.
    pub token: String,
    /// Bootstrap admin username, implicitly granted the `admin` role.
    pub admin: String,
    /// Login token TTL in seconds.
    #[serde(default = "default_login_expire")]
    pub login_expire: u64,
    /// Session TTL in seconds.
    #[serde(default = "default_session_expire")]
    pub session_expire: u64,
    /// Session cookie max-age in milliseconds.
    #[serde(default = "default_cookie_expire")]
    pub cookie_expire: u64,
    /// Timeout for outbound Telegram calls in milliseconds.
    #[serde(default = "default_send_timeout")]
    pub send_timeout: u64,
    #[serde(default = "default_redirect_auth")]
    pub redirect_auth: String,
    #[serde(default = "default_redirect_no_auth")]
    pub redirect_no_auth: String,
    /// Serve `/authbot-session/{username}/{session_id}` for reverse proxies.
    #[serde(default = "default_true")]
    pub session_route: bool,
    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,
    /// Remote Redis hub relaying bot updates, for development behind NAT.
    #[serde(default)]
    pub hub_redis: Option<String>,
    #[serde(default)]
    pub hub_namespace: Option<String>,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    /// Link the user opens to exchange a login token for a session.
    pub fn login_url(&self, username: &str, token: &str) -> String {
        format!("https://{}/authbot/login/{}/{}", self.domain, username, token)
    }

    /// Channel on the development hub carrying this bot's updates.
    pub fn hub_channel(&self) -> Option<String> {
        self.hub_namespace
            .as_ref()
            .map(|namespace| format!("{}:{}", namespace, self.secret))
    }

    /// Hub Redis URL and channel, when the hub is configured.
    pub fn hub_subscription(&self) -> anyhow::Result<Option<(String, String)>> {
        let Some(hub_redis) = &self.hub_redis else {
            return Ok(None);
        };
        let Some(channel) = self.hub_channel() else {
            anyhow::bail!("AUTHBOT_HUB_NAMESPACE is required when AUTHBOT_HUB_REDIS is set");
        };
        Ok(Some((hub_redis.clone(), channel)))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_namespace() -> String {
    "authbot".to_string()
}

fn default_login_expire() -> u64 {
    30
}

fn default_session_expire() -> u64 {
    300
}

fn default_cookie_expire() -> u64 {
    60_000
}

fn default_send_timeout() -> u64 {
    8_000
}

fn default_redirect_auth() -> String {
    "/auth".to_string()
}

fn default_redirect_no_auth() -> String {
    "/noauth".to_string()
}

fn default_true() -> bool {
    true
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required_vars() -> Vec<(String, String)> {
        [
            ("AUTHBOT_DOMAIN", "authdemo.example.com"),
            ("AUTHBOT_BOT", "ExAuthDemoBot"),
            ("AUTHBOT_SECRET", "z7WnDUfuhtDCBjX54Ks5vB4SAdGmdzwR"),
            ("AUTHBOT_TOKEN", "243751977:AAH-test"),
            ("AUTHBOT_ADMIN", "evan"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn applies_defaults() {
        let config: Config = envy::prefixed("AUTHBOT_")
            .from_iter(required_vars())
            .unwrap();

        assert_eq!(config.namespace, "authbot");
        assert_eq!(config.login_expire, 30);
        assert_eq!(config.session_expire, 300);
        assert_eq!(config.cookie_expire, 60_000);
        assert_eq!(config.send_timeout, 8_000);
        assert!(config.session_route);
        assert!(config.hub_redis.is_none());
    }

    #[test]
    fn missing_admin_is_an_error() {
        let vars = required_vars()
            .into_iter()
            .filter(|(k, _)| k != "AUTHBOT_ADMIN");

        assert!(envy::prefixed("AUTHBOT_").from_iter::<_, Config>(vars).is_err());
    }

    #[test]
    fn overrides_expiry() {
        let mut vars = required_vars();
        vars.push(("AUTHBOT_LOGIN_EXPIRE".into(), "5".into()));
        vars.push(("AUTHBOT_SESSION_ROUTE".into(), "false".into()));

        let config: Config = envy::prefixed("AUTHBOT_").from_iter(vars).unwrap();

        assert_eq!(config.login_expire, 5);
        assert!(!config.session_route);
    }

    #[test]
    fn builds_login_url_and_hub_channel() {
        let mut config: Config = envy::prefixed("AUTHBOT_")
            .from_iter(required_vars())
            .unwrap();
        config.hub_namespace = Some("hub".into());

        assert_eq!(
            config.login_url("alice", "AbCdEfGh12345678"),
            "https://authdemo.example.com/authbot/login/alice/AbCdEfGh12345678"
        );
        assert_eq!(
            config.hub_channel().as_deref(),
            Some("hub:z7WnDUfuhtDCBjX54Ks5vB4SAdGmdzwR")
        );
    }

    #[test]
    fn hub_needs_a_namespace() {
        let mut config: Config = envy::prefixed("AUTHBOT_")
            .from_iter(required_vars())
            .unwrap();
        assert!(config.hub_subscription().unwrap().is_none());

        config.hub_redis = Some("redis://hub:6379".into());
        assert!(config.hub_subscription().is_err());

        config.hub_namespace = Some("hub".into());
        assert_eq!(
            config.hub_subscription().unwrap(),
            Some((
                "redis://hub:6379".to_string(),
                "hub:z7WnDUfuhtDCBjX54Ks5vB4SAdGmdzwR".to_string()
            ))
        );
    }
}
