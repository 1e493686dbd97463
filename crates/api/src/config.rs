use serde::{Deserialize, Serialize};
use url::Url;

fn default_database_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Shared HMAC secret used by the link issuer to sign unsubscribe tokens.
    pub secret: String,
    /// Postgres URL for the suppression list. When unset, writes are skipped.
    #[serde(default)]
    pub database_url: Option<String>,
    /// External confirmation page for browser unsubscribes. When unset, an
    /// inline page is rendered instead.
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// Upper bound on waiting for a pooled connection.
    #[serde(default = "default_database_timeout_secs")]
    pub database_timeout_secs: u64,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref().filter(|u| !u.is_empty())
    }

    /// Parsed redirect target. Checked once at startup so a bad value never
    /// reaches the request path.
    pub fn redirect_target(&self) -> Result<Option<Url>, url::ParseError> {
        self.redirect_url().map(Url::parse).transpose()
    }
}
