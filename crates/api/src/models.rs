use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Reason written for every suppression coming through the unsubscribe link.
pub const USER_REQUEST: &str = "user-request";

/// Where an unsubscribe came from, stored as the record's `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Mail client POST per RFC 8058 (List-Unsubscribe-Post).
    OneClick,
    /// Recipient following the link in a browser.
    Web,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::OneClick => "one-click",
            Source::Web => "web",
        }
    }
}

/// One row of the suppression list. `email` is unique.
#[derive(Debug, Clone, FromRow)]
pub struct SuppressionRecord {
    pub email: String,
    pub source: String,
    pub reason: String,
    pub updated_at: DateTime<Utc>,
}
