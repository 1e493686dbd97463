//! Suppression storage.
//!
//! The suppression list is the only durable state this service owns. The
//! backend is chosen once at startup from configuration:
//!
//! - **postgres** - `suppressions` table, one row per address
//! - **disabled** - no storage target configured; writes are accepted and dropped
//!
//! ## Table
//!
//! ```text
//! suppressions(email PK, source, reason, updated_at)
//! ```
//!
//! ## Usage in Handlers
//!
//! Handlers never call the store directly; they go through
//! [`record_suppression`], which applies the failure policy:
//!
//! ```ignore
//! record_suppression(state.stores.suppressions.as_ref(), &claim.email, Source::Web).await;
//! ```

mod suppression;

pub use suppression::{
    DisabledSuppressionStore, PgSuppressionStore, StoreError, SuppressionStore,
};

#[cfg(test)]
pub use suppression::MockSuppressionStore;

use std::sync::Arc;

use crate::models::Source;

/// Collection of all stores.
#[derive(Clone)]
pub struct Stores {
    pub suppressions: Arc<dyn SuppressionStore>,
}

/// Write a suppression without ever failing the request. Errors are logged
/// and reported to Sentry, then dropped.
pub async fn record_suppression(store: &dyn SuppressionStore, email: &str, source: Source) {
    if let Err(err) = store.record(email, source.as_str()).await {
        tracing::error!(
            backend = store.backend(),
            source = source.as_str(),
            error = %err,
            "failed to record suppression"
        );
        sentry::capture_error(&err);
    }
}
