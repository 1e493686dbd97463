//! Shared test utilities for handler tests.
//!
//! Provides an in-memory suppression store with the same upsert semantics as
//! the Postgres one, a `TestStateBuilder` for constructing `AppState`, and a
//! `LogCapture` for asserting on emitted tracing events.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{MemorySuppressionStore, TestStateBuilder};
//!
//! let store = MemorySuppressionStore::default();
//! let state = TestStateBuilder::new()
//!     .with_suppression_store(store.clone())
//!     .build();
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use crate::config::Config;
use crate::models::{SuppressionRecord, USER_REQUEST};
use crate::state::AppState;
use crate::stores::{DisabledSuppressionStore, StoreError, Stores, SuppressionStore};
use crate::token::{Verifier, tests::SECRET};

/// Creates a test configuration with dummy values.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        secret: String::from_utf8(SECRET.to_vec()).unwrap(),
        database_url: None,
        redirect_url: None,
        database_timeout_secs: 5,
        env: "test".to_string(),
        sentry_dsn: None,
    }
}

/// In-memory suppression list keyed by email.
#[derive(Clone, Default)]
pub struct MemorySuppressionStore {
    rows: Arc<Mutex<HashMap<String, SuppressionRecord>>>,
}

impl MemorySuppressionStore {
    pub fn records(&self) -> Vec<SuppressionRecord> {
        self.rows.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl SuppressionStore for MemorySuppressionStore {
    async fn record(&self, email: &str, source: &str) -> Result<(), StoreError> {
        self.rows.lock().unwrap().insert(
            email.to_string(),
            SuppressionRecord {
                email: email.to_string(),
                source: source.to_string(),
                reason: USER_REQUEST.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Builder for constructing test `AppState`.
///
/// Defaults to the disabled store and the shared test secret.
pub struct TestStateBuilder {
    config: Config,
    store: Option<Arc<dyn SuppressionStore>>,
}

impl TestStateBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            store: None,
        }
    }

    pub fn with_suppression_store(mut self, store: impl SuppressionStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn with_redirect_url(mut self, url: &str) -> Self {
        self.config.redirect_url = Some(url.to_string());
        self
    }

    pub fn build(self) -> AppState {
        let stores = Stores {
            suppressions: self
                .store
                .unwrap_or_else(|| Arc::new(DisabledSuppressionStore)),
        };

        AppState {
            redirect: self.config.redirect_target().unwrap(),
            verifier: Verifier::new(self.config.secret.clone()),
            config: Arc::new(self.config),
            stores,
        }
    }
}

impl Default for TestStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects formatted log output for the current thread.
///
/// Only valid on a current-thread runtime (the `#[tokio::test]` default),
/// since the subscriber is installed as the thread default.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Install as the thread-default subscriber until the guard drops.
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
