use std::sync::Arc;

use url::Url;

use crate::{config::Config, stores::Stores, token::Verifier};

#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Confirmation page for browser unsubscribes, parsed at startup.
    pub redirect: Option<Url>,
    /// Token verifier bound to the signing secret.
    pub verifier: Verifier,
    /// Suppression list.
    pub stores: Stores,
}
