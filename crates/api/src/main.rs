mod config;
mod error;
mod handlers;
mod models;
mod state;
mod stores;
#[cfg(test)]
mod test_utils;
mod token;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{Router, http};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Config,
    state::AppState,
    stores::{DisabledSuppressionStore, PgSuppressionStore, Stores, SuppressionStore},
    token::Verifier,
};

#[derive(Parser)]
#[command(name = "api")]
#[command(about = "Signed-link unsubscribe server")]
struct Args {
    /// Create the suppression table and exit
    #[arg(long)]
    init_schema: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = envy::prefixed("UNSUBSCRIBE_").from_env::<Config>()?;

    // Initialize Sentry for error tracking (must be done early, guard must stay alive)
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.env.clone().into()),
                ..Default::default()
            },
        ))
    });

    // Set up tracing: JSON in production, human-readable otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    // Lazy pool: the server starts even if the database is down, and writes
    // give up after the acquire timeout.
    let pg = config
        .database_url()
        .map(|url| {
            PgPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(config.database_timeout_secs))
                .connect_lazy(url)
                .map(PgSuppressionStore::new)
        })
        .transpose()?;

    if args.init_schema {
        let Some(store) = pg else {
            anyhow::bail!("UNSUBSCRIBE_DATABASE_URL must be set to initialize the schema");
        };
        tracing::info!("Creating suppression table...");
        store.ensure_schema().await?;
        tracing::info!("Schema ready");
        return Ok(());
    }

    let suppressions: Arc<dyn SuppressionStore> = match pg {
        Some(store) => Arc::new(store),
        None => {
            tracing::warn!("no database configured, suppressions will not be persisted");
            Arc::new(DisabledSuppressionStore)
        }
    };

    let redirect = config
        .redirect_target()
        .context("UNSUBSCRIBE_REDIRECT_URL is not a valid absolute URL")?;

    let state = AppState {
        redirect,
        verifier: Verifier::new(config.secret.clone()),
        stores: Stores { suppressions },
        config: Arc::new(config.clone()),
    };

    // Request ID header name
    let x_request_id = http::HeaderName::from_static("x-request-id");

    let app = Router::new()
        .nest("/health", handlers::health::router())
        .nest("/unsubscribe", handlers::unsubscribe::router())
        .with_state(state)
        // Request ID: generate UUID, include in logs, return in response
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                // Path only: the query string carries the token.
                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(16 * 1024)); // 16KB limit

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
