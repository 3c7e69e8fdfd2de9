// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Statement Relay Server - cached relay for annual income statements.
//!
//! Fetches income statements from the Financial Modeling Prep API and
//! returns them as JSON, optionally filtered to a range and sorted on
//! one column. It supports:
//!
//! - Inclusive integer range filtering on any numeric column (`date` filters on `calendarYear`)
//! - Stable ascending or descending sort on any column
//! - Response caching in Redis or process memory with a fixed TTL
//!
//! # Endpoints
//!
//! - `GET /?column=&min=&max=&asc=` - Income statements, filtered and sorted
//! - `GET /api/v1/health` - Health check

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod routes;
mod services;
mod types;

use config::Config;
use services::{ResponseCache, UpstreamClient};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub upstream: UpstreamClient,
    pub cache: Option<ResponseCache>,
}

/// Build the router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/", get(routes::statements::list))
        .route("/api/v1/health", get(routes::health::check))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,tower_http=debug,statement_relay_server=debug")
    });

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_logging(config.json_logs);

    tracing::info!(
        port = config.port,
        symbol = %config.symbol,
        upstream = %config.upstream_base_url,
        cache_backend = ?config.cache_backend,
        cache_ttl_secs = config.cache_ttl_secs,
        "Starting Statement Relay Server"
    );

    let upstream = UpstreamClient::new(&config)?;
    let cache = ResponseCache::from_config(&config).await;

    let state = AppState {
        config: Arc::new(config.clone()),
        upstream,
        cache,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
