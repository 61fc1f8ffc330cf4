//! # PMCR Node
//!
//! HTTP server that runs Plan-Make-Check-Reflect cycles and hosts the
//! rule-based stages.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

mod api;
mod config;
mod logging;
mod state;

use config::NodeConfig;
use state::AppState;

#[derive(Debug, Parser)]
#[command(name = "pmcr-node", version, about = "Plan-Make-Check-Reflect cycle node")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "PMCR_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration.
    #[arg(short, long)]
    addr: Option<String>,
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Stage endpoints
        .route("/api/v1/stages/plan", post(api::stages::plan))
        .route("/api/v1/stages/make", post(api::stages::make))
        .route("/api/v1/stages/check", post(api::stages::check))
        .route("/api/v1/stages/reflect", post(api::stages::reflect))
        // Cycle endpoints
        .route("/api/v1/cycle", post(api::cycle::run_cycle))
        .route(
            "/api/v1/cycles",
            post(api::cycle::start_cycle).get(api::cycle::list_cycles),
        )
        .route(
            "/api/v1/cycles/:id",
            get(api::cycle::get_cycle).delete(api::cycle::cancel_cycle),
        )
        // History endpoints
        .route("/api/v1/history", get(api::history::list_history))
        .route("/api/v1/history/trend", get(api::history::trend))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Run the node until the listener fails.
pub async fn run_server(config: NodeConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .server
        .addr
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.server.addr))?;

    info!("🚀 PMCR Node starting...");
    info!(
        max_iterations = config.cycle.max_iterations,
        per_stage_timeout_ms = config.cycle.per_stage_timeout_ms,
        max_concurrent_cycles = config.server.max_concurrent_cycles,
        "Cycle bounds"
    );

    let state = AppState::from_config(&config)?;
    let app = create_router(state);

    info!("🌐 Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = NodeConfig::load(cli.config.as_deref())?;
    if let Some(addr) = cli.addr {
        config.server.addr = addr;
    }

    logging::init(&config.logging)?;

    run_server(config).await
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::Value;

    use super::*;
    use crate::state::tests::rule_based_state;

    #[tokio::test]
    async fn test_health() {
        let server = TestServer::new(create_router(rule_based_state())).unwrap();
        let response = server.get("/health").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["active_cycles"], 0);
    }
}
