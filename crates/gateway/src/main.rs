//! `dialogue-gateway`: the real-time voice-dialogue orchestrator binary.
//!
//! Process shape (spec.md §1 ambient addition): a long-running service
//! fronted by an axum HTTP/WebSocket listener. The only routes are a
//! liveness check and the telephony WebSocket upgrade that spawns one
//! per-call actor (`turn::spawn`) per inbound call — origination,
//! call-routing markup, and metrics exposition are out of scope (§1).

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use tracing_subscriber::EnvFilter;

use dg_domain::config::{Config, ConfigSeverity};
use dg_gateway::state::AppState;
use dg_gateway::{healthz, telephony_ws};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    tracing::info!("dialogue-gateway starting");

    let config = Config::from_env();
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    let state = AppState::new(config.clone()).context("initializing provider clients")?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!(addr = %addr, "dialogue-gateway listening");

    let app = router(state);
    axum::serve(listener, app)
        .await
        .context("axum server error")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz::healthz))
        .route("/telephony/ws", get(telephony_ws::telephony_ws))
        .with_state(state)
}

/// Structured JSON tracing, matching the teacher's `fmt().json()` setup.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,dg_gateway=debug")),
        )
        .json()
        .init();
}
