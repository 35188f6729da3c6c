//! Mathe-Tutor · Backend
//!
//! - Axum JSON API for a German Gymnasium math tutor
//! - Claude and Gemini as LLM providers (API key supplied per request)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT               : u16 (default 3000)
//!   TUTOR_CONFIG_PATH  : path to TOML config (providers, prompt overrides, demo login)
//!   ANTHROPIC_BASE_URL : default "https://api.anthropic.com"
//!   GEMINI_BASE_URL    : default "https://generativelanguage.googleapis.com"
//!   LOG_LEVEL          : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT         : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod prompts;
mod extract;
mod evaluator;
mod catalog;
mod auto_mode;
mod providers;
mod error;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AppConfig;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Config errors are logged inside and fall back to defaults.
  let cfg = AppConfig::from_env();
  let state = Arc::new(AppState::new(cfg)?);

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "mathe_tutor", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "mathe_tutor", error = %e, "Failed to listen for Ctrl+C");
    return;
  }
  info!(target: "mathe_tutor", "Shutdown signal received");
}
