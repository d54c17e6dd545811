// =============================================================================
// Helios A/B Engine — Main Entry Point
// =============================================================================
//
// A Thompson Sampling decision server: experiments hold a fixed set of arms,
// selection draws from each arm's Beta posterior, and recorded outcomes move
// the posteriors. The experiment store persists to a JSON file periodically
// and on shutdown.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod bandit;
mod engine;
mod error;
mod registry;
mod runtime_config;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::registry::ExperimentRegistry;
use crate::runtime_config::HeliosConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Helios A/B Engine — Starting Up                  ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = match HeliosConfig::load("helios_config.json") {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            let config = HeliosConfig::default();
            // Materialise the defaults so the first run leaves an editable file.
            if let Err(e) = config.save("helios_config.json") {
                warn!(error = %e, "Failed to write default config");
            }
            config
        }
    };

    // Override bind address from env if available.
    if let Ok(addr) = std::env::var("HELIOS_BIND_ADDR") {
        if !addr.trim().is_empty() {
            config.bind_addr = addr.trim().to_string();
        }
    }

    // ── 2. Load the experiment store ─────────────────────────────────────
    let registry = match ExperimentRegistry::load(&config.store_path, config.max_arms_per_experiment)
    {
        Ok(registry) => {
            info!(path = %config.store_path, "experiment store restored");
            registry
        }
        Err(e) => {
            info!(
                path = %config.store_path,
                reason = %e,
                "starting with an empty experiment store"
            );
            ExperimentRegistry::new(config.max_arms_per_experiment)
        }
    };

    // ── 3. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config, Arc::new(registry)));

    // ── 4. Persistence loop ──────────────────────────────────────────────
    // Writes the store whenever the state version moved since the last save.
    let persist_state = state.clone();
    tokio::spawn(async move {
        let store_path = persist_state.config.store_path.clone();
        let period = tokio::time::Duration::from_secs(persist_state.config.persist_interval_secs);
        let mut interval = tokio::time::interval(period);
        let mut last_saved_version = persist_state.current_state_version();

        loop {
            interval.tick().await;

            let version = persist_state.current_state_version();
            if version == last_saved_version {
                continue;
            }

            match persist_state.registry.save(&store_path) {
                Ok(()) => last_saved_version = version,
                Err(e) => {
                    error!(error = %e, "failed to persist experiment store");
                    persist_state.push_error(format!("store save failed: {e}"));
                }
            }
        }
    });

    // ── 5. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = state.config.bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("Failed to bind API server");
        info!(addr = %bind_addr, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received — stopping gracefully");

    if let Err(e) = state.registry.save(&state.config.store_path) {
        error!(error = %e, "Failed to save experiment store on shutdown");
    }

    info!("Helios A/B Engine shut down complete.");
    Ok(())
}
