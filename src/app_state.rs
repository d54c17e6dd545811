// =============================================================================
// Central Application State — Helios A/B Engine
// =============================================================================
//
// The single source of truth for the server. AppState ties the experiment
// registry, the decision engine, and the runtime configuration together and
// provides a unified snapshot for the dashboard API.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for the error ring buffer.
//   - The registry manages its own interior locking.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::engine::DecisionEngine;
use crate::registry::ExperimentRegistry;
use crate::runtime_config::HeliosConfig;
use crate::types::ArmStatsReport;

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter. Incremented on every
    /// meaningful state mutation. The persistence loop uses this to detect
    /// when the store file is stale.
    pub state_version: AtomicU64,

    /// Runtime configuration, fixed at startup.
    pub config: HeliosConfig,

    /// Canonical experiment and arm records.
    pub registry: Arc<ExperimentRegistry>,

    /// Selection + recording operations over the registry.
    pub engine: DecisionEngine,

    /// Ring buffer of recent errors for the dashboard.
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    /// Instant when the engine was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct the state from a configuration and an already-loaded
    /// registry. The returned value is typically wrapped in `Arc`
    /// immediately.
    pub fn new(config: HeliosConfig, registry: Arc<ExperimentRegistry>) -> Self {
        Self {
            state_version: AtomicU64::new(1),
            config,
            engine: DecisionEngine::new(registry.clone()),
            registry,
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    /// Atomically increment the state version. Call this after every
    /// meaningful mutation so the persistence loop picks up the change.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Read the current state version without modifying it.
    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted when the limit is
    /// reached.
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Build a complete, serialisable snapshot of the engine state.
    ///
    /// This is the payload served by `GET /api/v1/state` for dashboards.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let experiments = self
            .registry
            .list_experiments()
            .into_iter()
            .filter_map(|summary| {
                // An experiment can only vanish between the listing and the
                // detail read if the process is shutting down; skip it.
                let snapshots = self.registry.arm_snapshots(&summary.id).ok()?;
                Some(ExperimentStateSnapshot {
                    id: summary.id,
                    name: summary.name,
                    description: summary.description,
                    created_at: summary.created_at,
                    arms: snapshots.iter().map(ArmStatsReport::from).collect(),
                })
            })
            .collect();

        StateSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            config: ConfigSummary {
                bind_addr: self.config.bind_addr.clone(),
                store_path: self.config.store_path.clone(),
                persist_interval_secs: self.config.persist_interval_secs,
                max_arms_per_experiment: self.config.max_arms_per_experiment,
            },
            experiments,
            recent_errors: self.recent_errors.read().clone(),
        }
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

/// Full engine state snapshot sent to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub config: ConfigSummary,
    pub experiments: Vec<ExperimentStateSnapshot>,
    pub recent_errors: Vec<ErrorRecord>,
}

/// Summary of the runtime config for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub bind_addr: String,
    pub store_path: String,
    pub persist_interval_secs: u64,
    pub max_arms_per_experiment: usize,
}

/// One experiment with live per-arm statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentStateSnapshot {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub arms: Vec<ArmStatsReport>,
}

// =============================================================================
// Tests
// =============================================================================
