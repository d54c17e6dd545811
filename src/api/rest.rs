// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. The health probe is public; everything
// else requires a valid Bearer token checked via the `AuthBearer` extractor.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api::auth::AuthBearer;
use crate::app_state::AppState;
use crate::error::EngineError;
use crate::registry::ArmSpec;
use crate::types::ArmStatsReport;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // ── Public ──────────────────────────────────────────────────
        .route("/api/v1/health", get(health))
        // ── Authenticated ───────────────────────────────────────────
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/experiments", post(create_experiment))
        .route("/api/v1/experiments", get(list_experiments))
        .route("/api/v1/experiments/:id", get(experiment_detail))
        .route("/api/v1/experiments/:id/arm", get(next_arm))
        .route("/api/v1/experiments/:id/arms", get(arm_stats))
        .route("/api/v1/arms/:id/outcome", post(record_outcome))
        // ── Middleware & State ──────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Error mapping
// =============================================================================

/// Map an engine error onto an HTTP status and JSON envelope.
fn error_response(err: &EngineError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EngineError::ExperimentNotFound { .. } | EngineError::ArmNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

// =============================================================================
// Health (public)
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "state_version": state.current_state_version(),
        "server_time": chrono::Utc::now().timestamp_millis(),
    }))
}

// =============================================================================
// Full state snapshot (authenticated)
// =============================================================================

async fn full_state(_auth: AuthBearer, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.build_snapshot();
    Json(snapshot)
}

// =============================================================================
// Experiment creation (authenticated)
// =============================================================================

#[derive(Debug, Deserialize)]
struct CreateExperimentRequest {
    name: String,
    #[serde(default)]
    description: String,
    /// Explicit arm definitions. Takes precedence over `num_arms`.
    #[serde(default)]
    arms: Vec<ArmSpec>,
    /// Shorthand: create this many placeholder arms named "Arm 1".."Arm N".
    #[serde(default)]
    num_arms: u32,
}

/// Turn the request's arm section into concrete specs.
///
/// `arms` wins when present; otherwise `num_arms` generates placeholder
/// variants the way the original form-driven flow did. Neither present is
/// invalid input.
fn resolve_arm_specs(arms: Vec<ArmSpec>, num_arms: u32) -> Result<Vec<ArmSpec>, EngineError> {
    if !arms.is_empty() {
        return Ok(arms);
    }
    if num_arms == 0 {
        return Err(EngineError::invalid(
            "provide either a non-empty arms list or num_arms >= 1",
        ));
    }
    Ok((1..=num_arms)
        .map(|i| ArmSpec {
            name: format!("Arm {i}"),
            description: format!("Description for arm {i}"),
        })
        .collect())
}

async fn create_experiment(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateExperimentRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let specs = resolve_arm_specs(req.arms, req.num_arms).map_err(|e| error_response(&e))?;

    let detail = state
        .registry
        .create_experiment(req.name, req.description, specs)
        .map_err(|e| error_response(&e))?;

    state.increment_version();
    Ok((StatusCode::CREATED, Json(detail)))
}

// =============================================================================
// Experiment listing (authenticated)
// =============================================================================

async fn list_experiments(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    Json(state.registry.list_experiments())
}

async fn experiment_detail(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(experiment_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let detail = state
        .registry
        .experiment_detail(&experiment_id)
        .map_err(|e| error_response(&e))?;
    Ok(Json(detail))
}

// =============================================================================
// Arm selection (authenticated)
// =============================================================================

async fn next_arm(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(experiment_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let result = state
        .engine
        .next_arm(&experiment_id)
        .map_err(|e| error_response(&e))?;
    Ok(Json(result))
}

// =============================================================================
// Arm statistics (authenticated)
// =============================================================================

async fn arm_stats(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(experiment_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let snapshots = state
        .registry
        .arm_snapshots(&experiment_id)
        .map_err(|e| error_response(&e))?;
    let reports: Vec<ArmStatsReport> = snapshots.iter().map(ArmStatsReport::from).collect();
    Ok(Json(reports))
}

// =============================================================================
// Outcome recording (authenticated)
// =============================================================================

#[derive(Debug, Deserialize)]
struct OutcomeRequest {
    success: bool,
}

async fn record_outcome(
    _auth: AuthBearer,
    State(state): State<Arc<AppState>>,
    Path(arm_id): Path<String>,
    Json(req): Json<OutcomeRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let (successes, failures) = state
        .engine
        .record_outcome(&arm_id, req.success)
        .map_err(|e| {
            warn!(arm_id = %arm_id, error = %e, "outcome rejected");
            error_response(&e)
        })?;

    state.increment_version();
    Ok(Json(serde_json::json!({
        "successes": successes,
        "failures": failures,
    })))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_arms_take_precedence() {
        let arms = vec![ArmSpec {
            name: "Control".to_string(),
            description: String::new(),
        }];
        let specs = resolve_arm_specs(arms, 5).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "Control");
    }

    #[test]
    fn num_arms_generates_placeholders() {
        let specs = resolve_arm_specs(vec![], 3).unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].name, "Arm 1");
        assert_eq!(specs[2].name, "Arm 3");
        assert_eq!(specs[1].description, "Description for arm 2");
    }

    #[test]
    fn missing_arm_section_is_invalid() {
        assert!(matches!(
            resolve_arm_specs(vec![], 0),
            Err(EngineError::InvalidInput(_))
        ));
    }
}
