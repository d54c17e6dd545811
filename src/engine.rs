// =============================================================================
// Decision Engine — ties the registry and the bandit selector together
// =============================================================================
//
// The two operations the rest of the system calls:
//   - `next_arm(experiment_id)`        -> Thompson-sampled SelectionResult
//   - `record_outcome(arm_id, success)` -> post-increment counter pair
//
// Selection reads a fresh snapshot per call and never mutates statistics.
// Recording delegates to the registry's per-arm atomic increment.

use std::sync::Arc;

use tracing::debug;

use crate::bandit;
use crate::error::EngineError;
use crate::registry::ExperimentRegistry;
use crate::types::SelectionResult;

/// Stateless orchestration over the registry; cheap to clone via the inner
/// `Arc`.
pub struct DecisionEngine {
    registry: Arc<ExperimentRegistry>,
}

impl DecisionEngine {
    pub fn new(registry: Arc<ExperimentRegistry>) -> Self {
        Self { registry }
    }

    /// Pick the arm to present next for `experiment_id`.
    ///
    /// Fetches the current per-arm statistics and returns the arm with the
    /// highest Beta posterior draw. Unknown experiments surface as
    /// `ExperimentNotFound`.
    pub fn next_arm(&self, experiment_id: &str) -> Result<SelectionResult, EngineError> {
        let snapshots = self.registry.arm_snapshots(experiment_id)?;

        let mut rng = rand::thread_rng();
        let chosen = bandit::select_arm(&snapshots, &mut rng)?.clone();

        debug!(
            experiment_id,
            arm_id = %chosen.id,
            arm = %chosen.name,
            "arm selected"
        );

        Ok(SelectionResult {
            experiment_id: experiment_id.to_string(),
            arm: chosen,
        })
    }

    /// Record one success/failure outcome against an arm.
    ///
    /// Returns the post-increment pair. A failure leaves counters unchanged
    /// and is reported to the caller, never swallowed.
    pub fn record_outcome(&self, arm_id: &str, success: bool) -> Result<(u64, u64), EngineError> {
        self.registry.record_outcome(arm_id, success)
    }
}

// =============================================================================
// Tests
// =============================================================================
