// =============================================================================
// Engine error taxonomy
// =============================================================================
//
// Four failure classes cross the engine boundary:
//   - InvalidInput        -> caller bug (empty arm set, zero-arm experiment)
//   - ExperimentNotFound  -> unknown experiment identifier
//   - ArmNotFound         -> unknown arm identifier
//   - Store               -> the persistence layer could not read or write
//
// Numeric degeneracy in the samplers (the 0/0 Beta ratio) never escapes the
// bandit module; it resolves to a defined fallback value there.
// =============================================================================

use thiserror::Error;

/// Errors surfaced by the experiment registry and decision engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The caller supplied input the engine cannot act on. Recording never
    /// mutates state on this path.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No experiment with the given identifier exists.
    #[error("experiment not found: {id}")]
    ExperimentNotFound { id: String },

    /// No arm with the given identifier exists. No counter is touched.
    #[error("arm not found: {id}")]
    ArmNotFound { id: String },

    /// The backing store failed to load or persist. In-memory counters are
    /// unaffected; the failure is reported, never retried here.
    #[error("store failure: {0}")]
    Store(String),
}

impl EngineError {
    /// Shorthand for an invalid-input error with a formatted message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_identifiers() {
        let err = EngineError::ExperimentNotFound {
            id: "exp-123".to_string(),
        };
        assert!(err.to_string().contains("exp-123"));

        let err = EngineError::ArmNotFound {
            id: "arm-9".to_string(),
        };
        assert!(err.to_string().contains("arm-9"));
    }

    #[test]
    fn invalid_helper_wraps_message() {
        let err = EngineError::invalid("at least one arm is required");
        assert_eq!(
            err.to_string(),
            "invalid input: at least one arm is required"
        );
    }
}
