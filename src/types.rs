// =============================================================================
// Shared types used across the Helios A/B engine
// =============================================================================

use serde::{Deserialize, Serialize};

/// Point-in-time view of one arm's counters, taken at call time.
///
/// The pair `{successes, failures}` is read under the arm's counter lock, so
/// the two fields always belong to the same instant. Snapshots are never
/// cached across calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmSnapshot {
    pub id: String,
    pub name: String,
    pub successes: u64,
    pub failures: u64,
}

impl ArmSnapshot {
    /// Total number of recorded outcomes for this arm.
    pub fn pulls(&self) -> u64 {
        self.successes + self.failures
    }

    /// Raw observed success rate; 0.0 for a never-pulled arm.
    pub fn observed_rate(&self) -> f64 {
        let pulls = self.pulls();
        if pulls == 0 {
            0.0
        } else {
            self.successes as f64 / pulls as f64
        }
    }

    /// Posterior mean of the Laplace-smoothed Beta belief:
    /// `(successes + 1) / (successes + failures + 2)`.
    ///
    /// An untried arm sits at 0.5 — the mean of the uniform prior.
    pub fn posterior_mean(&self) -> f64 {
        (self.successes as f64 + 1.0) / (self.pulls() as f64 + 2.0)
    }

    /// 95% Wald interval around the observed rate, clamped to [0, 1].
    ///
    /// With zero pulls the interval is the maximally-uninformative (0, 1).
    pub fn confidence_interval(&self) -> (f64, f64) {
        let pulls = self.pulls();
        if pulls == 0 {
            return (0.0, 1.0);
        }
        let rate = self.observed_rate();
        let half_width = 1.96 * (rate * (1.0 - rate) / pulls as f64).sqrt();
        ((rate - half_width).max(0.0), (rate + half_width).min(1.0))
    }
}

/// The arm chosen by one selection call. A read-only projection; the engine
/// does not persist it.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionResult {
    pub experiment_id: String,
    pub arm: ArmSnapshot,
}

/// Per-arm statistics row for the stats endpoint and dashboard snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ArmStatsReport {
    pub id: String,
    pub name: String,
    pub successes: u64,
    pub failures: u64,
    pub pulls: u64,
    pub observed_rate: f64,
    pub posterior_mean: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl From<&ArmSnapshot> for ArmStatsReport {
    fn from(snapshot: &ArmSnapshot) -> Self {
        let (ci_lower, ci_upper) = snapshot.confidence_interval();
        Self {
            id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            successes: snapshot.successes,
            failures: snapshot.failures,
            pulls: snapshot.pulls(),
            observed_rate: snapshot.observed_rate(),
            posterior_mean: snapshot.posterior_mean(),
            ci_lower,
            ci_upper,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(successes: u64, failures: u64) -> ArmSnapshot {
        ArmSnapshot {
            id: "arm-1".to_string(),
            name: "Arm 1".to_string(),
            successes,
            failures,
        }
    }

    #[test]
    fn untried_arm_has_uniform_posterior() {
        let arm = snapshot(0, 0);
        assert_eq!(arm.pulls(), 0);
        assert_eq!(arm.observed_rate(), 0.0);
        assert!((arm.posterior_mean() - 0.5).abs() < 1e-12);
        assert_eq!(arm.confidence_interval(), (0.0, 1.0));
    }

    #[test]
    fn posterior_mean_tracks_counts() {
        // 10 successes, 0 failures => 11/12
        let arm = snapshot(10, 0);
        assert!((arm.posterior_mean() - 11.0 / 12.0).abs() < 1e-12);

        // 0 successes, 10 failures => 1/12
        let arm = snapshot(0, 10);
        assert!((arm.posterior_mean() - 1.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn confidence_interval_clamped_to_unit() {
        // Perfect record: rate 1.0, Wald half-width 0 -> degenerate at 1.
        let arm = snapshot(50, 0);
        let (lo, hi) = arm.confidence_interval();
        assert!((0.0..=1.0).contains(&lo));
        assert!((0.0..=1.0).contains(&hi));
        assert!(lo <= hi);

        // Balanced record: interval straddles the rate.
        let arm = snapshot(50, 50);
        let (lo, hi) = arm.confidence_interval();
        assert!(lo < 0.5 && 0.5 < hi);
    }

    #[test]
    fn stats_report_mirrors_snapshot() {
        let arm = snapshot(30, 10);
        let report = ArmStatsReport::from(&arm);
        assert_eq!(report.pulls, 40);
        assert!((report.observed_rate - 0.75).abs() < 1e-12);
        assert_eq!(report.successes, 30);
        assert_eq!(report.failures, 10);
        assert!(report.ci_lower < report.observed_rate);
        assert!(report.ci_upper > report.observed_rate - 1e-9);
    }
}
