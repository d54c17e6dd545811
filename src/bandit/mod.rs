// =============================================================================
// Bandit Module — Thompson Sampling arm selection
// =============================================================================
//
// Each arm accumulates successes/failures parameterising a Beta posterior:
//   - a never-tried arm samples from Beta(1, 1), the uniform distribution,
//     so every new arm gets a fair initial chance;
//   - an arm with history samples from Beta(successes + 1, failures + 1).
//
// Selection draws one sample per arm and returns the arm with the highest
// draw — a principled explore/exploit balance with no tuning knobs.
//
// Selection is read-only: it consumes snapshots and never touches counters.

pub mod sampler;

use rand::Rng;

use crate::error::EngineError;
use crate::types::ArmSnapshot;

/// Select the next arm to present via Thompson Sampling.
///
/// The input order matters: ties (possible only in degenerate scenarios, as
/// draws are continuous) resolve to the first arm encountered. An empty slice
/// is a contract violation and yields `InvalidInput` rather than a default
/// arm.
pub fn select_arm<'a, R: Rng + ?Sized>(
    arms: &'a [ArmSnapshot],
    rng: &mut R,
) -> Result<&'a ArmSnapshot, EngineError> {
    if arms.is_empty() {
        return Err(EngineError::invalid("selection requires at least one arm"));
    }

    let mut best_sample = f64::NEG_INFINITY;
    let mut best_arm: Option<&ArmSnapshot> = None;

    for arm in arms {
        let alpha = arm.successes as f64 + 1.0;
        let beta = arm.failures as f64 + 1.0;
        let sample = sampler::sample_beta(rng, alpha, beta);

        // Strict `>`: on an exact tie the earlier arm keeps the slot. A `>=`
        // here would silently bias toward the last arm.
        if sample > best_sample {
            best_sample = sample;
            best_arm = Some(arm);
        }
    }

    // Every Beta draw is >= 0, so the first arm always displaces the
    // NEG_INFINITY sentinel.
    best_arm.ok_or_else(|| EngineError::invalid("selection produced no winner"))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn arm(id: &str, successes: u64, failures: u64) -> ArmSnapshot {
        ArmSnapshot {
            id: id.to_string(),
            name: id.to_string(),
            successes,
            failures,
        }
    }

    #[test]
    fn empty_arm_set_is_invalid_input() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = select_arm(&[], &mut rng);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn single_arm_is_always_selected() {
        let mut rng = StdRng::seed_from_u64(2);
        let arms = vec![arm("only", 3, 7)];
        for _ in 0..100 {
            let chosen = select_arm(&arms, &mut rng).unwrap();
            assert_eq!(chosen.id, "only");
        }
    }

    #[test]
    fn dominant_arm_wins_large_majority() {
        // (100, 0) vs (0, 100) vs (50, 50): the first arm's posterior is
        // concentrated near 1 and must win well over 80% of trials.
        let mut rng = StdRng::seed_from_u64(3);
        let arms = vec![
            arm("strong", 100, 0),
            arm("weak", 0, 100),
            arm("middling", 50, 50),
        ];

        let trials = 1_000;
        let mut strong_wins = 0;
        for _ in 0..trials {
            if select_arm(&arms, &mut rng).unwrap().id == "strong" {
                strong_wins += 1;
            }
        }
        assert!(
            strong_wins > 800,
            "strong arm won only {strong_wins}/{trials} trials"
        );
    }

    #[test]
    fn untried_arms_split_roughly_evenly() {
        // Two fresh arms both sample Beta(1,1); neither should dominate.
        let mut rng = StdRng::seed_from_u64(4);
        let arms = vec![arm("a", 0, 0), arm("b", 0, 0)];

        let trials = 2_000;
        let mut a_wins = 0;
        for _ in 0..trials {
            if select_arm(&arms, &mut rng).unwrap().id == "a" {
                a_wins += 1;
            }
        }
        // 50% +- 5 percentage points.
        assert!(
            (900..=1100).contains(&a_wins),
            "fresh arms split {a_wins}/{trials}"
        );
    }

    #[test]
    fn losing_arm_is_still_explored() {
        // Thompson keeps some probability mass on the underdog; with modest
        // evidence the weak arm must still be picked occasionally.
        let mut rng = StdRng::seed_from_u64(5);
        let arms = vec![arm("ahead", 8, 2), arm("behind", 2, 8)];

        let mut behind_wins = 0;
        for _ in 0..2_000 {
            if select_arm(&arms, &mut rng).unwrap().id == "behind" {
                behind_wins += 1;
            }
        }
        assert!(behind_wins > 0, "underdog was never explored");
    }

    #[test]
    fn selection_does_not_mutate_snapshots() {
        let mut rng = StdRng::seed_from_u64(6);
        let arms = vec![arm("a", 5, 5), arm("b", 1, 9)];
        let before: Vec<(u64, u64)> = arms.iter().map(|a| (a.successes, a.failures)).collect();
        for _ in 0..50 {
            let _ = select_arm(&arms, &mut rng).unwrap();
        }
        let after: Vec<(u64, u64)> = arms.iter().map(|a| (a.successes, a.failures)).collect();
        assert_eq!(before, after);
    }
}
