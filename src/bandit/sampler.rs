// =============================================================================
// Gamma / Beta samplers — the numeric building blocks of Thompson Sampling
// =============================================================================
//
// Beta(alpha, beta) is drawn as a ratio of two Gamma(shape, 1) variates:
//   x ~ Gamma(alpha), y ~ Gamma(beta)  =>  x / (x + y) ~ Beta(alpha, beta)
//
// Gamma sampling uses the Marsaglia–Tsang squeeze method for shape >= 1. For
// shape < 1 the draw is boosted: sample at shape + 1 and scale by
// U^(1/shape). The boost is exactly one extra step, never deep recursion.
//
// Both samplers take the RNG as a parameter so tests can run seeded.

use rand::Rng;
use rand_distr::StandardNormal;

/// Draw from Gamma(`shape`, 1).
///
/// Contract: `shape` must be strictly positive. The engine's own callers
/// always pass Laplace-smoothed counts (>= 1.0), so the sub-1 branch only
/// matters for direct callers.
pub fn sample_gamma<R: Rng + ?Sized>(rng: &mut R, shape: f64) -> f64 {
    debug_assert!(shape > 0.0, "gamma shape must be positive, got {shape}");

    if shape < 1.0 {
        // Boost step: one draw at shape + 1 (>= 1, so no further boosting),
        // scaled down by U^(1/shape).
        let boosted = marsaglia_tsang(rng, shape + 1.0);
        let u: f64 = rng.gen();
        return boosted * u.powf(1.0 / shape);
    }

    marsaglia_tsang(rng, shape)
}

/// Marsaglia–Tsang rejection sampler for Gamma(`shape`, 1), shape >= 1.
///
/// Expected iterations per draw is close to 1, but the loop is unbounded in
/// the worst case; it terminates with probability 1.
fn marsaglia_tsang<R: Rng + ?Sized>(rng: &mut R, shape: f64) -> f64 {
    let d = shape - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();

    loop {
        let x: f64 = rng.sample(StandardNormal);
        let v = (1.0 + c * x).powi(3);
        if v <= 0.0 {
            continue;
        }

        let u: f64 = rng.gen();
        // Cheap squeeze first; the log check catches the rest.
        if u < 1.0 - 0.331 * x.powi(4) || u.ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
            return d * v;
        }
    }
}

/// Draw from Beta(`alpha`, `beta`). Returns a value in [0, 1].
///
/// Contract: both parameters must be strictly positive.
pub fn sample_beta<R: Rng + ?Sized>(rng: &mut R, alpha: f64, beta: f64) -> f64 {
    debug_assert!(
        alpha > 0.0 && beta > 0.0,
        "beta parameters must be positive, got ({alpha}, {beta})"
    );

    let x = sample_gamma(rng, alpha);
    let y = sample_gamma(rng, beta);
    beta_ratio(x, y)
}

/// Combine two Gamma draws into a Beta variate.
///
/// If both draws underflowed to exactly 0.0 the ratio would be NaN; that case
/// resolves to 0.5, the midpoint of the uniform Beta(1,1). Astronomically
/// unlikely, but representable in floating point at extreme shapes.
fn beta_ratio(x: f64, y: f64) -> f64 {
    let total = x + y;
    if total == 0.0 {
        return 0.5;
    }
    x / total
}

// =============================================================================
// Tests
// =============================================================================
