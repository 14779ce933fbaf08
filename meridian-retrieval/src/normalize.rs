//! Non-linear score remapping for low-signal keyword batches.
//!
//! When the best Jaccard score in a batch is weak, raw scores collapse into
//! a narrow low band and the merge weights drown them. The remap min-max
//! normalizes the batch and maps it monotonically into [floor, ceiling]
//! (default [0.5, 0.95]).

use meridian_core::config::{defaults, NormalizeMethod};

const FLOOR: f64 = defaults::DEFAULT_NORMALIZE_FLOOR;
const SPAN: f64 = defaults::DEFAULT_NORMALIZE_CEILING - defaults::DEFAULT_NORMALIZE_FLOOR;

/// Value assigned when every score in the batch is identical.
const FLAT_BATCH_SCORE: f64 = 0.8;

/// Remap a min-max-normalized value `x` in [0, 1] into [floor, ceiling].
pub fn remap(x: f64, method: NormalizeMethod) -> f64 {
    let x = x.clamp(0.0, 1.0);
    let shaped = match method {
        NormalizeMethod::Sigmoid => {
            // Steepened logistic centered on 0.5.
            1.0 / (1.0 + (-(x - 0.5) * 6.0).exp())
        }
        NormalizeMethod::Power => x.powf(0.6),
        NormalizeMethod::Log => (x.max(0.001) + 1.0).ln() / 2.0_f64.ln(),
        NormalizeMethod::Exponential => (x.exp() - 1.0) / (std::f64::consts::E - 1.0),
        NormalizeMethod::Tanh => (((x - 0.5) * 3.0).tanh() + 1.0) / 2.0,
    };
    FLOOR + SPAN * shaped
}

/// Remap a whole batch in place. Scores are min-max normalized first; a flat
/// batch pins to [`FLAT_BATCH_SCORE`].
pub fn normalize_batch(scores: &mut [f64], method: NormalizeMethod) {
    if scores.is_empty() {
        return;
    }
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if (max - min).abs() < 1e-6 {
        for s in scores.iter_mut() {
            *s = FLAT_BATCH_SCORE;
        }
        return;
    }

    for s in scores.iter_mut() {
        let x = (*s - min) / (max - min);
        *s = remap(x, method);
    }
}
