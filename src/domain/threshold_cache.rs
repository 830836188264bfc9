//! One-shot forward reference for the spike-scan fast path.
//!
//! Ported from `_build_next_cache` in the Python original's BTC-wall
//! strategy: given a trailing window of size `N`, a volume-ratio
//! threshold `T`, and the sum `S` of the `N-1` known prior bars, the
//! smallest next-bar volume `V` that would trigger `V / ((S+V)/N) >= T`
//! is `V >= T*S / (N-T)`. When `N <= T` the threshold is unreachable.
//!
//! Treat this as a value, not a live object: discard it on any
//! timestamp mismatch and rebuild on the slow path (spec Design Note 3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCache {
    pub next_target_t: i64,
    pub threshold_vol: f64,
}

impl ThresholdCache {
    /// `true` if `candle_t` matches this cache's expected next bar and
    /// `candle_v` falls under the precomputed threshold — the fast path
    /// that skips the O(window) ratio recomputation entirely.
    pub fn fast_path_no_spike(&self, candle_t: i64, candle_v: f64) -> bool {
        candle_t == self.next_target_t && candle_v < self.threshold_vol
    }
}

/// Derive the volume threshold for the next bar.
///
/// `window` is `N`, `threshold` is `T`, `prior_sum` is `S` (the sum of
/// the `N-1` known prior bars in the trailing window). Returns `+inf`
/// when `N <= T` (unreachable).
pub fn derive_threshold_vol(window: usize, threshold: f64, prior_sum: f64) -> f64 {
    let denominator = window as f64 - threshold;
    if denominator <= 0.0 {
        return f64::INFINITY;
    }
    threshold * prior_sum / denominator
}

pub fn build_next_cache(
    window: usize,
    threshold: f64,
    prior_sum: f64,
    next_target_t: i64,
) -> ThresholdCache {
    ThresholdCache {
        next_target_t,
        threshold_vol: derive_threshold_vol(window, threshold, prior_sum),
    }
}
