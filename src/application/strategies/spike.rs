//! Shared spike-scan skeleton (spec.md 4.4.1): steps 1-2 (threshold
//! cache fast-path, else compute ratio against a volatility-adjusted
//! threshold) and step 3 (H4 range position), common to every wall/band
//! strategy. Per-symbol strategies layer zone/pattern logic on top of
//! the `SpikeScan` this produces.

use super::base::{atr_volatility_multiplier, h4_range, range_position, vol_ratio};
use crate::domain::threshold_cache::{ThresholdCache, derive_threshold_vol};
use crate::domain::types::Candle;

pub const VOL_WINDOW: usize = 288;
pub const H4_WINDOW: usize = 48;
pub const ATR_SHORT_WINDOW: usize = 24;
pub const ATR_LONG_WINDOW: usize = 288;
pub const HIGH_VOL_THRESHOLD: f64 = 1.5;
pub const LOW_VOL_THRESHOLD: f64 = 0.7;
pub const HIGH_VOL_FACTOR: f64 = 1.20;
pub const LOW_VOL_FACTOR: f64 = 0.85;

#[derive(Debug, Clone, Copy)]
pub struct SpikeScan {
    pub idx: usize,
    pub is_spike: bool,
    pub ratio: f64,
    pub h4_pos: f64,
    pub bearish: bool,
}

/// Run the fast-path/slow-path volume-spike check for the last
/// confirmed bar, and derive the next cycle's threshold cache in the
/// same pass (step 1-3 of the spec's skeleton). Returns `None` if there
/// isn't enough candle history for any of the required windows.
pub fn scan(
    candles: &[Candle],
    idx: usize,
    base_threshold: f64,
    prior_cache: Option<ThresholdCache>,
) -> Option<(SpikeScan, ThresholdCache)> {
    let (vas_multiplier, _) = atr_volatility_multiplier(
        candles,
        idx,
        ATR_SHORT_WINDOW,
        ATR_LONG_WINDOW,
        HIGH_VOL_THRESHOLD,
        LOW_VOL_THRESHOLD,
        HIGH_VOL_FACTOR,
        LOW_VOL_FACTOR,
    );
    let effective_threshold = base_threshold * vas_multiplier;

    let candle = candles.get(idx)?;
    let bearish = candle.is_bearish();

    let is_spike = if let Some(cache) = prior_cache {
        if cache.fast_path_no_spike(candle.t, candle.v) {
            false
        } else {
            let ratio = vol_ratio(candles, idx, VOL_WINDOW)?;
            ratio >= effective_threshold && bearish
        }
    } else {
        let ratio = vol_ratio(candles, idx, VOL_WINDOW)?;
        ratio >= effective_threshold && bearish
    };

    let ratio = vol_ratio(candles, idx, VOL_WINDOW)?;
    let (low, high) = h4_range(candles, idx, H4_WINDOW)?;
    let h4_pos = range_position(candle.c, low, high);

    let window_candles = &candles[idx + 1 - VOL_WINDOW..idx];
    let prior_sum: f64 = window_candles.iter().map(|c| c.v).sum();
    let next_cache = ThresholdCache {
        next_target_t: candle.t + bar_interval(candles, idx),
        threshold_vol: derive_threshold_vol(VOL_WINDOW, effective_threshold, prior_sum),
    };

    Some((
        SpikeScan {
            idx,
            is_spike,
            ratio,
            h4_pos,
            bearish,
        },
        next_cache,
    ))
}

fn bar_interval(candles: &[Candle], idx: usize) -> i64 {
    if idx == 0 {
        return 0;
    }
    candles[idx].t - candles[idx - 1].t
}
