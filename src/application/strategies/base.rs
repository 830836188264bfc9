//! Shared analytics over confirmed candle data. Every per-symbol
//! strategy builds its zone/pattern logic on top of these; none of them
//! touch raw candle arithmetic directly.

use crate::domain::types::Candle;

/// Volume ratio of the bar at `idx` against the trailing mean of the
/// `window` bars ending just before it. `None` if there isn't a full
/// window available.
pub fn vol_ratio(candles: &[Candle], idx: usize, window: usize) -> Option<f64> {
    if idx < window {
        return None;
    }
    let trailing = &candles[idx - window..idx];
    let mean: f64 = trailing.iter().map(|c| c.v).sum::<f64>() / window as f64;
    if mean <= 0.0 {
        return None;
    }
    Some(candles[idx].v / mean)
}

/// `(min_low, max_high)` over the `window` bars *preceding* `idx` (the
/// established range the bar at `idx` may be breaking out of). Excludes
/// `idx` itself — otherwise a breakout bar's own high/low would always
/// bound its own close and `range_position` could never read outside
/// `[0, 100]`.
pub fn h4_range(candles: &[Candle], idx: usize, window: usize) -> Option<(f64, f64)> {
    if idx < window {
        return None;
    }
    let slice = &candles[idx - window..idx];
    let min_low = slice.iter().map(|c| c.l).fold(f64::INFINITY, f64::min);
    let max_high = slice.iter().map(|c| c.h).fold(f64::NEG_INFINITY, f64::max);
    Some((min_low, max_high))
}

/// Signed percentile of `close` within `[low, high]`. Can fall outside
/// `[0, 100]` when `close` is outside the range itself.
pub fn range_position(close: f64, low: f64, high: f64) -> f64 {
    let span = high - low;
    if span <= 0.0 {
        return 50.0;
    }
    (close - low) / span * 100.0
}

/// `(multiplier, label)` describing the volatility-adjustment-step
/// (VAS) multiplier for the bar at `idx`, derived from a fast
/// true-range-proxy ATR ratio.
pub fn atr_volatility_multiplier(
    candles: &[Candle],
    idx: usize,
    short_window: usize,
    long_window: usize,
    high_vol_threshold: f64,
    low_vol_threshold: f64,
    high_vol_factor: f64,
    low_vol_factor: f64,
) -> (f64, &'static str) {
    let atr = |window: usize| -> Option<f64> {
        if idx + 1 < window {
            return None;
        }
        let slice = &candles[idx + 1 - window..=idx];
        Some(slice.iter().map(|c| c.h - c.l).sum::<f64>() / window as f64)
    };
    let (short, long) = match (atr(short_window), atr(long_window)) {
        (Some(s), Some(l)) if l > 0.0 => (s, l),
        _ => return (1.0, "normal"),
    };
    let ratio = short / long;
    if ratio > high_vol_threshold {
        (high_vol_factor, "high_vol")
    } else if ratio < low_vol_threshold {
        (low_vol_factor, "low_vol")
    } else {
        (1.0, "normal")
    }
}

/// Wilder-style RSI over `period` bars ending at `idx`.
pub fn rsi(candles: &[Candle], idx: usize, period: usize) -> Option<f64> {
    if idx < period {
        return None;
    }
    let mut gains = 0.0;
    let mut losses = 0.0;
    for i in idx - period + 1..=idx {
        let delta = candles[i].c - candles[i - 1].c;
        if delta >= 0.0 {
            gains += delta;
        } else {
            losses -= delta;
        }
    }
    if losses == 0.0 {
        return Some(100.0);
    }
    let rs = (gains / period as f64) / (losses / period as f64);
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Percent price change over the trailing `n` bars ending at `idx`.
pub fn price_momentum(candles: &[Candle], idx: usize, n: usize) -> Option<f64> {
    if idx < n {
        return None;
    }
    let base = candles[idx - n].c;
    if base <= 0.0 {
        return None;
    }
    Some((candles[idx].c - base) / base * 100.0)
}

/// Average `body_size() / range()` over the trailing `n` bars ending at
/// `idx` (candles with zero range are skipped).
pub fn candle_body_ratio(candles: &[Candle], idx: usize, n: usize) -> Option<f64> {
    if idx + 1 < n {
        return None;
    }
    let slice = &candles[idx + 1 - n..=idx];
    let ratios: Vec<f64> = slice
        .iter()
        .filter(|c| c.range() > 0.0)
        .map(|c| c.body_size() / c.range())
        .collect();
    if ratios.is_empty() {
        return None;
    }
    Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
}

/// Bollinger-band squeeze indicator: true when the band width (as a
/// fraction of the mean) falls under `squeeze_threshold`.
pub fn bb_squeeze(
    candles: &[Candle],
    idx: usize,
    period: usize,
    stddev_mult: f64,
    squeeze_threshold: f64,
) -> Option<bool> {
    if idx + 1 < period {
        return None;
    }
    let slice = &candles[idx + 1 - period..=idx];
    let mean = slice.iter().map(|c| c.c).sum::<f64>() / period as f64;
    if mean <= 0.0 {
        return None;
    }
    let variance = slice.iter().map(|c| (c.c - mean).powi(2)).sum::<f64>() / period as f64;
    let stddev = variance.sqrt();
    let band_width = 2.0 * stddev_mult * stddev;
    Some(band_width / mean < squeeze_threshold)
}

/// Exponential moving average over `period`, ending at `idx`.
pub fn ema(candles: &[Candle], idx: usize, period: usize) -> Option<f64> {
    if idx + 1 < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let start = idx + 1 - period;
    let mut value = candles[start].c;
    for c in &candles[start + 1..=idx] {
        value = c.c * k + value * (1.0 - k);
    }
    Some(value)
}

/// Confidence-adaptive position-sizing leverage mapping (CAPS,
/// spec.md 4.4): `>=0.80 -> base`, `>=0.74 -> max(1, base-1)`, else
/// `max(1, base-2)`.
pub fn confidence_to_leverage(confidence: f64, base: u32) -> u32 {
    if confidence >= 0.80 {
        base
    } else if confidence >= 0.74 {
        base.saturating_sub(1).max(1)
    } else {
        base.saturating_sub(2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(t: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Candle {
        Candle { t, o, h, l, c, v }
    }

    #[test]
    fn vol_ratio_against_trailing_mean() {
        let candles = vec![
            candle(0, 1.0, 1.0, 1.0, 1.0, 10.0),
            candle(1, 1.0, 1.0, 1.0, 1.0, 10.0),
            candle(2, 1.0, 1.0, 1.0, 1.0, 10.0),
            candle(3, 1.0, 1.0, 1.0, 1.0, 50.0),
        ];
        assert_eq!(vol_ratio(&candles, 3, 3), Some(5.0));
        assert_eq!(vol_ratio(&candles, 1, 3), None);
    }

    #[test]
    fn range_position_can_exceed_bounds() {
        assert_eq!(range_position(50.0, 0.0, 100.0), 50.0);
        assert_eq!(range_position(-10.0, 0.0, 100.0), -10.0);
        assert_eq!(range_position(110.0, 0.0, 100.0), 110.0);
    }

    #[test]
    fn confidence_to_leverage_thresholds() {
        assert_eq!(confidence_to_leverage(0.85, 3), 3);
        assert_eq!(confidence_to_leverage(0.75, 3), 2);
        assert_eq!(confidence_to_leverage(0.50, 3), 1);
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let candles = vec![
            candle(0, 1.0, 1.0, 1.0, 10.0, 1.0),
            candle(1, 1.0, 1.0, 1.0, 11.0, 1.0),
            candle(2, 1.0, 1.0, 1.0, 12.0, 1.0),
        ];
        assert_eq!(rsi(&candles, 2, 2), Some(100.0));
    }
}
