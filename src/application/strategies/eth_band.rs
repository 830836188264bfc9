//! ETH band strategy: reversal/momentum bearish-spike patterns plus a
//! quiet-long EMA pattern (spec.md 4.4.2).

use super::base::{ema, vol_ratio};
use super::btc_wall::exit_scan_generic;
use super::spike::{self, VOL_WINDOW};
use super::traits::{ScanOutput, StrategyContext, TradingStrategy};
use crate::domain::position::ExitMode;
use crate::domain::signal::{Action, Signal};
use crate::domain::threshold_cache::ThresholdCache;
use crate::domain::types::{Candle, confirmed_index};

const PAD_LOW: f64 = 0.0005;
const MIN_DIST_LOW: f64 = 0.0025;
const PAD_HIGH: f64 = 0.0005;
const MIN_DIST_HIGH: f64 = 0.0035;

pub struct EthBandStrategy;

impl TradingStrategy for EthBandStrategy {
    fn family(&self) -> &'static str {
        "eth_band"
    }

    fn exit_scan(&self, ctx: &StrategyContext<'_>) -> Option<Signal> {
        exit_scan_generic(ctx, "ETH")
    }

    fn entry_scan(&self, ctx: &StrategyContext<'_>, prior_cache: Option<ThresholdCache>) -> ScanOutput {
        let candles = &ctx.snapshot.candles_5m;
        let Some(idx) = confirmed_index(candles) else {
            return ScanOutput::default();
        };
        let zones = &ctx.zones.eth_band;

        let Some((scan, next_cache)) = spike::scan(candles, idx, zones.reversal_min_ratio.min(zones.momentum_min_ratio), prior_cache) else {
            return ScanOutput::default();
        };

        let entry = candles[idx].c;
        let (low, high) = (candles[idx].l, candles[idx].h);

        let signal = if scan.bearish
            && scan.ratio >= zones.reversal_min_ratio
            && scan.h4_pos < zones.reversal_max_h4_pos
        {
            let sl = (low * (1.0 - PAD_LOW)).min(entry * (1.0 - MIN_DIST_LOW));
            Some(
                Signal::new("ETH", Action::Long, "pattern_a_reversal")
                    .with_levels(entry, sl, entry * (1.0 + 0.005))
                    .with_exit(ExitMode::TimeCut, 12)
                    .with_vol_ratio(scan.ratio)
                    .with_pattern("pattern_a", "reversal"),
            )
        } else if scan.bearish
            && scan.ratio >= zones.momentum_min_ratio
            && scan.ratio < zones.momentum_max_ratio
            && scan.h4_pos >= zones.momentum_min_h4_pos
        {
            let sl = (high * (1.0 + PAD_HIGH)).max(entry * (1.0 + MIN_DIST_HIGH));
            // Sentinel TP: momentum exits are time-cut driven, but the
            // R:R gate still needs a level to evaluate against.
            let sentinel_tp = entry * (1.0 - (sl - entry).abs() / entry * 1.2);
            Some(
                Signal::new("ETH", Action::Short, "pattern_b_momentum")
                    .with_levels(entry, sl, sentinel_tp)
                    .with_exit(ExitMode::TimeCut, 15)
                    .with_vol_ratio(scan.ratio)
                    .with_pattern("pattern_b", "momentum"),
            )
        } else {
            let cross_5m = matches!((ema(candles, idx, 9), ema(candles, idx, 21)), (Some(ema9), Some(ema21)) if ema9 > ema21);
            let golden_4h = ema_golden_cross_4h(&ctx.snapshot.candles_4h);

            if (cross_5m || golden_4h) && scan.h4_pos < zones.quiet_long_max_h4_pos {
                let short_long_ratio = vol_ratio(candles, idx, VOL_WINDOW).unwrap_or(1.0);
                if short_long_ratio < 0.60 {
                    // Confidence 0.75 when the 5m cross itself fires;
                    // 0.72 when only the 4H golden cross confirms it
                    // (spec.md 4.4.2).
                    let confidence = if cross_5m { 0.75 } else { 0.72 };
                    Some(
                        Signal::new("ETH", Action::Long, "pattern_c_quiet_long")
                            .with_confidence(confidence)
                            .with_levels(entry, entry * (1.0 - 0.006), entry * (1.0 + 0.004))
                            .with_exit(ExitMode::TimeCut, 10)
                            .with_pattern("pattern_c", "quiet_long"),
                    )
                } else {
                    None
                }
            } else {
                None
            }
        };

        match signal {
            Some(signal) => ScanOutput::signal_only(signal).with_cache(next_cache),
            None => ScanOutput::default().with_cache(next_cache),
        }
    }
}

/// Pattern C's alternate trigger (spec.md 4.4.2): EMA9>EMA21 on the
/// confirmed 4H candle, grounded on
/// `original_source/src/hypothesis/manager.py::ema_cross_4h`.
fn ema_golden_cross_4h(candles_4h: &[Candle]) -> bool {
    let Some(idx) = confirmed_index(candles_4h) else {
        return false;
    };
    matches!((ema(candles_4h, idx, 9), ema(candles_4h, idx, 21)), (Some(ema9), Some(ema21)) if ema9 > ema21)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyZones;
    use crate::application::strategies::traits::PositionInfo;
    use crate::domain::types::{Candle, SymbolSnapshot};

    fn candles_for_reversal() -> Vec<Candle> {
        let mut candles: Vec<Candle> = (0..300)
            .map(|i| Candle {
                t: i * 300_000,
                o: 100.0,
                h: 105.0,
                l: 95.0,
                c: 100.0,
                v: 10.0,
            })
            .collect();
        let last_confirmed = candles.len() - 2;
        candles[last_confirmed].o = 100.0;
        candles[last_confirmed].c = 93.0; // deep below the established range
        candles[last_confirmed].h = 100.0;
        candles[last_confirmed].l = 88.0;
        candles[last_confirmed].v = 150.0; // ratio 15 >= 7.0
        candles
    }

    #[test]
    fn deep_spike_below_range_is_reversal_long() {
        let candles = candles_for_reversal();
        let snapshot = SymbolSnapshot {
            symbol: "ETH".to_string(),
            candles_5m: candles,
            mid_price: Some(93.0),
            ..Default::default()
        };
        let position = PositionInfo {
            exit_meta: None,
            has_live_position: false,
            pending_reversion: None,
        };
        let zones = StrategyZones::default();
        let ctx = StrategyContext {
            snapshot: &snapshot,
            position: &position,
            zones: &zones,
            now_ms: 0,
        };
        let strategy = EthBandStrategy;
        let output = strategy.entry_scan(&ctx, None);
        let signal = output.signal.expect("expected a reversal long signal");
        assert_eq!(signal.action, Action::Long);
        assert_eq!(signal.pattern.as_deref(), Some("pattern_a"));
    }

    /// Builds a bullish (non-spike) confirmed 5m bar that closes low in
    /// the established range -- no 5m EMA9>EMA21 cross -- plus a rising
    /// 4H series whose EMA9>EMA21. Only the 4H golden cross should carry
    /// pattern C, at the lower 0.72 confidence (spec.md 4.4.2).
    fn candles_for_quiet_long_via_4h_golden() -> Vec<Candle> {
        let mut candles: Vec<Candle> = (0..300)
            .map(|i| Candle {
                t: i * 300_000,
                o: 100.0,
                h: 105.0,
                l: 95.0,
                c: 100.0,
                v: 10.0,
            })
            .collect();
        let last_confirmed = candles.len() - 2;
        candles[last_confirmed].o = 94.0;
        candles[last_confirmed].c = 95.0; // bullish, closes low in range -> h4_pos 0
        candles[last_confirmed].h = 96.0;
        candles[last_confirmed].l = 93.0;
        candles[last_confirmed].v = 1.0; // short/long vol ratio well below 0.60
        candles
    }

    fn candles_4h_golden_cross() -> Vec<Candle> {
        let mut candles: Vec<Candle> = (0..30)
            .map(|i| Candle {
                t: i * 14_400_000,
                o: 100.0,
                h: 101.0,
                l: 99.0,
                c: 100.0,
                v: 10.0,
            })
            .collect();
        let last_confirmed = candles.len() - 2;
        candles[last_confirmed].o = 100.0;
        candles[last_confirmed].c = 110.0; // rising bar pulls EMA9 above EMA21
        candles
    }

    #[test]
    fn quiet_long_fires_at_lower_confidence_on_4h_golden_cross_alone() {
        let snapshot = SymbolSnapshot {
            symbol: "ETH".to_string(),
            candles_5m: candles_for_quiet_long_via_4h_golden(),
            candles_4h: candles_4h_golden_cross(),
            mid_price: Some(95.0),
            ..Default::default()
        };
        let position = PositionInfo {
            exit_meta: None,
            has_live_position: false,
            pending_reversion: None,
        };
        let zones = StrategyZones::default();
        let ctx = StrategyContext {
            snapshot: &snapshot,
            position: &position,
            zones: &zones,
            now_ms: 0,
        };
        let strategy = EthBandStrategy;
        let output = strategy.entry_scan(&ctx, None);
        let signal = output.signal.expect("expected a quiet-long signal from the 4H golden cross");
        assert_eq!(signal.action, Action::Long);
        assert_eq!(signal.pattern.as_deref(), Some("pattern_c"));
        assert_eq!(signal.confidence, 0.72);
    }
}
