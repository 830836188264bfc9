//! SOL wall strategy: bearish volume-spike penetration/upper short
//! zones, a short-side funding-rate gate, and a quiet-short pattern E
//! (spec.md 4.4.2).

use super::base::{candle_body_ratio, ema, price_momentum, rsi, bb_squeeze, vol_ratio};
use super::btc_wall::exit_scan_generic;
use super::spike::{self, VOL_WINDOW};
use super::traits::{ScanOutput, StrategyContext, TradingStrategy};
use crate::domain::position::ExitMode;
use crate::domain::signal::{Action, Signal};
use crate::domain::threshold_cache::ThresholdCache;
use crate::domain::types::confirmed_index;

pub struct SolWallStrategy;

impl SolWallStrategy {
    fn pattern_e_quiet_short(ctx: &StrategyContext<'_>, idx: usize) -> Option<Signal> {
        let candles = &ctx.snapshot.candles_5m;
        let zones = &ctx.zones.sol_wall;
        let ema9 = ema(candles, idx, 9)?;
        let ema21 = ema(candles, idx, 21)?;
        if ema9 <= ema21 {
            return None;
        }
        let (scan, _) = spike::scan(candles, idx, zones.vol_threshold, None)?;
        if scan.h4_pos < zones.quiet_short_min_h4_pos {
            return None;
        }
        let short_long_ratio = vol_ratio(candles, idx, VOL_WINDOW)?;
        if short_long_ratio >= 0.50 {
            return None;
        }
        let rsi_value = rsi(candles, idx, 14)?;
        if rsi_value <= 55.0 {
            return None;
        }
        let momentum = price_momentum(candles, idx, 6)?;
        if momentum > 0.20 {
            return None;
        }
        let body_ratio = candle_body_ratio(candles, idx, 6).unwrap_or(0.0);
        let squeeze = bb_squeeze(candles, idx, 20, 2.0, 0.6).unwrap_or(false);
        if body_ratio < 0.25 && !squeeze {
            return None;
        }
        let entry = candles[idx].c;
        Some(
            Signal::new("SOL", Action::Short, "pattern_e_quiet_short")
                .with_levels(entry, entry * (1.0 + 0.005), entry * (1.0 - 0.004))
                .with_exit(ExitMode::TimeCut, 10)
                .with_pattern("pattern_e", "quiet_short"),
        )
    }
}

impl TradingStrategy for SolWallStrategy {
    fn family(&self) -> &'static str {
        "sol_wall"
    }

    fn exit_scan(&self, ctx: &StrategyContext<'_>) -> Option<Signal> {
        exit_scan_generic(ctx, "SOL")
    }

    fn entry_scan(&self, ctx: &StrategyContext<'_>, prior_cache: Option<ThresholdCache>) -> ScanOutput {
        let candles = &ctx.snapshot.candles_5m;
        let Some(idx) = confirmed_index(candles) else {
            return ScanOutput::default();
        };
        let zones = &ctx.zones.sol_wall;

        let Some((scan, next_cache)) = spike::scan(candles, idx, zones.vol_threshold, prior_cache) else {
            return ScanOutput::default();
        };

        if !scan.is_spike {
            if let Some(signal) = Self::pattern_e_quiet_short(ctx, idx) {
                return ScanOutput::signal_only(signal).with_cache(next_cache);
            }
            return ScanOutput::default().with_cache(next_cache);
        }

        // SHORT funding gate: block squeeze risk regardless of zone.
        let funding_blocked = ctx
            .snapshot
            .funding_rate
            .map(|r| r < zones.short_funding_gate)
            .unwrap_or(false);

        let entry = candles[idx].c;
        let signal = if zones.penetration.contains(scan.h4_pos) {
            if funding_blocked {
                None
            } else {
                Some(
                    Signal::new("SOL", Action::Short, "penetration_zone_bearish_spike")
                        .with_levels(entry, entry * (1.0 + 0.008), entry * (1.0 - 0.015))
                        .with_exit(ExitMode::TimeCut, 10)
                        .with_vol_ratio(scan.ratio)
                        .with_pattern("wall", "penetration"),
                )
            }
        } else if zones.upper.contains(scan.h4_pos) {
            if funding_blocked {
                None
            } else {
                Some(
                    Signal::new("SOL", Action::Short, "upper_zone_bearish_spike")
                        .with_levels(entry, entry * (1.0 + 0.006), entry * (1.0 - 0.012))
                        .with_exit(ExitMode::TimeCut, 10)
                        .with_vol_ratio(scan.ratio)
                        .with_pattern("wall", "upper"),
                )
            }
        } else {
            None
        };

        match signal {
            Some(signal) => ScanOutput::signal_only(signal).with_cache(next_cache),
            None => ScanOutput::default().with_cache(next_cache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyZones;
    use crate::application::strategies::traits::PositionInfo;
    use crate::domain::types::{Candle, SymbolSnapshot};

    fn base_candles() -> Vec<Candle> {
        // 288 flat bars establish the vol_ratio/H4 trailing windows.
        (0..300)
            .map(|i| Candle {
                t: i * 300_000,
                o: 100.0,
                h: 105.0,
                l: 95.0,
                c: 100.0,
                v: 10.0,
            })
            .collect()
    }

    #[test]
    fn funding_gate_blocks_penetration_short() {
        let mut candles = base_candles();
        let last_confirmed = candles.len() - 2;
        candles[last_confirmed].o = 100.0;
        candles[last_confirmed].c = 94.0;
        candles[last_confirmed].h = 100.0;
        candles[last_confirmed].l = 90.0;
        candles[last_confirmed].v = 100.0;

        let snapshot = SymbolSnapshot {
            symbol: "SOL".to_string(),
            candles_5m: candles,
            mid_price: Some(94.0),
            funding_rate: Some(-0.0001), // below -5e-5 gate
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
        let output = SolWallStrategy.entry_scan(&ctx, None);
        assert!(output.signal.is_none());
    }
}
