//! BTC wall strategy: bearish volume-spike penetration/upper/bottom
//! zones on the H4 range, plus a quiet-long pattern D fallback
//! (spec.md 4.4.2).

use super::base::{candle_body_ratio, ema, vol_ratio};
use super::spike::{self, VOL_WINDOW};
use super::traits::{PositionInfo, ScanOutput, StrategyContext, TradingStrategy};
use crate::config::zones::BtcWallZones;
use crate::domain::position::ExitMode;
use crate::domain::signal::{Action, Signal};
use crate::domain::types::{Side, confirmed_index};

pub struct BtcWallStrategy;

impl BtcWallStrategy {
    fn zones(ctx: &StrategyContext<'_>) -> &BtcWallZones {
        &ctx.zones.btc_wall
    }

    fn quiet_long_pattern_d(ctx: &StrategyContext<'_>, idx: usize) -> Option<Signal> {
        let candles = &ctx.snapshot.candles_5m;
        let ema9 = ema(candles, idx, 9)?;
        let ema21 = ema(candles, idx, 21)?;
        if ema9 <= ema21 {
            return None;
        }
        let (scan, _) = spike::scan(candles, idx, Self::zones(ctx).vol_threshold, None)?;
        if scan.h4_pos < 65.0 {
            return None;
        }
        let short_long_ratio = vol_ratio(candles, idx, VOL_WINDOW)?;
        if short_long_ratio >= 0.55 {
            return None;
        }
        let entry = candles[idx].c;
        Some(
            Signal::new("BTC", Action::Long, "pattern_d_quiet_long")
                .with_confidence(0.72)
                .with_levels(entry, entry * (1.0 - 0.005), entry * (1.0 + 0.003))
                .with_exit(ExitMode::TimeCut, 8)
                .with_pattern("pattern_d", "quiet_long"),
        )
    }
}

impl TradingStrategy for BtcWallStrategy {
    fn family(&self) -> &'static str {
        "btc_wall"
    }

    fn exit_scan(&self, ctx: &StrategyContext<'_>) -> Option<Signal> {
        exit_scan_generic(ctx, "BTC")
    }

    fn entry_scan(&self, ctx: &StrategyContext<'_>, prior_cache: Option<crate::domain::threshold_cache::ThresholdCache>) -> ScanOutput {
        let candles = &ctx.snapshot.candles_5m;
        let Some(idx) = confirmed_index(candles) else {
            return ScanOutput::default();
        };
        let zones = Self::zones(ctx);

        let Some((scan, next_cache)) = spike::scan(candles, idx, zones.vol_threshold, prior_cache) else {
            return ScanOutput::default();
        };

        if !scan.is_spike {
            if let Some(signal) = Self::quiet_long_pattern_d(ctx, idx) {
                return ScanOutput::signal_only(signal).with_cache(next_cache);
            }
            return ScanOutput::default().with_cache(next_cache);
        }

        let entry = candles[idx].c;
        let signal = if zones.penetration.contains(scan.h4_pos) {
            Some(
                Signal::new("BTC", Action::Long, "penetration_zone_bearish_spike")
                    .with_levels(entry, entry * (1.0 - 0.006), entry * (1.0 + 0.003))
                    .with_exit(ExitMode::TimeCut, 12)
                    .with_vol_ratio(scan.ratio)
                    .with_pattern("wall", "penetration"),
            )
        } else if zones.upper.contains(scan.h4_pos) {
            Some(
                Signal::new("BTC", Action::Short, "upper_zone_bearish_spike")
                    .with_levels(entry, entry * (1.0 + 0.006), entry * (1.0 - 0.005))
                    .with_exit(ExitMode::TimeCut, 10)
                    .with_vol_ratio(scan.ratio)
                    .with_pattern("wall", "upper"),
            )
        } else if zones.bottom.contains(scan.h4_pos) {
            if scan.ratio >= zones.bottom_short_min_ratio {
                Some(
                    Signal::new("BTC", Action::Short, "bottom_zone_deep_spike")
                        .with_levels(entry, entry * (1.0 + 0.006), entry * (1.0 - 0.004))
                        .with_exit(ExitMode::TimeCut, 8)
                        .with_vol_ratio(scan.ratio)
                        .with_pattern("wall", "bottom"),
                )
            } else {
                None
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

/// Shared by BTC/SOL wall (and reusable for any TpSl/TimeCut family):
/// evaluate SL/TP and time-cut against the live ExitMeta, or rescue a
/// position missing its meta with `hold_position`.
pub fn exit_scan_generic(ctx: &StrategyContext<'_>, symbol: &str) -> Option<Signal> {
    let PositionInfo {
        exit_meta,
        has_live_position,
        ..
    } = ctx.position;

    let meta = match exit_meta {
        Some(meta) => meta,
        None => {
            return if *has_live_position {
                Some(Signal::hold_position(
                    symbol,
                    "live position with no owning exit metadata; holding to avoid double-entry",
                ))
            } else {
                None
            };
        }
    };

    let mid = ctx.snapshot.mid_price?;
    if meta.hit_sl_tp(mid) {
        return Some(Signal::new(symbol, Action::Close, "stop_loss_or_take_profit_hit"));
    }
    if meta.time_cut_elapsed() {
        return Some(Signal::new(symbol, Action::Close, "time_cut_elapsed"));
    }
    Some(Signal::hold_position(symbol, "managing open position"))
}
