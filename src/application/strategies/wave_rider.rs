//! WaveRider: time-triggered momentum strategy keyed off the UTC
//! 14:00-15:00 1h bar rather than a volume spike (spec.md 4.4.2). BTC
//! runs every weekday and carries a two-step reversion and an adaptive
//! trailing stop; HYPE runs Thursday-only with a fixed stop and no
//! reversion. Both share this module since the entry-window/time-stop
//! skeleton is identical — grounded on
//! `original_source/src/strategy/wave_rider.py`.

use super::base::atr_volatility_multiplier;
use super::traits::{ScanOutput, StrategyContext, TradingStrategy};
use crate::config::zones::WaveRiderZones;
use crate::domain::position::{ExitMeta, ExitMode};
use crate::domain::signal::{Action, Signal};
use crate::domain::threshold_cache::ThresholdCache;
use crate::domain::types::{Candle, Side, confirmed_index};
use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};

/// Fixed stop distance for the initial entry (wr_up_large / wr_down /
/// wr_fade). Not config-overridable — spec.md gives it as a literal
/// 0.8%, same as the Python original's `sl_pct`.
const WR_SL_PCT: f64 = 0.008;
/// Reversion leg's SL/TP, also literal per spec.md.
const WR_REV_SL_PCT: f64 = 0.008;
const WR_REV_TP_PCT: f64 = 0.003;
/// UTC 15:00 entry to UTC 20:00 time-stop is exactly 5 hours; at a
/// 5-minute cycle interval that is 60 bars.
const WR_TIME_STOP_BARS: u32 = 60;
const ATR_SHORT_WINDOW: usize = 24;
const ATR_LONG_WINDOW: usize = 288;

pub struct WaveRiderStrategy {
    symbol: &'static str,
    only_thursday: bool,
    reversion_enabled: bool,
    adaptive_sl_enabled: bool,
}

impl WaveRiderStrategy {
    pub fn btc() -> Self {
        Self {
            symbol: "BTC",
            only_thursday: false,
            reversion_enabled: true,
            adaptive_sl_enabled: true,
        }
    }

    pub fn hype() -> Self {
        Self {
            symbol: "HYPE",
            only_thursday: true,
            reversion_enabled: false,
            adaptive_sl_enabled: false,
        }
    }

    fn weekday_allowed(&self, wd: Weekday) -> bool {
        if self.only_thursday {
            wd == Weekday::Thu
        } else {
            !matches!(wd, Weekday::Sat | Weekday::Sun)
        }
    }

    fn close_signal(&self, ctx: &StrategyContext<'_>, meta: &ExitMeta, mid: f64) -> Signal {
        let base = Signal::new(self.symbol, Action::Close, "stop_loss_or_time_stop");
        if !self.reversion_enabled || meta.pattern != "wr_up_large" {
            return base;
        }
        let Some(observe_open) = observe_open_for(&ctx.snapshot.candles_1h, meta.entry_time) else {
            return base;
        };
        if observe_open <= 0.0 {
            return base;
        }
        let deviation_pct = (mid - observe_open).abs() / observe_open * 100.0;
        if deviation_pct < ctx.zones.wave_rider.reversion_trigger_pct {
            return base;
        }
        // Arm the reversion: the executor reads `entry_price` (the
        // observed hourly open) and `spike_time` (entry_after_ms) to
        // persist a `PendingReversion` record once this close is
        // processed. See DESIGN.md for why this rides on existing
        // Signal fields instead of widening the trait.
        let mut armed = base.with_pattern("wr_up_large", "reversion_armed").with_vol_ratio(deviation_pct);
        armed.entry_price = Some(observe_open);
        armed.spike_time = Some(ctx.now_ms + 15 * 60_000);
        armed
    }
}

impl TradingStrategy for WaveRiderStrategy {
    fn family(&self) -> &'static str {
        "wave_rider"
    }

    fn exit_scan(&self, ctx: &StrategyContext<'_>) -> Option<Signal> {
        let meta = ctx.position.exit_meta.as_ref()?;
        let mid = ctx.snapshot.mid_price?;

        let mut stop_loss = meta.stop_loss;
        if self.adaptive_sl_enabled {
            if let Some(idx) = confirmed_index(&ctx.snapshot.candles_5m) {
                stop_loss = adaptive_stop_loss(
                    meta.direction,
                    meta.entry_price,
                    stop_loss,
                    mid,
                    &ctx.snapshot.candles_5m,
                    idx,
                    &ctx.zones.wave_rider,
                );
            }
        }

        let hit = match meta.direction {
            Side::Long => mid <= stop_loss || mid >= meta.take_profit,
            Side::Short => mid >= stop_loss || mid <= meta.take_profit,
        };
        if hit || meta.time_cut_elapsed() {
            return Some(self.close_signal(ctx, meta, mid));
        }

        let mut hold = Signal::hold_position(self.symbol, "wave_rider managing open position");
        hold.stop_loss = Some(stop_loss);
        Some(hold)
    }

    fn entry_scan(&self, ctx: &StrategyContext<'_>, _prior_cache: Option<ThresholdCache>) -> ScanOutput {
        if self.reversion_enabled {
            if let Some(pending) = &ctx.position.pending_reversion {
                if ctx.now_ms < pending.entry_after_ms {
                    return ScanOutput::default();
                }
                let Some(mid) = ctx.snapshot.mid_price else {
                    return ScanOutput::default();
                };
                let bars = reversion_bars(ctx.now_ms, pending.window_end_ms);
                let signal = Signal::new(self.symbol, Action::Short, "wr_reversion")
                    .with_levels(mid, mid * (1.0 + WR_REV_SL_PCT), mid * (1.0 - WR_REV_TP_PCT))
                    .with_exit(ExitMode::TimeCut, bars)
                    .with_pattern("wr_up_large", "reversion_entry");
                return ScanOutput::signal_only(signal);
            }
        }

        let Some(now) = Utc.timestamp_millis_opt(ctx.now_ms).single() else {
            return ScanOutput::default();
        };
        if !self.weekday_allowed(now.weekday()) {
            return ScanOutput::default();
        }
        if !(now.hour() == 15 && now.minute() < 5) {
            return ScanOutput::default();
        }

        let candles = &ctx.snapshot.candles_1h;
        let Some(idx) = confirmed_index(candles) else {
            return ScanOutput::default();
        };
        let bar = candles[idx];
        if bar.o <= 0.0 {
            return ScanOutput::default();
        }
        let open_move_pct = (bar.c - bar.o) / bar.o * 100.0;
        let zones = &ctx.zones.wave_rider;
        let entry = bar.c;

        let signal = if open_move_pct >= zones.large_up_move_pct {
            Some(
                Signal::new(self.symbol, Action::Long, "wr_up_large")
                    .with_levels(entry, entry * (1.0 - WR_SL_PCT), entry * (1.0 + WR_SL_PCT))
                    .with_exit(ExitMode::TimeCut, WR_TIME_STOP_BARS)
                    .with_pattern("wr_up_large", "time_trigger"),
            )
        } else if open_move_pct <= zones.down_move_pct {
            Some(
                Signal::new(self.symbol, Action::Short, "wr_down")
                    .with_levels(entry, entry * (1.0 + WR_SL_PCT), entry * (1.0 - WR_SL_PCT))
                    .with_exit(ExitMode::TimeCut, WR_TIME_STOP_BARS)
                    .with_pattern("wr_down", "time_trigger"),
            )
        } else if open_move_pct >= zones.fade_min_move_pct && open_move_pct < zones.fade_max_move_pct {
            Some(
                Signal::new(self.symbol, Action::Short, "wr_fade")
                    .with_levels(entry, entry * (1.0 + WR_SL_PCT), entry * (1.0 - WR_SL_PCT))
                    .with_exit(ExitMode::TimeCut, WR_TIME_STOP_BARS)
                    .with_pattern("wr_fade", "time_trigger"),
            )
        } else {
            None
        };

        match signal {
            Some(signal) => ScanOutput::signal_only(signal),
            None => ScanOutput::default(),
        }
    }
}

/// Locate the 1h bar whose open corresponds to `entry_time_ms - 1h`,
/// i.e. the UTC 14:00-15:00 observing bar for an entry recorded shortly
/// after UTC 15:00. Matched within a 5-minute tolerance since
/// `entry_time` is the cycle's wall-clock time, not the bar boundary.
fn observe_open_for(candles_1h: &[Candle], entry_time_ms: i64) -> Option<f64> {
    let target_start = entry_time_ms - 60 * 60_000;
    candles_1h
        .iter()
        .find(|c| (c.t - target_start).abs() < 5 * 60_000)
        .map(|c| c.o)
}

fn reversion_bars(now_ms: i64, window_end_ms: i64) -> u32 {
    let remaining = (window_end_ms - now_ms).max(300_000);
    (remaining / 300_000) as u32
}

/// The reversion leg's time-stop window: UTC 08:00-14:00 the day after
/// it is armed. Exposed for the executor, which constructs the
/// `PendingReversion` record once the arming close is processed.
pub fn reversion_window(now_ms: i64) -> Option<(i64, i64)> {
    let now = Utc.timestamp_millis_opt(now_ms).single()?;
    let next_day = now.date_naive().succ_opt()?;
    let start = next_day.and_hms_opt(8, 0, 0)?;
    let end = next_day.and_hms_opt(14, 0, 0)?;
    Some((
        Utc.from_utc_datetime(&start).timestamp_millis(),
        Utc.from_utc_datetime(&end).timestamp_millis(),
    ))
}

/// Breakeven + volatility trailing stop (spec.md 4.4.2). The original
/// stop distance is recomputed from `WR_SL_PCT` rather than read back
/// from a mutated field, so "never widen beyond the original SL" holds
/// without needing a second stored value.
fn adaptive_stop_loss(
    direction: Side,
    entry_price: f64,
    current_sl: f64,
    mid: f64,
    candles_5m: &[Candle],
    idx: usize,
    zones: &WaveRiderZones,
) -> f64 {
    let original_distance = entry_price * WR_SL_PCT;
    let (vol_mult, _) = atr_volatility_multiplier(
        candles_5m,
        idx,
        ATR_SHORT_WINDOW,
        ATR_LONG_WINDOW,
        zones.high_vol_atr_ratio,
        zones.low_vol_atr_ratio,
        zones.high_vol_factor,
        zones.low_vol_factor,
    );
    let distance = (original_distance * vol_mult).min(original_distance);

    let mut candidate = match direction {
        Side::Long => entry_price - distance,
        Side::Short => entry_price + distance,
    };

    let profit_pct = match direction {
        Side::Long => (mid - entry_price) / entry_price,
        Side::Short => (entry_price - mid) / entry_price,
    } * 100.0;
    if profit_pct >= zones.breakeven_trigger_pct {
        candidate = match direction {
            Side::Long => candidate.max(entry_price),
            Side::Short => candidate.min(entry_price),
        };
    }

    match direction {
        Side::Long => candidate.max(current_sl),
        Side::Short => candidate.min(current_sl),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::strategies::traits::PositionInfo;
    use crate::config::StrategyZones;
    use crate::domain::types::SymbolSnapshot;

    fn hourly_candles(n: usize, open: f64, close: f64) -> Vec<Candle> {
        let mut candles: Vec<Candle> = (0..n)
            .map(|i| Candle {
                t: i as i64 * 3_600_000,
                o: 100.0,
                h: 101.0,
                l: 99.0,
                c: 100.0,
                v: 10.0,
            })
            .collect();
        let last_confirmed = candles.len() - 2;
        candles[last_confirmed].o = open;
        candles[last_confirmed].c = close;
        candles
    }

    fn utc_ms(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().timestamp_millis()
    }

    #[test]
    fn large_up_move_at_1500_utc_triggers_long() {
        // Tuesday 2026-01-06 is a weekday.
        let now = utc_ms(2026, 1, 6, 15, 1);
        let candles_1h = hourly_candles(30, 100.0, 100.7); // +0.7% >= 0.6% threshold
        let snapshot = SymbolSnapshot {
            symbol: "BTC".to_string(),
            candles_1h,
            mid_price: Some(100.7),
            ..Default::default()
        };
        let position = PositionInfo::default();
        let zones = StrategyZones::default();
        let ctx = StrategyContext {
            snapshot: &snapshot,
            position: &position,
            zones: &zones,
            now_ms: now,
        };
        let strategy = WaveRiderStrategy::btc();
        let output = strategy.entry_scan(&ctx, None);
        let signal = output.signal.expect("expected wr_up_large long");
        assert_eq!(signal.action, Action::Long);
        assert_eq!(signal.exit_bars, Some(WR_TIME_STOP_BARS));
    }

    #[test]
    fn outside_entry_window_produces_no_signal() {
        let now = utc_ms(2026, 1, 6, 16, 0);
        let candles_1h = hourly_candles(30, 100.0, 100.7);
        let snapshot = SymbolSnapshot {
            symbol: "BTC".to_string(),
            candles_1h,
            mid_price: Some(100.7),
            ..Default::default()
        };
        let position = PositionInfo::default();
        let zones = StrategyZones::default();
        let ctx = StrategyContext {
            snapshot: &snapshot,
            position: &position,
            zones: &zones,
            now_ms: now,
        };
        let output = WaveRiderStrategy::btc().entry_scan(&ctx, None);
        assert!(output.signal.is_none());
    }

    #[test]
    fn hype_only_fires_on_thursday() {
        // Tuesday, not Thursday.
        let now = utc_ms(2026, 1, 6, 15, 1);
        let candles_1h = hourly_candles(30, 100.0, 100.7);
        let snapshot = SymbolSnapshot {
            symbol: "HYPE".to_string(),
            candles_1h,
            mid_price: Some(100.7),
            ..Default::default()
        };
        let position = PositionInfo::default();
        let zones = StrategyZones::default();
        let ctx = StrategyContext {
            snapshot: &snapshot,
            position: &position,
            zones: &zones,
            now_ms: now,
        };
        let output = WaveRiderStrategy::hype().entry_scan(&ctx, None);
        assert!(output.signal.is_none());
    }

    #[test]
    fn adaptive_stop_tightens_to_breakeven_and_never_loosens() {
        let flat = hourly_candles(30, 100.0, 100.0);
        let sl = adaptive_stop_loss(Side::Long, 100.0, 99.2, 100.5, &flat, flat.len() - 2, &WaveRiderZones::default());
        // profit_pct = 0.5% >= breakeven_trigger_pct(0.3) -> SL moves to entry.
        assert_eq!(sl, 100.0);
        // Never loosen below a tighter current stop.
        let tighter = adaptive_stop_loss(Side::Long, 100.0, 100.3, 100.5, &flat, flat.len() - 2, &WaveRiderZones::default());
        assert_eq!(tighter, 100.3);
    }

    #[test]
    fn pending_reversion_fires_once_due() {
        let candles_1h = hourly_candles(30, 100.0, 100.0);
        let snapshot = SymbolSnapshot {
            symbol: "BTC".to_string(),
            candles_1h,
            mid_price: Some(99.0),
            ..Default::default()
        };
        let pending = crate::domain::position::PendingReversion {
            observe_open: 100.0,
            entry_after_ms: 1_000,
            window_start_ms: 2_000,
            window_end_ms: 100_000,
        };
        let position = PositionInfo {
            pending_reversion: Some(pending),
            ..Default::default()
        };
        let zones = StrategyZones::default();
        let ctx = StrategyContext {
            snapshot: &snapshot,
            position: &position,
            zones: &zones,
            now_ms: 1_500,
        };
        let output = WaveRiderStrategy::btc().entry_scan(&ctx, None);
        let signal = output.signal.expect("expected reversion short");
        assert_eq!(signal.action, Action::Short);
        assert_eq!(signal.pattern.as_deref(), Some("wr_up_large"));
    }
}
