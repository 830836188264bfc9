//! Live position cache and per-strategy exit metadata.

use crate::domain::types::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A live position as reported by the exchange. The exchange is the
/// authoritative source; this is a cache refreshed every cycle by
/// `sync_positions`. A size of zero means "no position" — such entries
/// are dropped during sync, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub leverage: u32,
    pub opened_at: Option<i64>,
    pub unrealized_pnl: Decimal,
    pub mid_price: Decimal,
}

impl Position {
    pub fn notional(&self) -> Decimal {
        self.size * self.entry_price
    }
}

/// How a position held under a given strategy pattern should be exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitMode {
    TpSl,
    TimeCut,
}

/// Per-strategy-family record describing how to exit a position. One
/// file per (symbol, strategy family) — see DESIGN.md for why this is
/// kept separate rather than collapsed into a single table.
///
/// Ownership: created by the strategy on entry signal, confirmed by the
/// executor on fill, `bar_count` incremented by the arbiter during exit
/// scans, deleted by the executor at close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitMeta {
    pub pattern: String,
    pub direction: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub exit_mode: ExitMode,
    pub exit_bars: u32,
    pub bar_count: u32,
    pub entry_time: i64,
    pub vol_ratio: Option<f64>,
}

impl ExitMeta {
    /// True once the time-cut bar budget has been exhausted. Only
    /// meaningful for `ExitMode::TimeCut`.
    pub fn time_cut_elapsed(&self) -> bool {
        self.exit_mode == ExitMode::TimeCut && self.bar_count >= self.exit_bars
    }

    /// Evaluate the SL/TP levels against the current mid price. Returns
    /// `true` if the position should be closed.
    pub fn hit_sl_tp(&self, mid: f64) -> bool {
        match self.direction {
            Side::Long => mid <= self.stop_loss || mid >= self.take_profit,
            Side::Short => mid >= self.stop_loss || mid <= self.take_profit,
        }
    }
}

/// WaveRider's two-step reversion record: after a `wr_up_large` entry
/// closes with enough drift from the observed open, a pending short is
/// scheduled for `entry_after_ms` rather than entered immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingReversion {
    pub observe_open: f64,
    pub entry_after_ms: i64,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(direction: Side, sl: f64, tp: f64) -> ExitMeta {
        ExitMeta {
            pattern: "test".to_string(),
            direction,
            entry_price: 100.0,
            stop_loss: sl,
            take_profit: tp,
            exit_mode: ExitMode::TpSl,
            exit_bars: 0,
            bar_count: 0,
            entry_time: 0,
            vol_ratio: None,
        }
    }

    #[test]
    fn long_hits_stop_loss() {
        let m = meta(Side::Long, 95.0, 105.0);
        assert!(m.hit_sl_tp(94.0));
        assert!(!m.hit_sl_tp(100.0));
    }

    #[test]
    fn short_hits_take_profit() {
        let m = meta(Side::Short, 105.0, 95.0);
        assert!(m.hit_sl_tp(94.0));
        assert!(!m.hit_sl_tp(100.0));
    }

    #[test]
    fn time_cut_elapsed_only_for_time_cut_mode() {
        let mut m = meta(Side::Long, 95.0, 105.0);
        m.exit_mode = ExitMode::TimeCut;
        m.exit_bars = 3;
        m.bar_count = 3;
        assert!(m.time_cut_elapsed());
        m.exit_mode = ExitMode::TpSl;
        assert!(!m.time_cut_elapsed());
    }
}
