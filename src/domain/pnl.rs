//! Daily P&L tracking with a realized-only peak-equity invariant, and a
//! bounded trade history ring used for cooldown lookups and reporting.

use crate::domain::types::Side;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Insertion-ordered bounded trade log. Not a ledger — used only for
/// cooldown checks and reporting.
pub const MAX_TRADE_HISTORY: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub pnl: Option<Decimal>,
    pub opened_at: i64,
    pub closed_at: Option<i64>,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeHistory {
    pub trades: VecDeque<TradeRecord>,
}

impl TradeHistory {
    pub fn record(&mut self, trade: TradeRecord) {
        self.trades.push_back(trade);
        while self.trades.len() > MAX_TRADE_HISTORY {
            self.trades.pop_front();
        }
    }

    /// Minutes since the most recent trade for `symbol`, as of `now_ms`.
    /// `None` if there is no prior trade for that symbol.
    pub fn minutes_since_last_trade(&self, symbol: &str, now_ms: i64) -> Option<f64> {
        self.trades
            .iter()
            .rev()
            .find(|t| t.symbol == symbol)
            .map(|t| (now_ms - t.recorded_at) as f64 / 60_000.0)
    }
}

/// Daily P&L with a realized-only peak used for drawdown measurement.
/// Unrealized gains never raise the peak — this prevents a false
/// drawdown trigger right after a winning position closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPnl {
    pub date: NaiveDate,
    pub start_of_day_equity: Decimal,
    pub equity: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub peak_equity: Decimal,
}

impl DailyPnl {
    pub fn reset(date: NaiveDate, equity: Decimal) -> Self {
        Self {
            date,
            start_of_day_equity: equity,
            equity,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            peak_equity: equity,
        }
    }

    /// Roll over to a new UTC date if `today` differs from `self.date`,
    /// or apply an update within the same day. `realized_delta` is added
    /// to the running realized P&L; `api_unrealized`, when present, is
    /// preferred over the derived unrealized figure.
    pub fn update(
        &mut self,
        today: NaiveDate,
        equity: Decimal,
        realized_delta: Decimal,
        api_unrealized: Option<Decimal>,
    ) {
        if today != self.date {
            *self = DailyPnl::reset(today, equity);
            return;
        }

        self.realized_pnl += realized_delta;
        self.equity = equity;
        self.unrealized_pnl = api_unrealized
            .unwrap_or_else(|| equity - self.start_of_day_equity - self.realized_pnl);

        let realized_only = self.start_of_day_equity + self.realized_pnl;
        self.peak_equity = self.peak_equity.max(realized_only);
    }

    /// If `|sum_unrealized - self.unrealized_pnl| > tolerance`, rewrite
    /// `unrealized_pnl` and `equity` consistently.
    pub fn reconcile_unrealized(&mut self, sum_unrealized: Decimal, tolerance: Decimal) {
        if (sum_unrealized - self.unrealized_pnl).abs() > tolerance {
            self.unrealized_pnl = sum_unrealized;
            self.equity = self.start_of_day_equity + self.realized_pnl + self.unrealized_pnl;
        }
    }

    /// Drawdown from the realized-only peak, as a percentage.
    pub fn drawdown_pct(&self) -> Decimal {
        if self.peak_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.peak_equity - self.equity) / self.peak_equity * Decimal::from(100)
    }

    /// Daily loss percentage: negative of (realized + unrealized) over
    /// start-of-day equity, as used by the daily-loss-budget check and
    /// kill-switch evaluation.
    pub fn daily_loss_pct(&self) -> Decimal {
        if self.start_of_day_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        -(self.realized_pnl + self.unrealized_pnl) / self.start_of_day_equity * Decimal::from(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn peak_equity_is_realized_only() {
        let mut pnl = DailyPnl::reset(date(1), dec!(1000));
        // Unrealized gain should not move the peak.
        pnl.update(date(1), dec!(1200), dec!(0), Some(dec!(200)));
        assert_eq!(pnl.peak_equity, dec!(1000));

        // Realized gain moves the peak.
        pnl.update(date(1), dec!(1100), dec!(100), Some(dec!(0)));
        assert_eq!(pnl.peak_equity, dec!(1100));
    }

    #[test]
    fn peak_equity_never_decreases_within_a_day() {
        let mut pnl = DailyPnl::reset(date(1), dec!(1000));
        pnl.update(date(1), dec!(1100), dec!(100), Some(dec!(0)));
        assert_eq!(pnl.peak_equity, dec!(1100));
        // A losing trade afterwards must not lower the peak.
        pnl.update(date(1), dec!(900), dec!(-200), Some(dec!(0)));
        assert_eq!(pnl.peak_equity, dec!(1100));
    }

    #[test]
    fn date_rollover_resets_start_of_day() {
        let mut pnl = DailyPnl::reset(date(1), dec!(1000));
        pnl.update(date(1), dec!(1100), dec!(100), Some(dec!(0)));
        pnl.update(date(2), dec!(1100), dec!(0), None);
        assert_eq!(pnl.start_of_day_equity, dec!(1100));
        assert_eq!(pnl.realized_pnl, dec!(0));
        assert_eq!(pnl.peak_equity, dec!(1100));
    }

    #[test]
    fn reconcile_rewrites_equity_past_tolerance() {
        let mut pnl = DailyPnl::reset(date(1), dec!(1000));
        pnl.unrealized_pnl = dec!(10);
        pnl.equity = dec!(1010);
        pnl.reconcile_unrealized(dec!(12.5), dec!(1.0));
        assert_eq!(pnl.unrealized_pnl, dec!(12.5));
        assert_eq!(pnl.equity, dec!(1012.5));
    }

    #[test]
    fn reconcile_ignores_drift_within_tolerance() {
        let mut pnl = DailyPnl::reset(date(1), dec!(1000));
        pnl.unrealized_pnl = dec!(10);
        pnl.equity = dec!(1010);
        pnl.reconcile_unrealized(dec!(10.5), dec!(1.0));
        assert_eq!(pnl.unrealized_pnl, dec!(10));
    }

    #[test]
    fn kill_switch_scenario_daily_loss() {
        // start_of_day=1000, realized=-40, unrealized=-15 => equity=945
        let mut pnl = DailyPnl::reset(date(1), dec!(1000));
        pnl.update(date(1), dec!(945), dec!(-40), Some(dec!(-15)));
        let loss_pct = pnl.daily_loss_pct();
        assert!(loss_pct >= dec!(5.0), "loss_pct={loss_pct}");
    }

    #[test]
    fn trade_history_trims_to_cap() {
        let mut history = TradeHistory::default();
        for i in 0..(MAX_TRADE_HISTORY + 10) {
            history.record(TradeRecord {
                symbol: "BTC".to_string(),
                side: Side::Long,
                size: dec!(1),
                entry_price: dec!(100),
                exit_price: None,
                pnl: None,
                opened_at: i as i64,
                closed_at: None,
                recorded_at: i as i64,
            });
        }
        assert_eq!(history.trades.len(), MAX_TRADE_HISTORY);
    }

    #[test]
    fn minutes_since_last_trade() {
        let mut history = TradeHistory::default();
        history.record(TradeRecord {
            symbol: "BTC".to_string(),
            side: Side::Long,
            size: dec!(1),
            entry_price: dec!(100),
            exit_price: None,
            pnl: None,
            opened_at: 0,
            closed_at: None,
            recorded_at: 0,
        });
        let minutes = history.minutes_since_last_trade("BTC", 5 * 60_000).unwrap();
        assert!((minutes - 5.0).abs() < 1e-9);
        assert!(history.minutes_since_last_trade("ETH", 0).is_none());
    }
}
