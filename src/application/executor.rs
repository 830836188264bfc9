//! Order execution (spec.md 4.7): turns the cycle's approved signals
//! into exchange orders and keeps ExitMeta/trade-history/daily-PnL state
//! in sync with what actually filled. Grounded on the teacher's
//! `application/executor.rs` dispatch shape and
//! `original_source/src/executor/trade_executor.py`'s
//! `execute_signals`/`_execute_action` flow.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::domain::pnl::TradeRecord;
use crate::domain::ports::{Clock, ExchangeAdapter, OrderOutcome};
use crate::domain::position::ExitMeta;
use crate::domain::signal::{Action, Signal, SignalBatch};
use crate::domain::types::SymbolSnapshot;
use crate::infrastructure::observability::metrics::Metrics;
use crate::infrastructure::persistence::state_store::{StateStore, index_by_symbol};

use super::market_data::health;
use super::retry::retry_with_backoff;
use super::risk_management::{RiskValidationPipeline, ValidationContext, ValidationResult, sizing};

/// Tally for the cycle's log line / metrics push; not persisted.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecutionReport {
    pub orders_placed: usize,
    pub orders_closed: usize,
    pub rejections: usize,
    pub sizing_skips: usize,
}

pub struct Executor;

impl Executor {
    /// Run every signal in `batch` against the exchange. `closed_only`
    /// skips new-entry signals outright (close is always evaluated) --
    /// used by the supervisor to wind positions down without opening new
    /// ones while a risk condition is being worked through.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        batch: &SignalBatch,
        snapshots: &HashMap<String, SymbolSnapshot>,
        state: &StateStore,
        adapter: &dyn ExchangeAdapter,
        pipeline: &RiskValidationPipeline,
        config: &Config,
        clock: &dyn Clock,
        metrics: &Metrics,
        live_equity: Decimal,
        state_equity: Decimal,
        closed_only: bool,
    ) -> anyhow::Result<ExecutionReport> {
        let positions = state.load_positions()?;
        let positions_by_symbol = index_by_symbol(&positions);
        let mut daily_pnl = state.load_daily_pnl(clock.today(), live_equity)?;
        let mut trade_history = state.load_trade_history()?;
        let regime = state.load_size_regime()?;
        let mut report = ExecutionReport::default();

        for signal in &batch.signals {
            match signal.action {
                Action::Hold | Action::HoldPosition => continue,
                Action::Close => {
                    Self::execute_close(
                        signal,
                        &positions_by_symbol,
                        state,
                        adapter,
                        config,
                        clock,
                        metrics,
                        &mut daily_pnl,
                        &mut trade_history,
                        &mut report,
                    )
                    .await;
                }
                Action::Long | Action::Short => {
                    if closed_only {
                        continue;
                    }
                    let Some(snapshot) = snapshots.get(&signal.symbol) else {
                        continue;
                    };
                    let minutes_since_last_trade =
                        trade_history.minutes_since_last_trade(&signal.symbol, clock.now_ms());
                    // Size ahead of validation so PositionSizeLimit can
                    // check the margin a fill would actually require.
                    let proposed_size = sizing::calculate_size(signal, &config.risk, &regime, live_equity, &positions);
                    let ctx = ValidationContext {
                        signal,
                        snapshot,
                        positions: &positions,
                        live_equity,
                        state_equity,
                        daily_pnl: &daily_pnl,
                        data_health_score: health::score(snapshot),
                        minutes_since_last_trade,
                        proposed_size,
                        risk: &config.risk,
                        entry_gate: &config.entry_gate,
                    };
                    if let ValidationResult::Reject(reason) = pipeline.validate(&ctx).await {
                        warn!(symbol = signal.symbol.as_str(), reason, "entry rejected by risk gate");
                        report.rejections += 1;
                        continue;
                    }
                    let Some(size) = proposed_size else {
                        info!(symbol = signal.symbol.as_str(), "sizing produced no order below min_order_size_usd");
                        report.sizing_skips += 1;
                        continue;
                    };
                    Self::execute_entry(signal, size, state, adapter, config, clock, metrics, &mut trade_history, &mut report).await;
                }
            }
        }

        state.save_daily_pnl(&daily_pnl)?;
        state.save_trade_history(&trade_history)?;
        Ok(report)
    }

    async fn execute_close(
        signal: &Signal,
        positions_by_symbol: &HashMap<String, &crate::domain::position::Position>,
        state: &StateStore,
        adapter: &dyn ExchangeAdapter,
        config: &Config,
        clock: &dyn Clock,
        metrics: &Metrics,
        daily_pnl: &mut crate::domain::pnl::DailyPnl,
        trade_history: &mut crate::domain::pnl::TradeHistory,
        report: &mut ExecutionReport,
    ) {
        let symbol = signal.symbol.as_str();
        let outcome = retry_with_backoff("close_market", &config.retry, || adapter.close_market(symbol)).await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(symbol, error = %e, "close order exhausted retries");
                return;
            }
        };

        match outcome {
            OrderOutcome::Filled { avg_price } if avg_price > 0.0 => {
                metrics.inc_orders(symbol, "filled");
                report.orders_closed += 1;

                if let Some(position) = positions_by_symbol.get(symbol) {
                    let Ok(exit_price) = Decimal::try_from(avg_price) else {
                        return;
                    };
                    let pnl = match position.side {
                        crate::domain::types::Side::Long => (exit_price - position.entry_price) * position.size,
                        crate::domain::types::Side::Short => (position.entry_price - exit_price) * position.size,
                    };
                    trade_history.record(TradeRecord {
                        symbol: symbol.to_string(),
                        side: position.side,
                        size: position.size,
                        entry_price: position.entry_price,
                        exit_price: Some(exit_price),
                        pnl: Some(pnl),
                        opened_at: position.opened_at.unwrap_or(clock.now_ms()),
                        closed_at: Some(clock.now_ms()),
                        recorded_at: clock.now_ms(),
                    });
                    daily_pnl.update(clock.today(), daily_pnl.equity + pnl, pnl, None);
                    info!(symbol, pnl = %pnl, "position closed");
                } else {
                    warn!(symbol, "close filled but no cached position to derive realized pnl from");
                }

                if let Some(family) = &signal.family {
                    if let Err(e) = state.delete_exit_meta(symbol, family) {
                        error!(symbol, family, error = %e, "failed to delete exit meta after close");
                    }
                }

                Self::arm_pending_reversion(signal, symbol, state, clock);
            }
            OrderOutcome::Filled { .. } => {
                warn!(symbol, "close reported filled with a non-positive price; leaving exit meta in place");
            }
            OrderOutcome::Partial => {
                warn!(symbol, "close order only partially filled; exit meta retained for next cycle");
            }
            OrderOutcome::Failed { reason } => {
                error!(symbol, reason, "close order failed");
                metrics.inc_orders(symbol, "failed");
            }
            OrderOutcome::NoPosition => {
                info!(symbol, "close requested but exchange reports no position; clearing stale exit meta");
                if let Some(family) = &signal.family {
                    state.delete_exit_meta(symbol, family).ok();
                }
            }
        }
    }

    /// WaveRider's reversion two-step (spec.md 4.4.2 scenario 5): a
    /// `wr_up_large` close that drifted far enough from its observed
    /// open carries the reversion entry time and observed open on the
    /// signal itself (see `wave_rider::close_signal`); persist that as a
    /// `PendingReversion` so the next cycle's entry scan can pick it up.
    fn arm_pending_reversion(signal: &Signal, symbol: &str, state: &StateStore, clock: &dyn Clock) {
        if signal.pattern.as_deref() != Some("wr_up_large") || signal.zone.as_deref() != Some("reversion_armed") {
            return;
        }
        let (Some(observe_open), Some(entry_after_ms)) = (signal.entry_price, signal.spike_time) else {
            return;
        };
        let Some((window_start_ms, window_end_ms)) = super::strategies::wave_rider::reversion_window(clock.now_ms())
        else {
            return;
        };
        let pending = crate::domain::position::PendingReversion { observe_open, entry_after_ms, window_start_ms, window_end_ms };
        if let Err(e) = state.save_pending_reversion(symbol, &pending) {
            error!(symbol, error = %e, "failed to persist pending reversion");
        }
    }

    async fn execute_entry(
        signal: &Signal,
        size: Decimal,
        state: &StateStore,
        adapter: &dyn ExchangeAdapter,
        config: &Config,
        clock: &dyn Clock,
        metrics: &Metrics,
        trade_history: &mut crate::domain::pnl::TradeHistory,
        report: &mut ExecutionReport,
    ) {
        let symbol = signal.symbol.as_str();
        let Some(direction) = signal.action.direction() else {
            return;
        };
        let Some(leverage) = signal.leverage else {
            return;
        };

        if let Err(e) = retry_with_backoff("set_leverage", &config.retry, || adapter.set_leverage(symbol, leverage)).await
        {
            error!(symbol, error = %e, "set_leverage exhausted retries, opening at exchange default");
        }

        let outcome =
            retry_with_backoff("open_market", &config.retry, || adapter.open_market(symbol, direction, size)).await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(symbol, error = %e, "open order exhausted retries");
                return;
            }
        };

        match outcome {
            OrderOutcome::Filled { avg_price } if avg_price > 0.0 => {
                metrics.inc_orders(symbol, "filled");
                metrics.inc_signals(signal.pattern.as_deref().unwrap_or(symbol), action_label(signal.action.clone()));
                report.orders_placed += 1;
                let now = clock.now_ms();

                let Ok(entry_price) = Decimal::try_from(avg_price) else {
                    return;
                };
                trade_history.record(TradeRecord {
                    symbol: symbol.to_string(),
                    side: direction,
                    size,
                    entry_price,
                    exit_price: None,
                    pnl: None,
                    opened_at: now,
                    closed_at: None,
                    recorded_at: now,
                });

                if let (Some(family), Some(pattern)) = (&signal.family, &signal.pattern) {
                    let meta = ExitMeta {
                        pattern: pattern.clone(),
                        direction,
                        entry_price: avg_price,
                        stop_loss: signal.stop_loss.unwrap_or(avg_price),
                        take_profit: signal.take_profit.unwrap_or(avg_price),
                        exit_mode: signal.exit_mode.unwrap_or(crate::domain::position::ExitMode::TimeCut),
                        exit_bars: signal.exit_bars.unwrap_or(0),
                        bar_count: 0,
                        entry_time: now,
                        vol_ratio: signal.vol_ratio,
                    };
                    if let Err(e) = state.save_exit_meta(symbol, family, &meta) {
                        error!(symbol, family, error = %e, "failed to write exit meta after fill");
                    }
                }
                if signal.pattern.as_deref() == Some("wr_up_large") && signal.zone.as_deref() == Some("reversion_entry") {
                    if let Err(e) = state.delete_pending_reversion(symbol) {
                        warn!(symbol, error = %e, "failed to clear consumed pending reversion");
                    }
                }
                info!(symbol, side = %direction, size = %size, avg_price, "position opened");
            }
            OrderOutcome::Filled { .. } => {
                warn!(symbol, "open reported filled with a non-positive price; treating as no fill");
            }
            OrderOutcome::Partial => {
                warn!(symbol, "open order only partially filled");
                metrics.inc_orders(symbol, "partial");
            }
            OrderOutcome::Failed { reason } => {
                error!(symbol, reason, "open order failed");
                metrics.inc_orders(symbol, "failed");
            }
            OrderOutcome::NoPosition => {
                warn!(symbol, "open_market unexpectedly reported no_position");
            }
        }
    }
}

fn action_label(action: Action) -> &'static str {
    match action {
        Action::Long => "long",
        Action::Short => "short",
        Action::Close => "close",
        Action::Hold => "hold",
        Action::HoldPosition => "hold_position",
    }
}
