//! Supervisor (spec.md 4.8): the cycle's last line of defense. Where the
//! risk validation pipeline rejects individual signals, this watches
//! whole-account health -- consecutive scan failures, daily loss and
//! drawdown breaches, and prolonged fallback streaks -- and can trip the
//! kill-switch or force an emergency close-all.
//!
//! Grounded on `original_source/src/monitor/monitor.py`: its
//! `_check_rubber_fallback_duration` / `_check_quiet_fallback_duration`
//! pair drove the alert-after/cooldown constants below, and its equity
//! sanity guard (reject obviously-stale equity rather than act on it)
//! maps onto [`equity_is_sane`].

use tracing::{error, warn};

use crate::config::RiskConfig;
use crate::domain::failure::{FailureCounter, FallbackTracker};
use crate::domain::kill_switch::KillSwitch;
use crate::domain::pnl::DailyPnl;
use crate::domain::ports::ExchangeAdapter;

/// Consecutive "no symbol had usable candle data" cycles before alerting.
pub const FAILURE_ALERT_THRESHOLD: u32 = 3;

/// The original splits fallback reasons into a "spike" family (alert at
/// 30min) and a "quiet" family (alert at 60min, it's the normal resting
/// state so tolerance is higher). This port buckets by the same `reason`
/// string `FallbackTracker` already keys on.
fn alert_thresholds_for(reason: &str) -> (f64, f64) {
    if reason.eq_ignore_ascii_case("no_volume_spike") {
        (30.0, 30.0)
    } else {
        (60.0, 60.0)
    }
}

#[derive(Debug, Default, Clone)]
pub struct SupervisionOutcome {
    pub kill_switch: KillSwitch,
    pub emergency_closed: Vec<String>,
    pub skip_risk_checks: bool,
    pub alerts: Vec<String>,
}

/// `equity < equity_sanity_floor_pct% of start-of-day` is treated as a
/// bad read (stale feed, API hiccup) rather than a real account wipeout --
/// emergency-closing on it would realize real losses off a glitch.
fn equity_is_sane(daily_pnl: &DailyPnl, risk: &RiskConfig) -> bool {
    if daily_pnl.start_of_day_equity <= rust_decimal::Decimal::ZERO {
        return true;
    }
    let floor_pct = match rust_decimal::Decimal::try_from(risk.equity_sanity_floor_pct / 100.0) {
        Ok(pct) => pct,
        Err(_) => return true,
    };
    daily_pnl.equity >= daily_pnl.start_of_day_equity * floor_pct
}

pub struct Supervisor;

impl Supervisor {
    /// Evaluates account-level health for this cycle and, if the
    /// daily-loss or drawdown limit has been breached, emergency-closes
    /// every open position and activates the kill-switch. Also tracks the
    /// consecutive-failure counter and fallback-duration alerts, mutating
    /// both by reference so the caller owns their load/save lifecycle.
    #[allow(clippy::too_many_arguments)]
    pub async fn evaluate(
        adapter: &dyn ExchangeAdapter,
        risk: &RiskConfig,
        daily_pnl: &DailyPnl,
        kill_switch: KillSwitch,
        failures: &mut FailureCounter,
        all_symbols_lacked_data: bool,
        fallback: &mut FallbackTracker,
        now_ms: i64,
    ) -> anyhow::Result<SupervisionOutcome> {
        let mut outcome = SupervisionOutcome {
            kill_switch,
            ..Default::default()
        };

        if all_symbols_lacked_data {
            failures.record_failure(now_ms);
            if failures.should_alert(FAILURE_ALERT_THRESHOLD) {
                let msg = format!(
                    "{} consecutive cycles with no usable candle data for any symbol",
                    failures.consecutive_failures
                );
                warn!(consecutive_failures = failures.consecutive_failures, "{msg}");
                outcome.alerts.push(msg);
            }
        } else {
            failures.record_success(now_ms);
        }

        // The arbiter has already recorded this cycle's fallback/spike
        // outcome on `fallback` before calling here; this only decides
        // whether the resulting streak warrants an alert.
        if let Some(reason) = fallback.last_reason.clone() {
            let (alert_after, cooldown) = alert_thresholds_for(&reason);
            if fallback.should_alert(&reason, now_ms, alert_after, cooldown) {
                let msg = format!(
                    "fallback reason '{reason}' has persisted {:.1} minutes",
                    fallback.fallback_minutes(now_ms)
                );
                warn!(reason = reason.as_str(), minutes = fallback.fallback_minutes(now_ms), "{msg}");
                outcome.alerts.push(msg);
                fallback.mark_alerted(&reason, now_ms);
            }
        }

        if !equity_is_sane(daily_pnl, risk) {
            warn!(
                equity = %daily_pnl.equity,
                start_of_day_equity = %daily_pnl.start_of_day_equity,
                "equity reading below sanity floor, skipping breach checks this cycle"
            );
            outcome.skip_risk_checks = true;
            return Ok(outcome);
        }

        let daily_loss_pct = daily_pnl.daily_loss_pct();
        let drawdown_pct = daily_pnl.drawdown_pct();
        let daily_loss_limit = rust_decimal::Decimal::try_from(risk.daily_loss_limit_pct).unwrap_or_default();
        let drawdown_limit = rust_decimal::Decimal::try_from(risk.max_drawdown_pct).unwrap_or_default();

        let breach = if daily_loss_pct >= daily_loss_limit {
            Some(format!("daily loss {daily_loss_pct:.2}% reached limit {daily_loss_limit:.2}%"))
        } else if drawdown_pct >= drawdown_limit {
            Some(format!("drawdown {drawdown_pct:.2}% reached limit {drawdown_limit:.2}%"))
        } else {
            None
        };

        if let Some(reason) = breach {
            error!(reason = reason.as_str(), "kill-switch triggered, emergency-closing all positions");
            outcome.alerts.push(reason.clone());
            outcome.kill_switch.activate(reason, now_ms);
            outcome.emergency_closed = emergency_close_all(adapter).await;
        }

        Ok(outcome)
    }
}

async fn emergency_close_all(adapter: &dyn ExchangeAdapter) -> Vec<String> {
    let positions = match adapter.positions().await {
        Ok(positions) => positions,
        Err(e) => {
            error!(error = %e, "could not list positions for emergency close");
            return Vec::new();
        }
    };
    let mut closed = Vec::new();
    for position in positions {
        match adapter.close_market(&position.symbol).await {
            Ok(_) => closed.push(position.symbol),
            Err(e) => error!(symbol = position.symbol.as_str(), error = %e, "emergency close failed"),
        }
    }
    closed
}
