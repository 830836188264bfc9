//! Per-signal gates (4.6.1) and the composite new-entry gate (4.6.2).
//! Every composite validator approves immediately for signals it
//! doesn't apply to (`close`, or anything but a fresh long/short) so
//! "close always allowed" falls out of the pipeline mechanically
//! rather than needing a special case in the caller.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::signal::Action;
use crate::domain::types::Side;

use super::pipeline::{RiskValidator, ValidationContext, ValidationResult};

fn approve() -> ValidationResult {
    ValidationResult::Approve
}

fn reject(reason: impl Into<String>) -> ValidationResult {
    ValidationResult::Reject(reason.into())
}

/// True for signals the composite new-entry gate (4.6.2) applies to.
fn is_new_entry(ctx: &ValidationContext<'_>) -> bool {
    ctx.signal.action.is_new_entry()
}

// ---- 4.6.1 per-signal validation ----

pub struct MaxConcurrentPositions;

#[async_trait]
impl RiskValidator for MaxConcurrentPositions {
    fn name(&self) -> &str {
        "max_concurrent_positions"
    }

    fn priority(&self) -> u8 {
        10
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if ctx.signal.action == Action::Close || !is_new_entry(ctx) {
            return approve();
        }
        if ctx.positions.len() >= ctx.risk.max_concurrent {
            return reject(format!(
                "{} concurrent positions already open, limit {}",
                ctx.positions.len(),
                ctx.risk.max_concurrent
            ));
        }
        approve()
    }
}

pub struct MaxLeverage;

#[async_trait]
impl RiskValidator for MaxLeverage {
    fn name(&self) -> &str {
        "max_leverage"
    }

    fn priority(&self) -> u8 {
        20
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if ctx.signal.action == Action::Close {
            return approve();
        }
        match ctx.signal.leverage {
            Some(leverage) if leverage > ctx.risk.max_leverage => {
                reject(format!("leverage {leverage} exceeds max {}", ctx.risk.max_leverage))
            }
            _ => approve(),
        }
    }
}

pub struct PositionSizeLimit;

#[async_trait]
impl RiskValidator for PositionSizeLimit {
    fn name(&self) -> &str {
        "position_size_limit"
    }

    fn priority(&self) -> u8 {
        30
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if ctx.signal.action == Action::Close {
            return approve();
        }
        let (Some(entry), Some(leverage)) = (ctx.signal.entry_price, ctx.signal.leverage) else {
            return approve();
        };
        if entry <= 0.0 || ctx.live_equity <= Decimal::ZERO {
            return approve();
        }
        let Some(size) = ctx.proposed_size else {
            return approve();
        };
        let Ok(entry) = Decimal::try_from(entry) else {
            return approve();
        };
        let margin_required = size * entry / Decimal::from(leverage.max(1));
        let margin_pct = (margin_required / ctx.live_equity * Decimal::from(100))
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0);
        if margin_pct > ctx.risk.max_single_pct {
            return reject(format!(
                "margin required {margin_required} is {margin_pct:.2}% of equity, exceeds max_single_pct {:.2}%",
                ctx.risk.max_single_pct
            ));
        }
        approve()
    }
}

pub struct TotalExposureLimit;

#[async_trait]
impl RiskValidator for TotalExposureLimit {
    fn name(&self) -> &str {
        "total_exposure_limit"
    }

    fn priority(&self) -> u8 {
        40
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if ctx.signal.action == Action::Close || !is_new_entry(ctx) {
            return approve();
        }
        if ctx.live_equity <= Decimal::ZERO {
            return approve();
        }
        let current_exposure: Decimal = ctx.positions.iter().map(|p| p.size * p.entry_price).sum();
        let Some(entry) = ctx.signal.entry_price else {
            return approve();
        };
        // Same approximation as position sizing: assume the default
        // max_single_pct allocation for the "new notional" term, since
        // actual size is computed after the gate passes.
        let assumed_size = (ctx.live_equity * Decimal::try_from(ctx.risk.max_single_pct / 100.0).unwrap_or_default())
            / Decimal::try_from(entry).unwrap_or(Decimal::ONE);
        let new_notional = assumed_size * Decimal::try_from(entry).unwrap_or_default();
        let cap = ctx.live_equity * Decimal::try_from(ctx.risk.max_total_exposure_pct / 100.0).unwrap_or_default();
        if current_exposure + new_notional > cap {
            return reject(format!(
                "total exposure {current_exposure} + {new_notional} would exceed {cap} ({}% of equity)",
                ctx.risk.max_total_exposure_pct
            ));
        }
        approve()
    }
}

// ---- 4.6.2 composite new-entry gate ----

pub struct EquityDrift;

#[async_trait]
impl RiskValidator for EquityDrift {
    fn name(&self) -> &str {
        "equity_drift"
    }

    fn priority(&self) -> u8 {
        50
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if !is_new_entry(ctx) {
            return approve();
        }
        if ctx.state_equity <= Decimal::ZERO {
            return approve();
        }
        let drift_pct = ((ctx.live_equity - ctx.state_equity) / ctx.state_equity * Decimal::from(100))
            .abs()
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0);
        if drift_pct > ctx.entry_gate.max_equity_drift_pct {
            return reject(format!(
                "equity drift {drift_pct:.2}% exceeds max {:.2}%",
                ctx.entry_gate.max_equity_drift_pct
            ));
        }
        approve()
    }
}

pub struct ConsensusQuality;

#[async_trait]
impl RiskValidator for ConsensusQuality {
    fn name(&self) -> &str {
        "consensus_quality"
    }

    fn priority(&self) -> u8 {
        60
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if !is_new_entry(ctx) {
            return approve();
        }
        let is_partial = ctx.signal.reasoning.to_lowercase().contains("partial");
        if is_partial && ctx.signal.confidence < ctx.entry_gate.partial_consensus_min_confidence {
            return reject(format!(
                "partial consensus confidence {:.2} below minimum {:.2}",
                ctx.signal.confidence, ctx.entry_gate.partial_consensus_min_confidence
            ));
        }
        approve()
    }
}

pub struct DailyLossBudget;

#[async_trait]
impl RiskValidator for DailyLossBudget {
    fn name(&self) -> &str {
        "daily_loss_budget"
    }

    fn priority(&self) -> u8 {
        70
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if !is_new_entry(ctx) {
            return approve();
        }
        let loss_pct = ctx.daily_pnl.daily_loss_pct();
        let limit = Decimal::try_from(ctx.entry_gate.max_daily_loss_for_new_entries_pct).unwrap_or_default();
        if loss_pct >= limit {
            return reject(format!("daily loss {loss_pct:.2}% at or above new-entry budget {limit:.2}%"));
        }
        approve()
    }
}

pub struct DataQuality;

#[async_trait]
impl RiskValidator for DataQuality {
    fn name(&self) -> &str {
        "data_quality"
    }

    fn priority(&self) -> u8 {
        80
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if !is_new_entry(ctx) {
            return approve();
        }
        if ctx.data_health_score < ctx.entry_gate.min_data_quality_score {
            return reject(format!(
                "data health score {:.2} below minimum {:.2}",
                ctx.data_health_score, ctx.entry_gate.min_data_quality_score
            ));
        }
        approve()
    }
}

pub struct Spread;

#[async_trait]
impl RiskValidator for Spread {
    fn name(&self) -> &str {
        "spread"
    }

    fn priority(&self) -> u8 {
        90
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if !is_new_entry(ctx) {
            return approve();
        }
        let Some(spread_bps) = ctx.snapshot.orderbook.spread_bps() else {
            return approve(); // no book data yet -- data_quality already gates missing data
        };
        if spread_bps > ctx.entry_gate.max_spread_bps {
            return reject(format!(
                "spread {spread_bps:.2}bps exceeds max {:.2}bps",
                ctx.entry_gate.max_spread_bps
            ));
        }
        approve()
    }
}

pub struct Imbalance;

#[async_trait]
impl RiskValidator for Imbalance {
    fn name(&self) -> &str {
        "imbalance"
    }

    fn priority(&self) -> u8 {
        100
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if !is_new_entry(ctx) {
            return approve();
        }
        let Some(direction) = ctx.signal.action.direction() else {
            return approve();
        };
        let Some(ratio) = ctx.snapshot.orderbook.top_n_imbalance(5) else {
            return approve();
        };
        let min_imbalance = ctx.entry_gate.min_imbalance;
        let ok = match direction {
            Side::Long => ratio >= min_imbalance,
            Side::Short => ratio <= 1.0 / min_imbalance,
        };
        if !ok {
            return reject(format!(
                "top-5 book imbalance {ratio:.3} fails {direction} threshold {min_imbalance:.3}"
            ));
        }
        approve()
    }
}

pub struct Cooldown;

#[async_trait]
impl RiskValidator for Cooldown {
    fn name(&self) -> &str {
        "cooldown"
    }

    fn priority(&self) -> u8 {
        110
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if !is_new_entry(ctx) {
            return approve();
        }
        if let Some(minutes) = ctx.minutes_since_last_trade {
            if minutes < ctx.entry_gate.entry_cooldown_minutes {
                return reject(format!(
                    "{minutes:.1}m since last trade, cooldown requires {:.1}m",
                    ctx.entry_gate.entry_cooldown_minutes
                ));
            }
        }
        approve()
    }
}

pub struct RiskReward;

#[async_trait]
impl RiskValidator for RiskReward {
    fn name(&self) -> &str {
        "risk_reward"
    }

    fn priority(&self) -> u8 {
        120
    }

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        if !is_new_entry(ctx) {
            return approve();
        }
        if ctx.signal.exit_mode == Some(crate::domain::position::ExitMode::TimeCut) {
            return approve();
        }
        let Some(rr) = ctx.signal.reward_risk() else {
            return approve();
        };
        if rr < ctx.entry_gate.min_rr {
            return reject(format!("reward:risk {rr:.2} below minimum {:.2}", ctx.entry_gate.min_rr));
        }
        approve()
    }
}

/// All validators in spec.md 4.6.1/4.6.2 order, ready to hand to
/// `RiskValidationPipeline::new` (it sorts by priority itself, so
/// insertion order here only needs to be readable).
pub fn default_validators() -> Vec<Box<dyn RiskValidator>> {
    vec![
        Box::new(MaxConcurrentPositions),
        Box::new(MaxLeverage),
        Box::new(PositionSizeLimit),
        Box::new(TotalExposureLimit),
        Box::new(EquityDrift),
        Box::new(ConsensusQuality),
        Box::new(DailyLossBudget),
        Box::new(DataQuality),
        Box::new(Spread),
        Box::new(Imbalance),
        Box::new(Cooldown),
        Box::new(RiskReward),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntryGateConfig, RiskConfig};
    use crate::domain::pnl::DailyPnl;
    use crate::domain::signal::Signal;
    use crate::domain::types::SymbolSnapshot;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn base_ctx<'a>(
        signal: &'a Signal,
        snapshot: &'a SymbolSnapshot,
        daily_pnl: &'a DailyPnl,
        risk: &'a RiskConfig,
        entry_gate: &'a EntryGateConfig,
    ) -> ValidationContext<'a> {
        ValidationContext {
            signal,
            snapshot,
            positions: &[],
            live_equity: dec!(1000),
            state_equity: dec!(1000),
            daily_pnl,
            data_health_score: 1.0,
            minutes_since_last_trade: None,
            proposed_size: None,
            risk,
            entry_gate,
        }
    }

    #[tokio::test]
    async fn max_concurrent_rejects_past_limit() {
        let signal = Signal::new("BTC", Action::Long, "x").with_confidence(0.8);
        let snapshot = SymbolSnapshot::default();
        let daily_pnl = DailyPnl::reset(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), dec!(1000));
        let risk = RiskConfig {
            max_concurrent: 0,
            ..RiskConfig::default()
        };
        let entry_gate = EntryGateConfig::default();
        let ctx = base_ctx(&signal, &snapshot, &daily_pnl, &risk, &entry_gate);
        let result = MaxConcurrentPositions.validate(&ctx).await;
        assert!(result.is_rejected());
    }

    #[tokio::test]
    async fn close_always_approved_regardless_of_gate() {
        let signal = Signal::new("BTC", Action::Close, "sl hit");
        let snapshot = SymbolSnapshot::default();
        let daily_pnl = DailyPnl::reset(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), dec!(1000));
        let risk = RiskConfig {
            max_concurrent: 0,
            ..RiskConfig::default()
        };
        let entry_gate = EntryGateConfig::default();
        let ctx = base_ctx(&signal, &snapshot, &daily_pnl, &risk, &entry_gate);
        let pipeline = super::super::pipeline::RiskValidationPipeline::new(default_validators());
        assert!(pipeline.validate(&ctx).await.is_approved());
    }

    #[tokio::test]
    async fn position_size_limit_rejects_margin_above_max_single_pct() {
        let signal = Signal::new("BTC", Action::Long, "x")
            .with_levels(100.0, 99.0, 103.0)
            .with_leverage(3);
        let snapshot = SymbolSnapshot::default();
        let daily_pnl = DailyPnl::reset(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), dec!(1000));
        let risk = RiskConfig {
            max_single_pct: 10.0,
            ..RiskConfig::default()
        };
        let entry_gate = EntryGateConfig::default();
        let mut ctx = base_ctx(&signal, &snapshot, &daily_pnl, &risk, &entry_gate);
        // size=50 @ entry=100, leverage=3 -> margin_required = 5000/3 = 1666.7,
        // 166.7% of equity(1000), well past max_single_pct=10%.
        ctx.proposed_size = Some(dec!(50));
        let result = PositionSizeLimit.validate(&ctx).await;
        assert!(result.is_rejected());
    }

    #[tokio::test]
    async fn position_size_limit_approves_margin_within_max_single_pct() {
        let signal = Signal::new("BTC", Action::Long, "x")
            .with_levels(100.0, 99.0, 103.0)
            .with_leverage(5);
        let snapshot = SymbolSnapshot::default();
        let daily_pnl = DailyPnl::reset(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), dec!(10000));
        let risk = RiskConfig {
            max_single_pct: 10.0,
            ..RiskConfig::default()
        };
        let entry_gate = EntryGateConfig::default();
        let mut ctx = base_ctx(&signal, &snapshot, &daily_pnl, &risk, &entry_gate);
        // size=50 @ entry=100, leverage=5 -> margin_required = 5000/5 = 1000,
        // exactly 10% of equity(10000) -- at, not over, the limit.
        ctx.proposed_size = Some(dec!(50));
        ctx.live_equity = dec!(10000);
        let result = PositionSizeLimit.validate(&ctx).await;
        assert!(result.is_approved());
    }

    #[tokio::test]
    async fn risk_reward_rejects_below_minimum() {
        let signal = Signal::new("BTC", Action::Long, "x").with_levels(100.0, 99.0, 100.5);
        let snapshot = SymbolSnapshot::default();
        let daily_pnl = DailyPnl::reset(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), dec!(1000));
        let risk = RiskConfig::default();
        let entry_gate = EntryGateConfig::default();
        let ctx = base_ctx(&signal, &snapshot, &daily_pnl, &risk, &entry_gate);
        let result = RiskReward.validate(&ctx).await;
        assert!(result.is_rejected());
    }
}
