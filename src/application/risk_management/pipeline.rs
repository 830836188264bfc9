//! Fail-fast validator pipeline, grounded near-verbatim on the
//! teacher's `risk_management::pipeline::validation_pipeline`: priority
//! sorted, first rejection wins, rejections never panic — they return
//! as result records the caller turns into `status=rejected` (spec.md
//! 4.6, 7).

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::config::{EntryGateConfig, RiskConfig};
use crate::domain::pnl::DailyPnl;
use crate::domain::position::Position;
use crate::domain::signal::Signal;
use crate::domain::types::SymbolSnapshot;

/// Result of a single validator's check.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Approve,
    Reject(String),
}

impl ValidationResult {
    pub fn is_approved(&self) -> bool {
        matches!(self, ValidationResult::Approve)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ValidationResult::Reject(_))
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            ValidationResult::Reject(reason) => Some(reason),
            ValidationResult::Approve => None,
        }
    }
}

/// Everything a validator needs to judge one proposed signal. Built
/// once per signal by the executor; validators never mutate it.
pub struct ValidationContext<'a> {
    pub signal: &'a Signal,
    pub snapshot: &'a SymbolSnapshot,
    pub positions: &'a [Position],
    /// Live equity as just reported by the exchange.
    pub live_equity: Decimal,
    /// Equity as recorded in local state (`daily.equity`) before this
    /// cycle's reconciliation — compared against `live_equity` for the
    /// equity-drift check.
    pub state_equity: Decimal,
    pub daily_pnl: &'a DailyPnl,
    pub data_health_score: f64,
    pub minutes_since_last_trade: Option<f64>,
    /// Size the sizing engine would place this signal at, computed by
    /// the executor ahead of validation (mirrors
    /// `original_source/src/risk/risk_manager.py::validate_signal`,
    /// which sizes before validating) so `PositionSizeLimit` can check
    /// the real margin a fill would require. `None` when sizing
    /// produced no order (missing inputs, or every cap collapsed it).
    pub proposed_size: Option<Decimal>,
    pub risk: &'a RiskConfig,
    pub entry_gate: &'a EntryGateConfig,
}

impl<'a> ValidationContext<'a> {
    /// Notional value of the proposed order, when entry/size are known.
    pub fn proposed_notional(&self, size: Decimal) -> Decimal {
        self.signal
            .entry_price
            .map(|entry| size * Decimal::try_from(entry).unwrap_or_default())
            .unwrap_or_default()
    }
}

/// One risk check. Validators never raise; a failed check is a
/// `Reject`, not an error (spec.md 7's "risk rejection ... returned as
/// a result record, never raised").
#[async_trait]
pub trait RiskValidator: Send + Sync {
    fn name(&self) -> &str;

    async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult;

    fn is_enabled(&self) -> bool {
        true
    }

    /// Lower runs first.
    fn priority(&self) -> u8 {
        100
    }
}

pub struct RiskValidationPipeline {
    validators: Vec<Box<dyn RiskValidator>>,
}

impl RiskValidationPipeline {
    pub fn new(validators: Vec<Box<dyn RiskValidator>>) -> Self {
        let mut validators = validators;
        validators.sort_by_key(|v| v.priority());
        Self { validators }
    }

    pub fn add_validator(&mut self, validator: Box<dyn RiskValidator>) {
        self.validators.push(validator);
        self.validators.sort_by_key(|v| v.priority());
    }

    pub async fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        for validator in &self.validators {
            if !validator.is_enabled() {
                continue;
            }
            match validator.validate(ctx).await {
                ValidationResult::Reject(reason) => {
                    warn!(validator = validator.name(), reason, symbol = ctx.signal.symbol, "risk gate rejected signal");
                    return ValidationResult::Reject(reason);
                }
                ValidationResult::Approve => {
                    debug!(validator = validator.name(), "risk gate passed");
                }
            }
        }
        ValidationResult::Approve
    }

    pub fn list_active_validators(&self) -> Vec<&str> {
        self.validators.iter().filter(|v| v.is_enabled()).map(|v| v.name()).collect()
    }
}
