//! Strategy and arbiter output. Modeled as a sum type rather than a
//! string-tagged struct (see DESIGN.md, spec Design Note 1) so the hot
//! path never does string comparison on the action kind.

use crate::domain::position::ExitMode;
use crate::domain::types::Side;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Trade,
    Hold,
}

/// One strategy's (or the arbiter's) decision for a symbol this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Long,
    Short,
    Close,
    Hold,
    /// Authoritative "do nothing, a position is already being managed"
    /// signal. Suppresses any same-cycle new-entry signal and blocks the
    /// executor from issuing open/close orders for the symbol.
    HoldPosition,
}

impl Action {
    pub fn is_new_entry(&self) -> bool {
        matches!(self, Action::Long | Action::Short)
    }

    pub fn is_exit_authoritative(&self) -> bool {
        matches!(self, Action::Close | Action::HoldPosition)
    }

    pub fn direction(&self) -> Option<Side> {
        match self {
            Action::Long => Some(Side::Long),
            Action::Short => Some(Side::Short),
            _ => None,
        }
    }
}

/// A single strategy (or arbiter) output for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub action: Action,
    pub confidence: f64,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub leverage: Option<u32>,
    pub reasoning: String,
    pub exit_mode: Option<ExitMode>,
    pub exit_bars: Option<u32>,
    pub pattern: Option<String>,
    pub zone: Option<String>,
    pub vol_ratio: Option<f64>,
    pub spike_time: Option<i64>,
    /// Which strategy family produced this signal, so the executor knows
    /// which per-(symbol, family) `ExitMeta` file to write or delete.
    /// Never serialized — it's bookkeeping for the current cycle only,
    /// not part of the persisted signal batch's external shape.
    #[serde(skip)]
    pub family: Option<String>,
}

impl Signal {
    pub fn new(symbol: impl Into<String>, action: Action, reasoning: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            confidence: 0.5,
            entry_price: None,
            stop_loss: None,
            take_profit: None,
            leverage: None,
            reasoning: reasoning.into(),
            exit_mode: None,
            exit_bars: None,
            pattern: None,
            zone: None,
            vol_ratio: None,
            spike_time: None,
            family: None,
        }
    }

    pub fn hold_position(symbol: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self::new(symbol, Action::HoldPosition, reasoning)
    }

    pub fn hold(symbol: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self::new(symbol, Action::Hold, reasoning)
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_levels(mut self, entry: f64, stop_loss: f64, take_profit: f64) -> Self {
        self.entry_price = Some(entry);
        self.stop_loss = Some(stop_loss);
        self.take_profit = Some(take_profit);
        self
    }

    pub fn with_exit(mut self, mode: ExitMode, bars: u32) -> Self {
        self.exit_mode = Some(mode);
        self.exit_bars = Some(bars);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>, zone: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self.zone = Some(zone.into());
        self
    }

    pub fn with_vol_ratio(mut self, vol_ratio: f64) -> Self {
        self.vol_ratio = Some(vol_ratio);
        self
    }

    pub fn with_leverage(mut self, leverage: u32) -> Self {
        self.leverage = Some(leverage);
        self
    }

    pub fn with_spike_time(mut self, spike_time: i64) -> Self {
        self.spike_time = Some(spike_time);
        self
    }

    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    /// Reward:risk ratio, when entry/SL/TP are all present. `None`
    /// otherwise (e.g. time-cut-only exits with no TP sentinel removed).
    pub fn reward_risk(&self) -> Option<f64> {
        let (entry, sl, tp) = (self.entry_price?, self.stop_loss?, self.take_profit?);
        let risk = (entry - sl).abs();
        if risk <= 0.0 {
            return None;
        }
        Some((tp - entry).abs() / risk)
    }
}

/// The full batch written to `signals/signals.json` each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBatch {
    pub action_type: ActionType,
    pub signals: Vec<Signal>,
    pub market_summary: String,
    pub journal_entry: String,
    pub self_assessment: String,
    pub ooda: Ooda,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ooda {
    pub observe: String,
    pub orient: String,
    pub decide: String,
}

impl SignalBatch {
    /// Derives `action_type` from the signal set: `trade` iff any output
    /// is long/short/close; `hold_position` alone keeps it `hold`.
    pub fn from_signals(signals: Vec<Signal>, ooda: Ooda, market_summary: impl Into<String>) -> Self {
        let action_type = if signals
            .iter()
            .any(|s| matches!(s.action, Action::Long | Action::Short | Action::Close))
        {
            ActionType::Trade
        } else {
            ActionType::Hold
        };
        Self {
            action_type,
            signals,
            market_summary: market_summary.into(),
            journal_entry: String::new(),
            self_assessment: String::new(),
            ooda,
        }
    }

    pub fn safe_hold(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            action_type: ActionType::Hold,
            signals: Vec::new(),
            market_summary: "safe-hold".to_string(),
            journal_entry: reason.clone(),
            self_assessment: "entered safe-hold after retry exhaustion".to_string(),
            ooda: Ooda {
                observe: reason.clone(),
                orient: "retry exhaustion".to_string(),
                decide: "hold".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_type_is_trade_iff_actionable_output_present() {
        let hold_position_only = vec![Signal::hold_position("BTC", "managing position")];
        let batch = SignalBatch::from_signals(
            hold_position_only,
            Ooda {
                observe: String::new(),
                orient: String::new(),
                decide: String::new(),
            },
            "",
        );
        assert_eq!(batch.action_type, ActionType::Hold);

        let with_close = vec![Signal::new("BTC", Action::Close, "sl hit")];
        let batch = SignalBatch::from_signals(
            with_close,
            Ooda {
                observe: String::new(),
                orient: String::new(),
                decide: String::new(),
            },
            "",
        );
        assert_eq!(batch.action_type, ActionType::Trade);
    }

    #[test]
    fn reward_risk_ratio() {
        let s = Signal::new("BTC", Action::Long, "x").with_levels(100.0, 99.0, 103.0);
        assert_eq!(s.reward_risk(), Some(3.0));
    }

    #[test]
    fn reward_risk_none_without_full_levels() {
        let s = Signal::new("BTC", Action::Long, "x");
        assert_eq!(s.reward_risk(), None);
    }
}
