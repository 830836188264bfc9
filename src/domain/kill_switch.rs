//! Kill-switch state.
//!
//! **Fail-safe default**: when `state/kill_switch.json` is absent, the
//! system treats the switch as *enabled* (active/tripped). This is the
//! opposite of the Python original's `is_active()`, which returns
//! `False` on `FileNotFoundError` — spec.md calls the inverted default
//! out explicitly as load-bearing (see DESIGN.md Open Question 1). The
//! inversion lives at the call site (`KillSwitch::load_or_failsafe`),
//! not by changing what `enabled: bool` means.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillSwitch {
    pub enabled: bool,
    pub reason: Option<String>,
    pub triggered_at: Option<i64>,
    pub warning: Option<bool>,
    pub warning_reason: Option<String>,
    pub warning_at: Option<i64>,
}

impl KillSwitch {
    pub fn inactive() -> Self {
        Self {
            enabled: false,
            reason: None,
            triggered_at: None,
            warning: None,
            warning_reason: None,
            warning_at: None,
        }
    }

    /// The value to use when the backing file is missing: active,
    /// fail-safe (spec.md 3, 9).
    pub fn failsafe_default() -> Self {
        Self {
            enabled: true,
            reason: Some("kill_switch.json missing: fail-safe default is active".to_string()),
            triggered_at: None,
            warning: None,
            warning_reason: None,
            warning_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.enabled
    }

    pub fn activate(&mut self, reason: impl Into<String>, now_ms: i64) {
        self.enabled = true;
        self.reason = Some(reason.into());
        self.triggered_at = Some(now_ms);
    }

    pub fn deactivate(&mut self) {
        self.enabled = false;
        self.reason = None;
        self.triggered_at = None;
    }

    /// Set the non-fatal warning flag without touching `enabled` — used
    /// by safe-hold escalation on retry exhaustion (spec.md 5, 7).
    pub fn set_warning(&mut self, reason: impl Into<String>, now_ms: i64) {
        self.warning = Some(true);
        self.warning_reason = Some(reason.into());
        self.warning_at = Some(now_ms);
    }
}
