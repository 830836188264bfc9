//! Supervisor-local counters: consecutive agent-level failures, and a
//! per-reason fallback-duration tracker with alert cooldowns.
//!
//! Grounded on `original_source/src/monitor/monitor.py`'s
//! `_check_rubber_fallback_duration`: a reason-bucketed streak counter
//! that escalates after a configured duration and then suppresses
//! repeat alerts until a cooldown elapses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An "all strategies failed" cycle is one where every configured
/// symbol had insufficient candle data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailureCounter {
    pub consecutive_failures: u32,
    pub last_failure: Option<i64>,
    pub last_success: Option<i64>,
}

impl FailureCounter {
    pub fn record_failure(&mut self, now_ms: i64) {
        self.consecutive_failures += 1;
        self.last_failure = Some(now_ms);
    }

    pub fn record_success(&mut self, now_ms: i64) {
        self.consecutive_failures = 0;
        self.last_success = Some(now_ms);
    }

    pub fn should_alert(&self, threshold: u32) -> bool {
        self.consecutive_failures >= threshold
    }
}

/// Tracks consecutive "no spike" (fallback) cycles, bucketed by reason,
/// and whether an alert has already fired within the current cooldown
/// window for that reason.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackTracker {
    pub consecutive_no_spike: u32,
    pub fallback_start: Option<i64>,
    pub reason_counts: HashMap<String, u32>,
    pub last_reason: Option<String>,
    /// last_ms an alert fired, per reason.
    pub alert_state: HashMap<String, i64>,
}

impl FallbackTracker {
    /// Record one more fallback ("no spike") cycle for `reason` at
    /// `now_ms`. Resets the streak if this is the first fallback cycle
    /// since the last spike.
    pub fn record_fallback(&mut self, reason: &str, now_ms: i64) {
        if self.fallback_start.is_none() {
            self.fallback_start = Some(now_ms);
        }
        self.consecutive_no_spike += 1;
        *self.reason_counts.entry(reason.to_string()).or_insert(0) += 1;
        self.last_reason = Some(reason.to_string());
    }

    /// Clear the streak on a cycle that actually produced a spike
    /// signal.
    pub fn record_spike(&mut self) {
        self.consecutive_no_spike = 0;
        self.fallback_start = None;
        self.reason_counts.clear();
        self.last_reason = None;
    }

    /// Minutes elapsed in the current fallback streak, or 0 if none.
    pub fn fallback_minutes(&self, now_ms: i64) -> f64 {
        match self.fallback_start {
            Some(start) => (now_ms - start) as f64 / 60_000.0,
            None => 0.0,
        }
    }

    /// Whether to escalate an alert: the streak has run past
    /// `alert_after_minutes` for `reason`, and either no alert has fired
    /// yet or the cooldown since the last one has elapsed.
    pub fn should_alert(
        &self,
        reason: &str,
        now_ms: i64,
        alert_after_minutes: f64,
        cooldown_minutes: f64,
    ) -> bool {
        if self.fallback_minutes(now_ms) < alert_after_minutes {
            return false;
        }
        match self.alert_state.get(reason) {
            Some(&last_alert_ms) => {
                (now_ms - last_alert_ms) as f64 / 60_000.0 >= cooldown_minutes
            }
            None => true,
        }
    }

    pub fn mark_alerted(&mut self, reason: &str, now_ms: i64) {
        self.alert_state.insert(reason.to_string(), now_ms);
    }
}
