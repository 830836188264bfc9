//! Optional external sizing multiplier, grounded on
//! `original_source/src/executor/trade_executor.py`'s
//! `_get_size_regime_multiplier`: an out-of-band process (a volatility
//! regime classifier, a manual override) may drop `size_regime.json`
//! into the state directory to scale every new entry's notional up or
//! down for a while. Absent, unreadable, or non-positive multipliers all
//! fall back to a neutral `1.0` — this file is a hint, never load-bearing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRegime {
    pub multiplier: f64,
    pub reason: String,
}

impl Default for SizeRegime {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            reason: "size_regime unavailable".to_string(),
        }
    }
}

impl SizeRegime {
    /// Sanitize a loaded value: non-positive multipliers are treated the
    /// same as a missing file.
    pub fn normalized(self) -> Self {
        if self.multiplier <= 0.0 {
            Self::default()
        } else {
            self
        }
    }
}
