//! Per-strategy zone and threshold overrides, loaded from an optional
//! `config/zones.toml`. Every field has a spec-literal default so the
//! agent runs with no override file present; the file only needs to
//! carry the keys an operator wants to change.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A `[lo, hi)` band on H4 range position (0 = bottom of range, 100 =
/// top), as spec.md 4.4.2 defines for each per-symbol strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub lo: f64,
    pub hi: f64,
}

impl Zone {
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn contains(&self, position: f64) -> bool {
        position >= self.lo && position < self.hi
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BtcWallZones {
    pub penetration: Zone,
    pub upper: Zone,
    pub bottom: Zone,
    pub vol_threshold: f64,
    pub bottom_short_min_ratio: f64,
}

impl Default for BtcWallZones {
    fn default() -> Self {
        Self {
            penetration: Zone::new(-20.0, 0.0),
            upper: Zone::new(40.0, 999.0),
            bottom: Zone::new(0.0, 20.0),
            vol_threshold: 5.0,
            bottom_short_min_ratio: 7.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthBandZones {
    pub reversal_max_h4_pos: f64,
    pub momentum_min_h4_pos: f64,
    pub reversal_min_ratio: f64,
    pub momentum_min_ratio: f64,
    pub momentum_max_ratio: f64,
    pub quiet_long_max_h4_pos: f64,
}

impl Default for EthBandZones {
    fn default() -> Self {
        Self {
            reversal_max_h4_pos: 40.0,
            momentum_min_h4_pos: 40.0,
            reversal_min_ratio: 7.0,
            momentum_min_ratio: 3.0,
            momentum_max_ratio: 7.0,
            quiet_long_max_h4_pos: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolWallZones {
    pub penetration: Zone,
    pub upper: Zone,
    pub vol_threshold: f64,
    pub deep_threshold: f64,
    pub short_funding_gate: f64,
    pub quiet_short_min_h4_pos: f64,
}

impl Default for SolWallZones {
    fn default() -> Self {
        Self {
            penetration: Zone::new(-20.0, 0.0),
            upper: Zone::new(40.0, 999.0),
            vol_threshold: 5.0,
            deep_threshold: 7.0,
            short_funding_gate: -5e-5,
            quiet_short_min_h4_pos: 70.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveRiderZones {
    pub large_up_move_pct: f64,
    pub down_move_pct: f64,
    pub fade_min_move_pct: f64,
    pub fade_max_move_pct: f64,
    pub reversion_trigger_pct: f64,
    pub breakeven_trigger_pct: f64,
    pub high_vol_atr_ratio: f64,
    pub low_vol_atr_ratio: f64,
    pub high_vol_factor: f64,
    pub low_vol_factor: f64,
}

impl Default for WaveRiderZones {
    fn default() -> Self {
        Self {
            large_up_move_pct: 0.6,
            down_move_pct: -0.8,
            fade_min_move_pct: 0.2,
            fade_max_move_pct: 0.6,
            reversion_trigger_pct: 0.8,
            breakeven_trigger_pct: 0.3,
            high_vol_atr_ratio: 1.5,
            low_vol_atr_ratio: 0.7,
            high_vol_factor: 1.20,
            low_vol_factor: 0.85,
        }
    }
}

/// The full set of per-strategy zone/threshold overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyZones {
    #[serde(default)]
    pub btc_wall: BtcWallZones,
    #[serde(default)]
    pub eth_band: EthBandZones,
    #[serde(default)]
    pub sol_wall: SolWallZones,
    #[serde(default)]
    pub wave_rider: WaveRiderZones,
}

impl StrategyZones {
    /// Load overrides from `path`; if the file doesn't exist, the
    /// spec-literal defaults apply unmodified. A present-but-invalid
    /// file is a hard error: silently running with defaults when an
    /// operator clearly intended an override is worse than failing
    /// loudly at startup.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

/// Convenience alias used by strategy modules that only need one
/// symbol's overrides threaded through.
pub type ZoneOverrides = StrategyZones;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_contains_is_half_open() {
        let z = Zone::new(0.0, 20.0);
        assert!(z.contains(0.0));
        assert!(z.contains(19.999));
        assert!(!z.contains(20.0));
    }

    #[test]
    fn defaults_match_spec_literal_numbers() {
        let zones = StrategyZones::default();
        assert_eq!(zones.btc_wall.vol_threshold, 5.0);
        assert_eq!(zones.sol_wall.deep_threshold, 7.0);
        assert_eq!(zones.wave_rider.large_up_move_pct, 0.6);
    }

    #[test]
    fn missing_override_file_yields_defaults() {
        let path = std::env::temp_dir().join("rustrade-zones-test-missing.toml");
        let zones = StrategyZones::load_or_default(&path).unwrap();
        assert_eq!(zones.btc_wall.vol_threshold, 5.0);
    }

    #[test]
    fn partial_override_file_keeps_other_defaults() {
        let path = std::env::temp_dir().join("rustrade-zones-test-partial.toml");
        std::fs::write(
            &path,
            "[btc_wall]\npenetration = { lo = -25.0, hi = 0.0 }\nupper = { lo = 40.0, hi = 999.0 }\nbottom = { lo = 0.0, hi = 20.0 }\nvol_threshold = 6.0\nbottom_short_min_ratio = 7.0\n",
        )
        .unwrap();
        let zones = StrategyZones::load_or_default(&path).unwrap();
        assert_eq!(zones.btc_wall.vol_threshold, 6.0);
        assert_eq!(zones.sol_wall.deep_threshold, 7.0);
        std::fs::remove_file(&path).ok();
    }
}
