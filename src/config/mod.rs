//! Environment-driven configuration, following the teacher's
//! `Config::from_env()` pattern: required keys are fatal at startup
//! (`anyhow::Context`), optional tunables fall back to the defaults
//! spec.md lists, and a per-strategy TOML override file lets zone
//! boundaries be tuned without a rebuild.

pub mod zones;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;

pub use zones::{StrategyZones, ZoneOverrides};

/// Top-level runtime configuration. Constructed once at startup and
/// passed down explicitly — no global singleton (spec Design Note 4).
#[derive(Debug, Clone)]
pub struct Config {
    /// Exchange account address used for read/trade queries.
    pub account_address: String,
    /// Private key material is read directly by the exchange adapter
    /// from `HYPERLIQUID_PRIVATE_KEY`/a secrets backend; it is
    /// deliberately not threaded through `Config` so it can't end up in
    /// a debug log of the whole struct.
    pub base_url: String,
    pub symbols: Vec<String>,
    pub root_dir: PathBuf,
    pub cycle_interval_secs: u64,
    pub metrics_interval_secs: u64,

    pub risk: RiskConfig,
    pub entry_gate: EntryGateConfig,
    pub retry: RetryConfig,
    pub zones: StrategyZones,
    pub arbiter: ArbiterConfig,
}

/// Signal-arbiter tunables (spec.md 4.5, 8 Scenario 3).
#[derive(Debug, Clone, Copy)]
pub struct ArbiterConfig {
    /// A `close` on a position opened less than this many minutes ago
    /// is downgraded to `hold` unless `confidence >=
    /// min_hold_override_confidence`.
    pub min_hold_minutes: f64,
    pub min_hold_override_confidence: f64,
    /// Base leverage CAPS derives from confidence when a strategy omits
    /// one explicitly.
    pub caps_base_leverage: u32,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            min_hold_minutes: 5.0,
            min_hold_override_confidence: 0.90,
            caps_base_leverage: 3,
        }
    }
}

/// Hard risk limits enforced by the per-signal validator and the
/// supervisor's kill-switch evaluation (spec.md 4.6.1, 4.8).
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub max_concurrent: usize,
    pub max_leverage: u32,
    pub max_single_pct: f64,
    pub max_total_exposure_pct: f64,
    pub daily_loss_limit_pct: f64,
    pub max_drawdown_pct: f64,
    pub min_order_size_usd: f64,
    pub equity_sanity_floor_pct: f64,
    /// Per-symbol hard cap on position size, in coin units. Absent
    /// entries are uncapped by this rule.
    pub max_size_by_symbol: HashMap<String, Decimal>,
    /// 0 disables the cap.
    pub max_notional_usd_per_trade: Decimal,
    /// 0 disables the cap.
    pub max_notional_pct_of_equity: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_leverage: 10,
            max_single_pct: 8.0,
            max_total_exposure_pct: 40.0,
            daily_loss_limit_pct: 8.0,
            max_drawdown_pct: 12.0,
            min_order_size_usd: 10.0,
            equity_sanity_floor_pct: 10.0,
            max_size_by_symbol: HashMap::new(),
            max_notional_usd_per_trade: Decimal::ZERO,
            max_notional_pct_of_equity: 0.0,
        }
    }
}

/// The composite entry gate's configurable thresholds (spec.md 4.6.2).
#[derive(Debug, Clone, Copy)]
pub struct EntryGateConfig {
    pub max_equity_drift_pct: f64,
    pub partial_consensus_min_confidence: f64,
    pub max_daily_loss_for_new_entries_pct: f64,
    pub min_data_quality_score: f64,
    pub max_spread_bps: f64,
    pub min_imbalance: f64,
    pub entry_cooldown_minutes: f64,
    pub min_rr: f64,
}

impl Default for EntryGateConfig {
    fn default() -> Self {
        Self {
            max_equity_drift_pct: 5.0,
            partial_consensus_min_confidence: 0.65,
            max_daily_loss_for_new_entries_pct: 5.0,
            min_data_quality_score: 0.7,
            max_spread_bps: 8.0,
            min_imbalance: 1.1,
            entry_cooldown_minutes: 15.0,
            min_rr: 1.2,
        }
    }
}

/// Retry-with-backoff parameters (spec.md 5).
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
            max_retries: 5,
        }
    }
}

impl Config {
    /// Load configuration from the process environment. Missing
    /// required keys are a fatal, startup-time error; everything else
    /// falls back to spec.md's documented defaults.
    pub fn from_env() -> Result<Self> {
        let account_address = std::env::var("HYPERLIQUID_MAIN_ADDRESS")
            .context("HYPERLIQUID_MAIN_ADDRESS must be set")?;
        let base_url = std::env::var("HYPERLIQUID_API_URL")
            .unwrap_or_else(|_| "https://api.hyperliquid-testnet.xyz".to_string());
        let symbols = std::env::var("RUSTRADE_SYMBOLS")
            .unwrap_or_else(|_| "BTC,ETH,SOL".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        let root_dir = std::env::var("RUSTRADE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        let cycle_interval_secs = env_u64("RUSTRADE_CYCLE_INTERVAL_SECS", 300);
        let metrics_interval_secs = env_u64("RUSTRADE_METRICS_INTERVAL_SECS", 60);

        let zones_path = root_dir.join("config").join("zones.toml");
        let zones = StrategyZones::load_or_default(&zones_path)
            .with_context(|| format!("failed to load {}", zones_path.display()))?;

        Ok(Self {
            account_address,
            base_url,
            symbols,
            root_dir,
            cycle_interval_secs,
            metrics_interval_secs,
            risk: RiskConfig::default(),
            entry_gate: EntryGateConfig::default(),
            retry: RetryConfig::default(),
            zones,
            arbiter: ArbiterConfig::default(),
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_config_defaults_match_spec_numbers() {
        let risk = RiskConfig::default();
        assert_eq!(risk.max_concurrent, 4);
        assert_eq!(risk.daily_loss_limit_pct, 8.0);
    }

    #[test]
    fn env_u64_falls_back_on_missing_or_unparseable() {
        assert_eq!(env_u64("RUSTRADE_TEST_DOES_NOT_EXIST", 42), 42);
    }
}
