//! Typed wrappers over `atomic_store` for each state file spec.md 6
//! names. Kept as one small struct per concern rather than a single
//! god-object, matching the teacher's one-file-one-persisted-type
//! convention in `settings_persistence.rs`/`optimal_parameters_persistence.rs`.

use crate::domain::errors::AtomicStoreError;
use crate::domain::failure::{FailureCounter, FallbackTracker};
use crate::domain::kill_switch::KillSwitch;
use crate::domain::pnl::{DailyPnl, TradeHistory};
use crate::domain::ports::Paths;
use crate::domain::position::{ExitMeta, PendingReversion, Position};
use crate::domain::signal::SignalBatch;
use crate::domain::size_regime::SizeRegime;
use crate::domain::threshold_cache::ThresholdCache;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

use super::atomic_store::{read_json, read_json_or_default, symbol_meta_path, write_json};

/// Handle bundling `Paths` with the typed accessors. Cheap to construct;
/// holds no locks or cached state itself — every call hits disk, which
/// is the point (the exchange and the filesystem are both external
/// sources of truth the agent must re-read, never assume).
#[derive(Debug, Clone)]
pub struct StateStore {
    paths: Paths,
}

impl StateStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    // -- positions ---------------------------------------------------

    pub fn load_positions(&self) -> Result<Vec<Position>, AtomicStoreError> {
        read_json_or_default(&self.positions_path(), Vec::new)
    }

    pub fn save_positions(&self, positions: &[Position]) -> Result<(), AtomicStoreError> {
        write_json(&self.positions_path(), &positions)
    }

    fn positions_path(&self) -> std::path::PathBuf {
        self.paths.state_dir.join("positions.json")
    }

    // -- exit metadata (per symbol, per strategy family) --------------

    pub fn load_exit_meta(
        &self,
        symbol: &str,
        family: &str,
    ) -> Result<Option<ExitMeta>, AtomicStoreError> {
        match read_json(&symbol_meta_path(&self.paths.state_dir, symbol, family)) {
            Ok(meta) => Ok(Some(meta)),
            Err(AtomicStoreError::Missing { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save_exit_meta(
        &self,
        symbol: &str,
        family: &str,
        meta: &ExitMeta,
    ) -> Result<(), AtomicStoreError> {
        write_json(&symbol_meta_path(&self.paths.state_dir, symbol, family), meta)
    }

    pub fn delete_exit_meta(&self, symbol: &str, family: &str) -> std::io::Result<()> {
        let path = symbol_meta_path(&self.paths.state_dir, symbol, family);
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    // -- WaveRider pending reversion (per symbol) ----------------------

    pub fn load_pending_reversion(
        &self,
        symbol: &str,
    ) -> Result<Option<PendingReversion>, AtomicStoreError> {
        match read_json(&symbol_meta_path(&self.paths.state_dir, symbol, "wr_rev_pending")) {
            Ok(v) => Ok(Some(v)),
            Err(AtomicStoreError::Missing { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save_pending_reversion(
        &self,
        symbol: &str,
        pending: &PendingReversion,
    ) -> Result<(), AtomicStoreError> {
        write_json(
            &symbol_meta_path(&self.paths.state_dir, symbol, "wr_rev_pending"),
            pending,
        )
    }

    pub fn delete_pending_reversion(&self, symbol: &str) -> std::io::Result<()> {
        let path = symbol_meta_path(&self.paths.state_dir, symbol, "wr_rev_pending");
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    // -- daily pnl -----------------------------------------------------

    pub fn load_daily_pnl(&self, today: NaiveDate, equity: Decimal) -> Result<DailyPnl, AtomicStoreError> {
        read_json_or_default(&self.daily_pnl_path(), || DailyPnl::reset(today, equity))
    }

    pub fn save_daily_pnl(&self, pnl: &DailyPnl) -> Result<(), AtomicStoreError> {
        write_json(&self.daily_pnl_path(), pnl)
    }

    fn daily_pnl_path(&self) -> std::path::PathBuf {
        self.paths.state_dir.join("daily_pnl.json")
    }

    // -- trade history ---------------------------------------------------

    pub fn load_trade_history(&self) -> Result<TradeHistory, AtomicStoreError> {
        read_json_or_default(&self.trade_history_path(), TradeHistory::default)
    }

    pub fn save_trade_history(&self, history: &TradeHistory) -> Result<(), AtomicStoreError> {
        write_json(&self.trade_history_path(), history)
    }

    fn trade_history_path(&self) -> std::path::PathBuf {
        self.paths.state_dir.join("trade_history.json")
    }

    // -- kill switch: fail-safe default is *active* when the file is
    // missing, which is why this does not go through
    // `read_json_or_default` (that helper's default is meant for benign
    // fallbacks, not a fail-safe-active posture).

    pub fn load_kill_switch(&self) -> Result<KillSwitch, AtomicStoreError> {
        match read_json(&self.kill_switch_path()) {
            Ok(ks) => Ok(ks),
            Err(AtomicStoreError::Missing { .. }) => Ok(KillSwitch::failsafe_default()),
            Err(e) => Err(e),
        }
    }

    pub fn save_kill_switch(&self, ks: &KillSwitch) -> Result<(), AtomicStoreError> {
        write_json(&self.kill_switch_path(), ks)
    }

    fn kill_switch_path(&self) -> std::path::PathBuf {
        self.paths.state_dir.join("kill_switch.json")
    }

    // -- threshold cache (per symbol, per strategy) --------------------

    pub fn load_threshold_cache(
        &self,
        symbol: &str,
        strategy: &str,
    ) -> Result<Option<ThresholdCache>, AtomicStoreError> {
        match read_json(&self.threshold_cache_path(symbol, strategy)) {
            Ok(cache) => Ok(Some(cache)),
            Err(AtomicStoreError::Missing { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save_threshold_cache(
        &self,
        symbol: &str,
        strategy: &str,
        cache: &ThresholdCache,
    ) -> Result<(), AtomicStoreError> {
        write_json(&self.threshold_cache_path(symbol, strategy), cache)
    }

    fn threshold_cache_path(&self, symbol: &str, strategy: &str) -> std::path::PathBuf {
        self.paths
            .state_dir
            .join(format!("{}_{}_cache.json", symbol.to_lowercase(), strategy))
    }

    // -- failure / fallback tracking -----------------------------------

    pub fn load_failure_counter(&self) -> Result<FailureCounter, AtomicStoreError> {
        read_json_or_default(&self.failure_counter_path(), FailureCounter::default)
    }

    pub fn save_failure_counter(&self, counter: &FailureCounter) -> Result<(), AtomicStoreError> {
        write_json(&self.failure_counter_path(), counter)
    }

    fn failure_counter_path(&self) -> std::path::PathBuf {
        self.paths.state_dir.join("agent_failure_count.json")
    }

    pub fn load_fallback_tracker(&self) -> Result<FallbackTracker, AtomicStoreError> {
        read_json_or_default(&self.fallback_tracker_path(), FallbackTracker::default)
    }

    pub fn save_fallback_tracker(&self, tracker: &FallbackTracker) -> Result<(), AtomicStoreError> {
        write_json(&self.fallback_tracker_path(), tracker)
    }

    fn fallback_tracker_path(&self) -> std::path::PathBuf {
        self.paths.state_dir.join("data_health.json")
    }

    // -- size regime (optional external sizing hint) -------------------

    pub fn load_size_regime(&self) -> Result<SizeRegime, AtomicStoreError> {
        let regime: SizeRegime = read_json_or_default(&self.size_regime_path(), SizeRegime::default)?;
        Ok(regime.normalized())
    }

    fn size_regime_path(&self) -> std::path::PathBuf {
        self.paths.state_dir.join("size_regime.json")
    }

    // -- signals ---------------------------------------------------------

    pub fn save_signal_batch(&self, batch: &SignalBatch) -> Result<(), AtomicStoreError> {
        write_json(&self.signals_path(), batch)
    }

    fn signals_path(&self) -> std::path::PathBuf {
        self.paths.signals_dir.join("signals.json")
    }

    // -- snapshot archival (gzip, one file per collector cycle) --------

    pub fn archive_snapshot<T: serde::Serialize>(
        &self,
        date: NaiveDate,
        time_suffix: &str,
        snapshot: &T,
    ) -> Result<(), AtomicStoreError> {
        let dir = self.paths.data_dir.join("history").join(date.to_string());
        let path = dir.join(format!("{time_suffix}.json.gz"));
        super::atomic_store::write_gzip_json(&path, snapshot)
    }
}

/// Sum of `unrealized_pnl` across all currently-open positions, used by
/// `DailyPnl::reconcile_unrealized`.
pub fn sum_unrealized(positions: &[Position]) -> Decimal {
    positions.iter().map(|p| p.unrealized_pnl).sum()
}

/// Index positions by symbol for O(1) per-symbol lookups during the
/// arbitration/executor pass.
pub fn index_by_symbol(positions: &[Position]) -> HashMap<String, &Position> {
    positions.iter().map(|p| (p.symbol.clone(), p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Side;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn temp_paths() -> Paths {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!("rustrade-state-store-test-{n}"));
        Paths::new(root)
    }

    #[test]
    fn kill_switch_defaults_to_active_when_missing() {
        let store = StateStore::new(temp_paths());
        let ks = store.load_kill_switch().unwrap();
        assert!(ks.is_active());
    }

    #[test]
    fn positions_roundtrip_empty_by_default() {
        let store = StateStore::new(temp_paths());
        assert!(store.load_positions().unwrap().is_empty());

        let positions = vec![Position {
            symbol: "BTC".to_string(),
            side: Side::Long,
            size: dec!(1),
            entry_price: dec!(100),
            leverage: 5,
            opened_at: Some(0),
            unrealized_pnl: dec!(0),
            mid_price: dec!(100),
        }];
        store.save_positions(&positions).unwrap();
        let loaded = store.load_positions().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].symbol, "BTC");
    }

    #[test]
    fn exit_meta_round_trips_and_deletes() {
        let store = StateStore::new(temp_paths());
        assert!(store.load_exit_meta("BTC", "wave_rider").unwrap().is_none());

        let meta = ExitMeta {
            pattern: "wave_rider".to_string(),
            direction: Side::Long,
            entry_price: 100.0,
            stop_loss: 95.0,
            take_profit: 110.0,
            exit_mode: crate::domain::position::ExitMode::TimeCut,
            exit_bars: 8,
            bar_count: 0,
            entry_time: 0,
            vol_ratio: None,
        };
        store.save_exit_meta("BTC", "wave_rider", &meta).unwrap();
        assert!(store.load_exit_meta("BTC", "wave_rider").unwrap().is_some());

        store.delete_exit_meta("BTC", "wave_rider").unwrap();
        assert!(store.load_exit_meta("BTC", "wave_rider").unwrap().is_none());
    }

    #[test]
    fn sum_unrealized_across_positions() {
        let positions = vec![
            Position {
                symbol: "BTC".to_string(),
                side: Side::Long,
                size: dec!(1),
                entry_price: dec!(100),
                leverage: 1,
                opened_at: None,
                unrealized_pnl: dec!(5),
                mid_price: dec!(105),
            },
            Position {
                symbol: "ETH".to_string(),
                side: Side::Short,
                size: dec!(2),
                entry_price: dec!(50),
                leverage: 1,
                opened_at: None,
                unrealized_pnl: dec!(-3),
                mid_price: dec!(51.5),
            },
        ];
        assert_eq!(sum_unrealized(&positions), dec!(2));
    }
}
