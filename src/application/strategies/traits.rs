//! The shared strategy contract: every per-symbol strategy takes a
//! read-only view of the market plus its own prior cache/exit state and
//! returns at most one signal plus the cache to persist for next cycle.

use crate::config::StrategyZones;
use crate::domain::position::{ExitMeta, PendingReversion};
use crate::domain::signal::Signal;
use crate::domain::threshold_cache::ThresholdCache;
use crate::domain::types::SymbolSnapshot;

/// Everything a strategy needs about the position it might already be
/// managing for its symbol.
#[derive(Debug, Clone, Default)]
pub struct PositionInfo {
    pub exit_meta: Option<ExitMeta>,
    pub has_live_position: bool,
    /// WaveRider's two-step reversion record, when one is scheduled for
    /// this symbol. `None` for every strategy family except WaveRider.
    pub pending_reversion: Option<PendingReversion>,
}

/// Read-only per-cycle context handed to every strategy scan. Built
/// once by the arbiter/system layer and shared across all strategies
/// for a symbol — strategies never mutate it.
pub struct StrategyContext<'a> {
    pub snapshot: &'a SymbolSnapshot,
    pub position: &'a PositionInfo,
    pub zones: &'a StrategyZones,
    pub now_ms: i64,
}

/// One (symbol, strategy-family) scan's result: at most one signal, and
/// the threshold cache to persist for the next cycle's fast path.
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    pub signal: Option<Signal>,
    pub next_cache: Option<ThresholdCache>,
}

impl ScanOutput {
    pub fn signal_only(signal: Signal) -> Self {
        Self {
            signal: Some(signal),
            next_cache: None,
        }
    }

    pub fn with_cache(mut self, cache: ThresholdCache) -> Self {
        self.next_cache = Some(cache);
        self
    }
}

/// A per-symbol trading strategy. `family()` names the ExitMeta/cache
/// storage bucket this strategy owns (e.g. `"btc_wall"`,
/// `"wave_rider"`) — spec.md keeps these separate per symbol per
/// strategy family rather than a single shared table.
pub trait TradingStrategy: Send + Sync {
    fn family(&self) -> &'static str;

    /// Exit scan: evaluated first, every cycle, whenever a position or
    /// ExitMeta owned by this family exists for the symbol. Returns
    /// `close`, `hold_position`, or nothing (meta absent, no
    /// position).
    fn exit_scan(&self, ctx: &StrategyContext<'_>) -> Option<Signal>;

    /// New-entry scan: only called when the exit scan produced nothing
    /// and `ctx.position.has_live_position` is false.
    fn entry_scan(&self, ctx: &StrategyContext<'_>, prior_cache: Option<ThresholdCache>) -> ScanOutput;
}
