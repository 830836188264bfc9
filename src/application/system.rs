//! Top-level cycle orchestration (spec.md 5): wires the collector,
//! arbiter, supervisor and executor into one scheduled pass and owns the
//! state the metrics reporter reads from. Grounded on the teacher's
//! `src/bin/server.rs` / `Application` start-loop shape, generalized from
//! a GUI-fed event loop to a headless `tokio::time::interval` scheduler.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::domain::pnl::DailyPnl;
use crate::domain::ports::{Clock, ExchangeAdapter, Paths, SystemClock};
use crate::domain::position::Position;
use crate::domain::signal::SignalBatch;
use crate::domain::types::SymbolSnapshot;
use crate::infrastructure::exchange::MockExchange;
use crate::infrastructure::observability::metrics::Metrics;
use crate::infrastructure::observability::reporter::ReporterState;
use crate::infrastructure::persistence::state_store::{StateStore, sum_unrealized};

use super::arbiter::SignalArbiter;
use super::executor::Executor;
use super::market_data::MarketCollector;
use super::risk_management::{RiskValidationPipeline, default_validators};
use super::strategies::{StrategyFactory, TradingStrategy};
use super::supervisor::Supervisor;

/// How far a position book's API-reported unrealized PnL may drift from
/// the daily tracker's own figure before the tracker re-bases to it.
const UNREALIZED_RECONCILE_TOLERANCE_USD: f64 = 1.0;

/// Running application: holds everything a cycle needs and the shared
/// handle the metrics reporter polls.
pub struct Application {
    config: Config,
    state: StateStore,
    adapter: Arc<dyn ExchangeAdapter>,
    clock: Arc<dyn Clock>,
    pipeline: RiskValidationPipeline,
    metrics: Metrics,
    reporter_state: Arc<RwLock<ReporterState>>,
    prior_snapshots: HashMap<String, SymbolSnapshot>,
}

/// Handle returned to the caller once the cycle loop is running.
pub struct AppHandle {
    pub reporter_state: Arc<RwLock<ReporterState>>,
    task: tokio::task::JoinHandle<()>,
}

impl AppHandle {
    pub async fn shutdown(self) {
        self.task.abort();
    }
}

impl Application {
    /// Build the application against a real (or test) exchange adapter.
    /// The HTTP/WS transport for a live venue is out of scope here
    /// (spec.md 4.2); callers wire that adapter in through this
    /// constructor. [`Application::build`] below supplies the in-memory
    /// adapter so the binary still runs end to end without one.
    pub fn new(config: Config, adapter: Arc<dyn ExchangeAdapter>) -> anyhow::Result<Self> {
        let paths = Paths::new(&config.root_dir);
        let state = StateStore::new(paths);
        let metrics = Metrics::new()?;
        Ok(Self {
            config,
            state,
            adapter,
            clock: Arc::new(SystemClock),
            pipeline: RiskValidationPipeline::new(default_validators()),
            metrics,
            reporter_state: Arc::new(RwLock::new(ReporterState::default())),
            prior_snapshots: HashMap::new(),
        })
    }

    /// Convenience constructor used by the binary until a real exchange
    /// adapter is wired in (spec.md 4.2 leaves that transport out of
    /// scope for this core).
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        Self::new(config, Arc::new(MockExchange::new()))
    }

    pub fn reporter_state(&self) -> Arc<RwLock<ReporterState>> {
        self.reporter_state.clone()
    }

    /// Startup data-health check (spec.md 6's exit code 1 case): fetches
    /// one snapshot per configured symbol and reports whether at least
    /// one cleared the entry gate's data-quality floor. A fleet-wide
    /// failure here means the exchange connection itself is bad, not
    /// that one symbol is temporarily degraded -- not worth starting the
    /// scheduler over.
    pub async fn data_health_ok(&mut self) -> bool {
        let snapshots = MarketCollector::collect(&self.config.symbols, self.adapter.as_ref(), &self.config.retry, &self.prior_snapshots).await;
        self.prior_snapshots = snapshots.clone();
        snapshots
            .values()
            .any(|s| super::market_data::health::score(s) >= self.config.entry_gate.min_data_quality_score)
    }

    /// Spawns the cycle scheduler in the background and returns a handle
    /// the caller can use to reach the shared reporter state / stop it.
    pub async fn start(mut self) -> anyhow::Result<AppHandle> {
        let reporter_state = self.reporter_state.clone();
        let interval = std::time::Duration::from_secs(self.config.cycle_interval_secs.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = self.run_cycle().await {
                    error!(error = %e, "cycle failed");
                }
            }
        });

        Ok(AppHandle { reporter_state, task })
    }

    /// Runs exactly one collector -> arbiter -> supervisor -> executor
    /// pass. Exposed directly (not just through `start`) so tests and
    /// the CLI's health-check path can drive a single cycle.
    pub async fn run_cycle(&mut self) -> anyhow::Result<()> {
        let symbols = &self.config.symbols;
        let now = self.clock.today();

        let snapshots = MarketCollector::collect(symbols, self.adapter.as_ref(), &self.config.retry, &self.prior_snapshots).await;
        self.prior_snapshots = snapshots.clone();

        let positions = sync_positions(self.adapter.as_ref(), &self.state, symbols).await?;

        let live_equity = self.adapter.equity().await.map(|e| e.total).unwrap_or_else(|e| {
            warn!(error = %e, "equity fetch failed this cycle, falling back to state tracker's last value");
            Decimal::ZERO
        });
        let mut daily_pnl = self.state.load_daily_pnl(now, live_equity)?;
        reconcile_daily_unrealized(&mut daily_pnl, &positions);
        self.state.save_daily_pnl(&daily_pnl)?;

        let mut fallback_tracker = self.state.load_fallback_tracker()?;
        let batch = SignalArbiter::run(
            symbols,
            &snapshots,
            &positions,
            &self.state,
            &self.config.zones,
            &self.config.arbiter,
            self.clock.as_ref(),
            &mut fallback_tracker,
        )?;
        self.state.save_fallback_tracker(&fallback_tracker)?;
        self.state.save_signal_batch(&batch)?;

        let mut failures = self.state.load_failure_counter()?;
        let all_symbols_lacked_data = symbols.iter().all(|s| snapshots.get(s).map(symbol_has_no_candles).unwrap_or(true));
        let kill_switch = self.state.load_kill_switch()?;
        let outcome = Supervisor::evaluate(
            self.adapter.as_ref(),
            &self.config.risk,
            &daily_pnl,
            kill_switch,
            &mut failures,
            all_symbols_lacked_data,
            &mut fallback_tracker,
            self.clock.now_ms(),
        )
        .await?;
        self.state.save_failure_counter(&failures)?;
        self.state.save_fallback_tracker(&fallback_tracker)?;
        self.state.save_kill_switch(&outcome.kill_switch)?;
        for alert in &outcome.alerts {
            warn!(alert = alert.as_str(), "supervisor alert");
        }

        let batch_to_execute = if outcome.kill_switch.is_active() {
            SignalBatch::safe_hold("kill-switch active")
        } else {
            batch
        };
        let state_equity = daily_pnl.equity;
        let report = Executor::execute(
            &batch_to_execute,
            &snapshots,
            &self.state,
            self.adapter.as_ref(),
            &self.pipeline,
            &self.config,
            self.clock.as_ref(),
            &self.metrics,
            live_equity,
            state_equity,
            outcome.skip_risk_checks || outcome.kill_switch.is_active(),
        )
        .await?;
        info!(
            orders_placed = report.orders_placed,
            orders_closed = report.orders_closed,
            rejections = report.rejections,
            "cycle complete"
        );

        let positions_after = self.state.load_positions()?;
        let daily_pnl_after = self.state.load_daily_pnl(now, live_equity)?;
        let mut reporter = self.reporter_state.write().await;
        reporter.equity_usd = daily_pnl_after.equity.to_f64().unwrap_or(0.0);
        reporter.positions = positions_after;
        reporter.daily_pnl = Some(daily_pnl_after);
        reporter.kill_switch = Some(outcome.kill_switch);

        Ok(())
    }
}

fn symbol_has_no_candles(snapshot: &SymbolSnapshot) -> bool {
    snapshot.candles_5m.is_empty()
        && snapshot.candles_15m.is_empty()
        && snapshot.candles_1h.is_empty()
        && snapshot.candles_4h.is_empty()
}

/// Pulls the exchange's authoritative position book, overwrites the
/// local cache, and deletes any per-strategy ExitMeta (and WaveRider
/// pending-reversion state) left behind for symbols no longer open.
pub async fn sync_positions(
    adapter: &dyn ExchangeAdapter,
    state: &StateStore,
    symbols: &[String],
) -> anyhow::Result<Vec<Position>> {
    let positions = adapter.positions().await?;
    state.save_positions(&positions)?;

    let active: HashSet<&str> = positions.iter().map(|p| p.symbol.as_str()).collect();
    for symbol in symbols {
        if active.contains(symbol.as_str()) {
            continue;
        }
        for strategy in StrategyFactory::for_symbol(symbol) {
            let family = strategy.family();
            if let Err(e) = state.delete_exit_meta(symbol, family) {
                warn!(symbol = symbol.as_str(), family, error = %e, "failed to sweep stale exit meta");
            }
            if family == "wave_rider" {
                if let Err(e) = state.delete_pending_reversion(symbol) {
                    warn!(symbol = symbol.as_str(), error = %e, "failed to sweep stale pending reversion");
                }
            }
        }
    }
    Ok(positions)
}

/// Re-bases the daily tracker's unrealized PnL to the position book's
/// own figure whenever the two have drifted past tolerance.
pub fn reconcile_daily_unrealized(daily_pnl: &mut DailyPnl, positions: &[Position]) {
    let tolerance = Decimal::try_from(UNREALIZED_RECONCILE_TOLERANCE_USD).unwrap_or(Decimal::ONE);
    daily_pnl.reconcile_unrealized(sum_unrealized(positions), tolerance);
}
