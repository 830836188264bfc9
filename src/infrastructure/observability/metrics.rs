//! Prometheus metrics definitions for the agent.
//!
//! All metrics use the `rustrade_` prefix and are read-only.

use prometheus::{
    CounterVec, Gauge, GaugeVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge, GenericGaugeVec},
};
use std::sync::Arc;

/// Prometheus metrics for the trading agent.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Total account equity in USD.
    pub equity_usd: GenericGauge<AtomicF64>,
    /// Number of open positions.
    pub positions_count: GenericGauge<AtomicF64>,
    /// Unrealized P&L per symbol.
    pub position_pnl_usd: GenericGaugeVec<AtomicF64>,
    /// Realized + unrealized daily P&L in USD.
    pub daily_pnl_usd: GenericGauge<AtomicF64>,
    /// Daily loss as a percentage of start-of-day equity.
    pub daily_loss_pct: GenericGauge<AtomicF64>,
    /// Drawdown from the realized-only peak, as a percentage.
    pub drawdown_pct: GenericGauge<AtomicF64>,
    /// Kill-switch state (0=inactive, 1=active).
    pub kill_switch_active: GenericGauge<AtomicF64>,
    /// Consecutive agent-cycle failures.
    pub consecutive_failures: GenericGauge<AtomicF64>,
    /// Minutes elapsed in the current volume-fallback streak.
    pub fallback_minutes: GenericGauge<AtomicF64>,
    /// Total orders by symbol and outcome (filled/partial/failed).
    pub orders_total: CounterVec,
    /// Strategy signals generated, by strategy and action.
    pub trade_signals_total: CounterVec,
    /// Uptime in seconds.
    pub uptime_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let equity_usd =
            Gauge::with_opts(Opts::new("rustrade_equity_usd", "Total account equity in USD"))?;
        registry.register(Box::new(equity_usd.clone()))?;

        let positions_count = Gauge::with_opts(Opts::new(
            "rustrade_positions_count",
            "Number of open positions",
        ))?;
        registry.register(Box::new(positions_count.clone()))?;

        let position_pnl_usd = GaugeVec::new(
            Opts::new(
                "rustrade_position_pnl_usd",
                "Unrealized P&L per symbol in USD",
            ),
            &["symbol"],
        )?;
        registry.register(Box::new(position_pnl_usd.clone()))?;

        let daily_pnl_usd =
            Gauge::with_opts(Opts::new("rustrade_daily_pnl_usd", "Daily P&L in USD"))?;
        registry.register(Box::new(daily_pnl_usd.clone()))?;

        let daily_loss_pct = Gauge::with_opts(Opts::new(
            "rustrade_daily_loss_pct",
            "Daily loss as a percentage of start-of-day equity",
        ))?;
        registry.register(Box::new(daily_loss_pct.clone()))?;

        let drawdown_pct = Gauge::with_opts(Opts::new(
            "rustrade_drawdown_pct",
            "Drawdown from the realized-only peak, as a percentage",
        ))?;
        registry.register(Box::new(drawdown_pct.clone()))?;

        let kill_switch_active = Gauge::with_opts(Opts::new(
            "rustrade_kill_switch_active",
            "Kill-switch state (0=inactive, 1=active)",
        ))?;
        registry.register(Box::new(kill_switch_active.clone()))?;

        let consecutive_failures = Gauge::with_opts(Opts::new(
            "rustrade_consecutive_failures",
            "Consecutive agent-cycle failures",
        ))?;
        registry.register(Box::new(consecutive_failures.clone()))?;

        let fallback_minutes = Gauge::with_opts(Opts::new(
            "rustrade_fallback_minutes",
            "Minutes elapsed in the current volume-fallback streak",
        ))?;
        registry.register(Box::new(fallback_minutes.clone()))?;

        let orders_total = CounterVec::new(
            Opts::new("rustrade_orders_total", "Total orders by symbol and outcome"),
            &["symbol", "outcome"],
        )?;
        registry.register(Box::new(orders_total.clone()))?;

        let trade_signals_total = CounterVec::new(
            Opts::new(
                "rustrade_trade_signals_total",
                "Total strategy signals generated",
            ),
            &["strategy", "action"],
        )?;
        registry.register(Box::new(trade_signals_total.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "rustrade_uptime_seconds",
            "Agent uptime in seconds",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            equity_usd,
            positions_count,
            position_pnl_usd,
            daily_pnl_usd,
            daily_loss_pct,
            drawdown_pct,
            kill_switch_active,
            consecutive_failures,
            fallback_minutes,
            orders_total,
            trade_signals_total,
            uptime_seconds,
        })
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn set_position_pnl(&self, symbol: &str, pnl: f64) {
        self.position_pnl_usd.with_label_values(&[symbol]).set(pnl);
    }

    pub fn inc_orders(&self, symbol: &str, outcome: &str) {
        self.orders_total.with_label_values(&[symbol, outcome]).inc();
    }

    pub fn inc_signals(&self, strategy: &str, action: &str) {
        self.trade_signals_total
            .with_label_values(&[strategy, action])
            .inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to construct default Metrics registry")
    }
}
