//! Push-based metrics reporter.
//!
//! Periodically outputs metrics as structured JSON to stdout.
//!
//! **Security**: this system only sends data, never accepts requests.

use crate::domain::kill_switch::KillSwitch;
use crate::domain::pnl::DailyPnl;
use crate::domain::position::Position;
use crate::infrastructure::observability::metrics::Metrics;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub account: AccountSnapshot,
    pub risk: RiskSnapshot,
}

#[derive(Serialize)]
pub struct AccountSnapshot {
    pub equity_usd: f64,
    pub positions_count: usize,
    pub positions: Vec<PositionSnapshot>,
    pub daily_pnl_usd: f64,
}

#[derive(Serialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub side: String,
    pub size: f64,
    pub entry_price: f64,
    pub unrealized_pnl: f64,
}

#[derive(Serialize)]
pub struct RiskSnapshot {
    pub daily_loss_pct: f64,
    pub drawdown_pct: f64,
    pub kill_switch_active: bool,
    pub kill_switch_reason: Option<String>,
}

/// Shared state the reporter reads from each tick. Populated by the
/// supervisor/executor at the end of every cycle; the reporter never
/// mutates it.
#[derive(Debug, Clone, Default)]
pub struct ReporterState {
    pub equity_usd: f64,
    pub positions: Vec<Position>,
    pub daily_pnl: Option<DailyPnl>,
    pub kill_switch: Option<KillSwitch>,
}

/// Push-based metrics reporter.
///
/// Outputs metrics as structured JSON logs on a configurable interval.
/// No HTTP server, no incoming connections — only outbound data.
pub struct MetricsReporter {
    state: Arc<RwLock<ReporterState>>,
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(state: Arc<RwLock<ReporterState>>, metrics: Metrics, interval_seconds: u64) -> Self {
        Self {
            state,
            metrics,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    /// Run the reporter in a loop, outputting metrics periodically.
    pub async fn run(self) {
        info!(
            interval = ?self.interval,
            "metrics reporter starting; writing JSON to stdout"
        );

        loop {
            tokio::time::sleep(self.interval).await;

            match self.collect_snapshot().await {
                Ok(snapshot) => match serde_json::to_string(&snapshot) {
                    Ok(json) => {
                        println!("METRICS_JSON:{json}");
                        info!(
                            equity_usd = snapshot.account.equity_usd,
                            positions = snapshot.account.positions_count,
                            uptime_seconds = snapshot.uptime_seconds,
                            "reported metrics"
                        );
                    }
                    Err(e) => warn!(error = %e, "failed to serialize metrics snapshot"),
                },
                Err(e) => warn!(error = %e, "failed to collect metrics snapshot"),
            }
        }
    }

    async fn collect_snapshot(&self) -> anyhow::Result<MetricsSnapshot> {
        let state = self.state.read().await;
        let uptime = self.start_time.elapsed().as_secs();

        let positions: Vec<PositionSnapshot> = state
            .positions
            .iter()
            .map(|p| PositionSnapshot {
                symbol: p.symbol.clone(),
                side: p.side.to_string(),
                size: p.size.to_f64().unwrap_or(0.0),
                entry_price: p.entry_price.to_f64().unwrap_or(0.0),
                unrealized_pnl: p.unrealized_pnl.to_f64().unwrap_or(0.0),
            })
            .collect();

        let daily_pnl_usd = state
            .daily_pnl
            .as_ref()
            .map(|p| (p.realized_pnl + p.unrealized_pnl).to_f64().unwrap_or(0.0))
            .unwrap_or(0.0);
        let daily_loss_pct = state
            .daily_pnl
            .as_ref()
            .map(|p| p.daily_loss_pct().to_f64().unwrap_or(0.0))
            .unwrap_or(0.0);
        let drawdown_pct = state
            .daily_pnl
            .as_ref()
            .map(|p| p.drawdown_pct().to_f64().unwrap_or(0.0))
            .unwrap_or(0.0);
        let kill_switch_active = state.kill_switch.as_ref().map(|k| k.is_active()).unwrap_or(false);
        let kill_switch_reason = state.kill_switch.as_ref().and_then(|k| k.reason.clone());

        self.metrics.equity_usd.set(state.equity_usd);
        self.metrics.positions_count.set(positions.len() as f64);
        self.metrics.daily_pnl_usd.set(daily_pnl_usd);
        self.metrics.daily_loss_pct.set(daily_loss_pct);
        self.metrics.drawdown_pct.set(drawdown_pct);
        self.metrics
            .kill_switch_active
            .set(if kill_switch_active { 1.0 } else { 0.0 });
        self.metrics.uptime_seconds.set(uptime as f64);
        for p in &positions {
            self.metrics.set_position_pnl(&p.symbol, p.unrealized_pnl);
        }

        Ok(MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: uptime,
            version: env!("CARGO_PKG_VERSION").to_string(),
            account: AccountSnapshot {
                equity_usd: state.equity_usd,
                positions_count: positions.len(),
                positions,
                daily_pnl_usd,
            },
            risk: RiskSnapshot {
                daily_loss_pct,
                drawdown_pct,
                kill_switch_active,
                kill_switch_reason,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn snapshot_collection_defaults_to_empty_account() {
        let state = Arc::new(RwLock::new(ReporterState::default()));
        let metrics = Metrics::new().expect("failed to create metrics");
        let reporter = MetricsReporter::new(state, metrics, 60);

        let snapshot = reporter
            .collect_snapshot()
            .await
            .expect("failed to collect snapshot");

        assert_eq!(snapshot.account.positions_count, 0);
        assert!(!snapshot.risk.kill_switch_active);
        assert!(!snapshot.timestamp.is_empty());
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let snapshot = MetricsSnapshot {
            timestamp: "2026-01-10T10:00:00Z".to_string(),
            uptime_seconds: 3600,
            version: "0.1.0".to_string(),
            account: AccountSnapshot {
                equity_usd: 10_500.0,
                positions_count: 1,
                positions: vec![PositionSnapshot {
                    symbol: "BTC".to_string(),
                    side: "long".to_string(),
                    size: 0.1,
                    entry_price: 60_000.0,
                    unrealized_pnl: 120.0,
                }],
                daily_pnl_usd: 120.0,
            },
            risk: RiskSnapshot {
                daily_loss_pct: 0.0,
                drawdown_pct: 0.0,
                kill_switch_active: false,
                kill_switch_reason: None,
            },
        };

        let json = serde_json::to_string(&snapshot).expect("failed to serialize");
        assert!(json.contains("BTC"));
        assert!(json.contains("10500"));
    }
}
