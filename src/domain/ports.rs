//! Port traits the application layer depends on, implemented by
//! `infrastructure`. No global singletons: callers thread a `Clock` and
//! an `ExchangeAdapter` explicitly (spec Design Note 4).

use crate::domain::position::Position;
use crate::domain::types::{Candle, OrderBook};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// UTC wall clock, abstracted so tests can fix a time. Used for
/// cooldowns, min-hold windows, WaveRider's UTC-15:00 trigger, and daily
/// rollover.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
    fn today(&self) -> chrono::NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn today(&self) -> chrono::NaiveDate {
        chrono::Utc::now().date_naive()
    }
}

/// Where the agent's JSON state lives on disk (spec.md 6 file layout).
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: std::path::PathBuf,
    pub state_dir: std::path::PathBuf,
    pub signals_dir: std::path::PathBuf,
}

impl Paths {
    pub fn new(root: impl AsRef<std::path::Path>) -> Self {
        let root = root.as_ref();
        Self {
            data_dir: root.join("data"),
            state_dir: root.join("state"),
            signals_dir: root.join("signals"),
        }
    }
}

/// Whether an order ended up filled, resting (partial), or rejected —
/// classified over the exchange's raw status entries (spec.md 4.2).
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Filled { avg_price: f64 },
    Partial,
    Failed { reason: String },
    NoPosition,
}

/// Normalized equity figure after regime selection (spot-collateral vs.
/// standard accountValue).
#[derive(Debug, Clone, Copy)]
pub struct Equity {
    pub total: Decimal,
}

/// Normalized exchange adapter. Hazards (string parsing, signed size,
/// polymorphic leverage, equity regimes, fill classification) are
/// handled by the implementation; callers only see clean types.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    async fn mid_prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>>;
    async fn candles(&self, symbol: &str, interval: &str, count: usize) -> Result<Vec<Candle>>;
    async fn orderbook(&self, symbol: &str, depth: usize) -> Result<OrderBook>;
    async fn funding_rate(&self, symbol: &str) -> Result<Option<f64>>;
    async fn equity(&self) -> Result<Equity>;
    async fn positions(&self) -> Result<Vec<Position>>;
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()>;
    async fn open_market(
        &self,
        symbol: &str,
        side: crate::domain::types::Side,
        size: Decimal,
    ) -> Result<OrderOutcome>;
    async fn close_market(&self, symbol: &str) -> Result<OrderOutcome>;
    async fn cancel(&self, symbol: &str, order_id: &str) -> Result<()>;
}
