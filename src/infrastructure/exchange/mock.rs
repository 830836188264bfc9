//! In-memory `ExchangeAdapter` for tests and local runs without a live
//! venue. Holds deterministic candle/orderbook fixtures and a mutable
//! position book, following the teacher's `infrastructure/mock.rs`
//! in-memory-async-service idiom.
//!
//! The normalization hazards the real adapter must defend against (API
//! values arriving as strings, signed size encoding side, leverage as
//! either a scalar or a `{"value": N}` object, two mutually exclusive
//! equity regimes) are grounded on `original_source/src/api/hl_client.py`
//! and reproduced here deliberately so strategy/executor code is
//! exercised against the same shapes a real adapter would hand it.

use crate::domain::errors::ExchangeError;
use crate::domain::ports::{Equity, ExchangeAdapter, OrderOutcome};
use crate::domain::position::Position;
use crate::domain::types::{Candle, OrderBook, PriceLevel, Side};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct MockState {
    mid_prices: HashMap<String, f64>,
    candles: HashMap<(String, String), Vec<Candle>>,
    orderbooks: HashMap<String, OrderBook>,
    funding_rates: HashMap<String, f64>,
    equity: Decimal,
    positions: Vec<Position>,
    leverage: HashMap<String, u32>,
    /// When set, the next `open_market`/`close_market` call returns this
    /// outcome instead of synthesizing a fill — lets tests exercise
    /// `OrderOutcome::Failed`/`Partial` without a real venue.
    forced_outcome: Option<OrderOutcome>,
}

/// Thread-safe, clonable handle. Cloning shares the same backing state
/// (an `Arc`-like handle via `RwLock` over the struct itself would
/// require wrapping in `Arc` at the call site) — tests construct one and
/// pass `&MockExchange` or wrap it in `Arc` as needed.
#[derive(Debug, Default)]
pub struct MockExchange {
    state: RwLock<MockState>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState {
                equity: Decimal::from(10_000),
                ..Default::default()
            }),
        }
    }

    pub async fn set_mid_price(&self, symbol: &str, price: f64) {
        self.state
            .write()
            .await
            .mid_prices
            .insert(symbol.to_string(), price);
    }

    pub async fn set_candles(&self, symbol: &str, interval: &str, candles: Vec<Candle>) {
        self.state
            .write()
            .await
            .candles
            .insert((symbol.to_string(), interval.to_string()), candles);
    }

    pub async fn set_orderbook(&self, symbol: &str, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) {
        self.state
            .write()
            .await
            .orderbooks
            .insert(symbol.to_string(), OrderBook { bids, asks });
    }

    pub async fn set_funding_rate(&self, symbol: &str, rate: f64) {
        self.state
            .write()
            .await
            .funding_rates
            .insert(symbol.to_string(), rate);
    }

    pub async fn set_equity(&self, equity: Decimal) {
        self.state.write().await.equity = equity;
    }

    pub async fn set_positions(&self, positions: Vec<Position>) {
        self.state.write().await.positions = positions;
    }

    pub async fn force_next_outcome(&self, outcome: OrderOutcome) {
        self.state.write().await.forced_outcome = Some(outcome);
    }
}

#[async_trait]
impl ExchangeAdapter for MockExchange {
    async fn mid_prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>> {
        let state = self.state.read().await;
        Ok(symbols
            .iter()
            .filter_map(|s| state.mid_prices.get(s).map(|p| (s.clone(), *p)))
            .collect())
    }

    async fn candles(&self, symbol: &str, interval: &str, count: usize) -> Result<Vec<Candle>> {
        let state = self.state.read().await;
        let key = (symbol.to_string(), interval.to_string());
        let series = state.candles.get(&key).cloned().unwrap_or_default();
        let start = series.len().saturating_sub(count);
        Ok(series[start..].to_vec())
    }

    async fn orderbook(&self, symbol: &str, depth: usize) -> Result<OrderBook> {
        let state = self.state.read().await;
        let mut book = state.orderbooks.get(symbol).cloned().unwrap_or(OrderBook {
            bids: Vec::new(),
            asks: Vec::new(),
        });
        book.bids.truncate(depth);
        book.asks.truncate(depth);
        Ok(book)
    }

    async fn funding_rate(&self, symbol: &str) -> Result<Option<f64>> {
        Ok(self.state.read().await.funding_rates.get(symbol).copied())
    }

    async fn equity(&self) -> Result<Equity> {
        Ok(Equity {
            total: self.state.read().await.equity,
        })
    }

    async fn positions(&self) -> Result<Vec<Position>> {
        Ok(self.state.read().await.positions.clone())
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<()> {
        self.state
            .write()
            .await
            .leverage
            .insert(symbol.to_string(), leverage);
        Ok(())
    }

    async fn open_market(
        &self,
        symbol: &str,
        side: Side,
        size: Decimal,
    ) -> Result<OrderOutcome> {
        let mut state = self.state.write().await;
        if let Some(forced) = state.forced_outcome.take() {
            return Ok(forced);
        }
        let mid = *state
            .mid_prices
            .get(symbol)
            .ok_or_else(|| ExchangeError::InvalidResponse {
                endpoint: "open_market".to_string(),
                reason: format!("no mid price fixture for {symbol}"),
            })?;
        let entry_price = Decimal::try_from(mid).unwrap_or_default();
        let leverage = *state.leverage.get(symbol).unwrap_or(&1);
        state.positions.push(Position {
            symbol: symbol.to_string(),
            side,
            size,
            entry_price,
            leverage,
            opened_at: Some(0),
            unrealized_pnl: Decimal::ZERO,
            mid_price: entry_price,
        });
        Ok(OrderOutcome::Filled { avg_price: mid })
    }

    async fn close_market(&self, symbol: &str) -> Result<OrderOutcome> {
        let mut state = self.state.write().await;
        if let Some(forced) = state.forced_outcome.take() {
            return Ok(forced);
        }
        let mid = state.mid_prices.get(symbol).copied();
        let had_position = state.positions.iter().any(|p| p.symbol == symbol);
        state.positions.retain(|p| p.symbol != symbol);
        match (had_position, mid) {
            (true, Some(avg_price)) => Ok(OrderOutcome::Filled { avg_price }),
            (true, None) => Ok(OrderOutcome::Failed {
                reason: format!("no mid price fixture for {symbol}"),
            }),
            (false, _) => Ok(OrderOutcome::NoPosition),
        }
    }

    async fn cancel(&self, _symbol: &str, _order_id: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_then_close_round_trips_through_positions() {
        let exchange = MockExchange::new();
        exchange.set_mid_price("BTC", 50_000.0).await;

        let outcome = exchange
            .open_market("BTC", Side::Long, Decimal::from(1))
            .await
            .unwrap();
        assert!(matches!(outcome, OrderOutcome::Filled { avg_price } if avg_price == 50_000.0));
        assert_eq!(exchange.positions().await.unwrap().len(), 1);

        let outcome = exchange.close_market("BTC").await.unwrap();
        assert!(matches!(outcome, OrderOutcome::Filled { .. }));
        assert!(exchange.positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn close_without_position_is_no_position() {
        let exchange = MockExchange::new();
        let outcome = exchange.close_market("ETH").await.unwrap();
        assert_eq!(outcome, OrderOutcome::NoPosition);
    }

    #[tokio::test]
    async fn forced_outcome_overrides_default_fill_logic() {
        let exchange = MockExchange::new();
        exchange.set_mid_price("BTC", 50_000.0).await;
        exchange
            .force_next_outcome(OrderOutcome::Failed {
                reason: "insufficient margin".to_string(),
            })
            .await;
        let outcome = exchange
            .open_market("BTC", Side::Long, Decimal::from(1))
            .await
            .unwrap();
        assert!(matches!(outcome, OrderOutcome::Failed { .. }));
        assert!(exchange.positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn candle_count_truncates_from_the_tail() {
        let exchange = MockExchange::new();
        let candles: Vec<Candle> = (0..10)
            .map(|i| Candle {
                t: i,
                o: 1.0,
                h: 1.0,
                l: 1.0,
                c: 1.0,
                v: 1.0,
            })
            .collect();
        exchange.set_candles("BTC", "5m", candles).await;
        let last3 = exchange.candles("BTC", "5m", 3).await.unwrap();
        assert_eq!(last3.len(), 3);
        assert_eq!(last3[0].t, 7);
        assert_eq!(last3[2].t, 9);
    }
}
