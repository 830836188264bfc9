//! Per-symbol data quality scoring for the entry gate's
//! `DataQuality` check (spec.md 4.6.2).
//!
//! `original_source/src/executor/trade_executor.py`'s `_check_data_quality`
//! reads a persisted `data_health.json` report written by the monitor
//! process. That filename is already spoken for on this port by
//! [`crate::domain::failure::FallbackTracker`] (a different concept: a
//! no-volume-spike streak, not a completeness score), so rather than
//! collide with it this computes the score live from the snapshot that's
//! already in hand every cycle -- no extra state file, no staleness
//! window to reason about.
//!
//! The score is a weighted fraction of how much of a cycle's fetch
//! completed: mid price and the order book matter most (the gate's other
//! checks -- spread, imbalance -- depend on them directly), each candle
//! interval contributes a smaller, equal share.
use crate::domain::types::SymbolSnapshot;

const MID_PRICE_WEIGHT: f64 = 0.30;
const ORDERBOOK_WEIGHT: f64 = 0.20;
const FUNDING_WEIGHT: f64 = 0.10;
const CANDLE_WEIGHT: f64 = 0.10; // x4 intervals = 0.40

/// 0.0 (nothing fetched) to 1.0 (every field present this cycle).
pub fn score(snapshot: &SymbolSnapshot) -> f64 {
    let mut total = 0.0;

    if snapshot.mid_price.is_some() {
        total += MID_PRICE_WEIGHT;
    }
    if !snapshot.orderbook.bids.is_empty() && !snapshot.orderbook.asks.is_empty() {
        total += ORDERBOOK_WEIGHT;
    }
    if snapshot.funding_rate.is_some() {
        total += FUNDING_WEIGHT;
    }
    for candles in [
        &snapshot.candles_5m,
        &snapshot.candles_15m,
        &snapshot.candles_1h,
        &snapshot.candles_4h,
    ] {
        if !candles.is_empty() {
            total += CANDLE_WEIGHT;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Candle, OrderBook, PriceLevel};

    fn candle() -> Candle {
        Candle { t: 0, o: 1.0, h: 1.0, l: 1.0, c: 1.0, v: 1.0 }
    }

    #[test]
    fn fully_populated_snapshot_scores_one() {
        let snapshot = SymbolSnapshot {
            symbol: "BTC".to_string(),
            mid_price: Some(100.0),
            candles_5m: vec![candle()],
            candles_15m: vec![candle()],
            candles_1h: vec![candle()],
            candles_4h: vec![candle()],
            orderbook: OrderBook {
                bids: vec![PriceLevel { px: 99.0, sz: 1.0 }],
                asks: vec![PriceLevel { px: 101.0, sz: 1.0 }],
            },
            funding_rate: Some(0.0001),
        };
        assert!((score(&snapshot) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_snapshot_scores_zero() {
        let snapshot = SymbolSnapshot::default();
        assert_eq!(score(&snapshot), 0.0);
    }

    #[test]
    fn missing_orderbook_drops_score_by_its_weight() {
        let snapshot = SymbolSnapshot {
            symbol: "BTC".to_string(),
            mid_price: Some(100.0),
            candles_5m: vec![candle()],
            candles_15m: vec![candle()],
            candles_1h: vec![candle()],
            candles_4h: vec![candle()],
            orderbook: OrderBook::default(),
            funding_rate: Some(0.0001),
        };
        let expected = 1.0 - ORDERBOOK_WEIGHT;
        assert!((score(&snapshot) - expected).abs() < 1e-9);
    }
}
