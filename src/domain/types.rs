//! Market data types shared by the collector and the strategy engine.

use serde::{Deserialize, Serialize};

/// Trade direction. Kept distinct from order side: a short position is
/// still opened with a sell order, but the domain reasons in terms of
/// position direction, not order verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// One OHLCV bar. Timestamps are exchange-native milliseconds.
///
/// A candle sequence's last element is the *forming* bar; strategies must
/// only read index `len - 2`, the last confirmed bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: f64,
}

impl Candle {
    pub fn is_bearish(&self) -> bool {
        self.c < self.o
    }

    pub fn body_size(&self) -> f64 {
        (self.c - self.o).abs()
    }

    pub fn range(&self) -> f64 {
        self.h - self.l
    }
}

/// The index of the last *confirmed* bar in a candle sequence, or `None`
/// if there aren't at least two bars.
pub fn confirmed_index(candles: &[Candle]) -> Option<usize> {
    candles.len().checked_sub(2)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceLevel {
    pub px: f64,
    pub sz: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.first().map(|l| l.px)
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.first().map(|l| l.px)
    }

    pub fn mid(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            _ => None,
        }
    }

    /// Spread in basis points relative to mid. `None` if either side of
    /// the book is empty.
    pub fn spread_bps(&self) -> Option<f64> {
        let (bid, ask) = (self.best_bid()?, self.best_ask()?);
        let mid = (bid + ask) / 2.0;
        if mid <= 0.0 {
            return None;
        }
        Some((ask - bid) / mid * 10_000.0)
    }

    /// Sum of top-N bid/ask size, used for the imbalance check.
    pub fn top_n_imbalance(&self, n: usize) -> Option<f64> {
        let bid_sz: f64 = self.bids.iter().take(n).map(|l| l.sz).sum();
        let ask_sz: f64 = self.asks.iter().take(n).map(|l| l.sz).sum();
        if ask_sz <= 0.0 {
            return None;
        }
        Some(bid_sz / ask_sz)
    }
}

/// One symbol's full market picture for a cycle. Optional fields fall
/// back field-by-field to the previous snapshot when a fetch fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub mid_price: Option<f64>,
    pub candles_5m: Vec<Candle>,
    pub candles_15m: Vec<Candle>,
    pub candles_1h: Vec<Candle>,
    pub candles_4h: Vec<Candle>,
    pub orderbook: OrderBook,
    pub funding_rate: Option<f64>,
}

impl SymbolSnapshot {
    /// Merge freshly-fetched fields over this snapshot, keeping the old
    /// value for any field that is `None`/empty in `fresh`. This is the
    /// per-field fallback the collector requires.
    pub fn merge_fallback(&self, fresh: SymbolSnapshotUpdate) -> SymbolSnapshot {
        SymbolSnapshot {
            symbol: self.symbol.clone(),
            mid_price: fresh.mid_price.or(self.mid_price),
            candles_5m: fresh.candles_5m.unwrap_or_else(|| self.candles_5m.clone()),
            candles_15m: fresh
                .candles_15m
                .unwrap_or_else(|| self.candles_15m.clone()),
            candles_1h: fresh.candles_1h.unwrap_or_else(|| self.candles_1h.clone()),
            candles_4h: fresh.candles_4h.unwrap_or_else(|| self.candles_4h.clone()),
            orderbook: fresh.orderbook.unwrap_or_else(|| self.orderbook.clone()),
            funding_rate: fresh.funding_rate.or(self.funding_rate),
        }
    }
}

/// A single field-fetch round from the exchange adapter, each field
/// independently `None` on failure so the caller can fall back.
#[derive(Debug, Clone, Default)]
pub struct SymbolSnapshotUpdate {
    pub mid_price: Option<f64>,
    pub candles_5m: Option<Vec<Candle>>,
    pub candles_15m: Option<Vec<Candle>>,
    pub candles_1h: Option<Vec<Candle>>,
    pub candles_4h: Option<Vec<Candle>>,
    pub orderbook: Option<OrderBook>,
    pub funding_rate: Option<f64>,
}
