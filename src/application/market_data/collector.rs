//! Per-cycle snapshot fan-out (spec.md 4 "Market collector", 5).
//!
//! Each field is fetched independently through [`retry_with_backoff`];
//! a field whose retries are exhausted degrades to the prior snapshot's
//! value rather than escalating to safe-hold (spec.md 6's
//! "fall back to prior snapshot on per-field failure" is the collector's
//! own recovery path, distinct from the cycle-level safe-hold an
//! unrecoverable exchange/state failure elsewhere triggers).

use std::collections::HashMap;

use tracing::warn;

use crate::config::RetryConfig;
use crate::domain::ports::ExchangeAdapter;
use crate::domain::types::{SymbolSnapshot, SymbolSnapshotUpdate};

use super::super::retry::retry_with_backoff;

const CANDLE_COUNTS: [(&str, usize); 4] = [("5m", 200), ("15m", 100), ("1h", 48), ("4h", 30)];
const ORDERBOOK_DEPTH: usize = 20;

pub struct MarketCollector;

impl MarketCollector {
    /// Fetch a fresh snapshot for every `symbol`, merging any field that
    /// failed after retries against `prior`. Returns one snapshot per
    /// symbol, in the same order as `symbols`.
    pub async fn collect(
        symbols: &[String],
        adapter: &dyn ExchangeAdapter,
        retry_config: &RetryConfig,
        prior: &HashMap<String, SymbolSnapshot>,
    ) -> HashMap<String, SymbolSnapshot> {
        let mids = match retry_with_backoff("mid_prices", retry_config, || adapter.mid_prices(symbols)).await {
            Ok(mids) => mids,
            Err(e) => {
                warn!(error = %e, "mid_prices exhausted retries, falling back per-symbol to prior snapshot");
                HashMap::new()
            }
        };

        let mut out = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            let fresh = Self::collect_symbol(symbol, adapter, retry_config, mids.get(symbol).copied()).await;
            let base = prior
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| SymbolSnapshot {
                    symbol: symbol.clone(),
                    ..Default::default()
                });
            out.insert(symbol.clone(), base.merge_fallback(fresh));
        }
        out
    }

    async fn collect_symbol(
        symbol: &str,
        adapter: &dyn ExchangeAdapter,
        retry_config: &RetryConfig,
        mid_price: Option<f64>,
    ) -> SymbolSnapshotUpdate {
        let candles_5m = Self::fetch_candles(symbol, "5m", adapter, retry_config).await;
        let candles_15m = Self::fetch_candles(symbol, "15m", adapter, retry_config).await;
        let candles_1h = Self::fetch_candles(symbol, "1h", adapter, retry_config).await;
        let candles_4h = Self::fetch_candles(symbol, "4h", adapter, retry_config).await;

        let orderbook = retry_with_backoff("orderbook", retry_config, || {
            adapter.orderbook(symbol, ORDERBOOK_DEPTH)
        })
        .await
        .map_err(|e| warn!(symbol, error = %e, "orderbook exhausted retries, using prior snapshot"))
        .ok();

        let funding_rate = retry_with_backoff("funding_rate", retry_config, || adapter.funding_rate(symbol))
            .await
            .map_err(|e| warn!(symbol, error = %e, "funding_rate exhausted retries, using prior snapshot"))
            .ok()
            .flatten();

        SymbolSnapshotUpdate {
            mid_price,
            candles_5m,
            candles_15m,
            candles_1h,
            candles_4h,
            orderbook,
            funding_rate,
        }
    }

    async fn fetch_candles(
        symbol: &str,
        interval: &str,
        adapter: &dyn ExchangeAdapter,
        retry_config: &RetryConfig,
    ) -> Option<Vec<crate::domain::types::Candle>> {
        let count = CANDLE_COUNTS
            .iter()
            .find(|(i, _)| *i == interval)
            .map(|(_, c)| *c)
            .unwrap_or(100);

        retry_with_backoff(&format!("candles:{interval}"), retry_config, || {
            adapter.candles(symbol, interval, count)
        })
        .await
        .map_err(|e| warn!(symbol, interval, error = %e, "candles exhausted retries, using prior snapshot"))
        .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::domain::types::Candle;
    use crate::infrastructure::exchange::mock::MockExchange;

    fn candle(t: i64) -> Candle {
        Candle {
            t,
            o: 100.0,
            h: 101.0,
            l: 99.0,
            c: 100.5,
            v: 10.0,
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            base_delay_ms: 1,
            backoff_factor: 1.0,
            max_delay_ms: 1,
            max_retries: 1,
        }
    }

    #[tokio::test]
    async fn collects_full_snapshot_for_configured_symbols() {
        let exchange = MockExchange::new();
        exchange.set_mid_price("BTC", 50_000.0).await;
        exchange.set_candles("BTC", "5m", vec![candle(0), candle(300_000)]).await;
        exchange.set_funding_rate("BTC", 0.0001).await;

        let symbols = vec!["BTC".to_string()];
        let result = MarketCollector::collect(&symbols, &exchange, &fast_retry(), &HashMap::new()).await;

        let snapshot = result.get("BTC").unwrap();
        assert_eq!(snapshot.mid_price, Some(50_000.0));
        assert_eq!(snapshot.candles_5m.len(), 2);
        assert_eq!(snapshot.funding_rate, Some(0.0001));
    }

    #[tokio::test]
    async fn missing_field_falls_back_to_prior_snapshot() {
        let exchange = MockExchange::new();
        // No mid price set this round; prior snapshot carries one.
        exchange.set_candles("BTC", "5m", vec![candle(0)]).await;

        let mut prior = HashMap::new();
        prior.insert(
            "BTC".to_string(),
            SymbolSnapshot {
                symbol: "BTC".to_string(),
                mid_price: Some(49_000.0),
                ..Default::default()
            },
        );

        let symbols = vec!["BTC".to_string()];
        let result = MarketCollector::collect(&symbols, &exchange, &fast_retry(), &prior).await;

        assert_eq!(result.get("BTC").unwrap().mid_price, Some(49_000.0));
    }
}
