//! Per-symbol strategy registry. Grounded on the teacher's
//! `StrategyFactory::create` match-dispatch shape, adapted from
//! per-mode dispatch to per-symbol: each configured symbol maps to the
//! one or two strategy families that own it (spec.md 4.4.2).

use super::btc_wall::BtcWallStrategy;
use super::eth_band::EthBandStrategy;
use super::sol_wall::SolWallStrategy;
use super::traits::TradingStrategy;
use super::wave_rider::WaveRiderStrategy;
use std::sync::Arc;

pub struct StrategyFactory;

impl StrategyFactory {
    /// All strategy families that scan `symbol` this cycle, in the
    /// order their exit/entry scans should run. Symbols with no
    /// configured strategy return an empty vec (they are still
    /// collected and position-synced, just never traded).
    pub fn for_symbol(symbol: &str) -> Vec<Arc<dyn TradingStrategy>> {
        match symbol {
            "BTC" => vec![Arc::new(BtcWallStrategy), Arc::new(WaveRiderStrategy::btc())],
            "ETH" => vec![Arc::new(EthBandStrategy)],
            "SOL" => vec![Arc::new(SolWallStrategy)],
            "HYPE" => vec![Arc::new(WaveRiderStrategy::hype())],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn btc_gets_wall_and_wave_rider() {
        let families: Vec<&'static str> = StrategyFactory::for_symbol("BTC")
            .iter()
            .map(|s| s.family())
            .collect();
        assert_eq!(families, vec!["btc_wall", "wave_rider"]);
    }

    #[test]
    fn unconfigured_symbol_gets_no_strategies() {
        assert!(StrategyFactory::for_symbol("DOGE").is_empty());
    }
}
