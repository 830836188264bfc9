//! Strategy engine: shared analytics, the spike-scan skeleton, and the
//! per-symbol strategies built on top of it (spec.md 4.4).

pub mod base;
pub mod btc_wall;
pub mod eth_band;
pub mod sol_wall;
pub mod spike;
pub mod strategy_factory;
pub mod traits;
pub mod wave_rider;

pub use strategy_factory::StrategyFactory;
pub use traits::{PositionInfo, ScanOutput, StrategyContext, TradingStrategy};
