//! Market collector: per-symbol snapshot fan-out with per-field
//! fallback, live data-quality scoring, and snapshot archival for
//! backtesting (spec.md 4, 5).

pub mod collector;
pub mod health;

pub use collector::MarketCollector;
