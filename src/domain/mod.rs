//! Core trading domain: pure types, invariants and port traits.
//!
//! Nothing in this module performs I/O. Persistence, exchange transport
//! and scheduling live in `infrastructure` and `application`.

pub mod errors;
pub mod failure;
pub mod kill_switch;
pub mod pnl;
pub mod ports;
pub mod position;
pub mod signal;
pub mod size_regime;
pub mod threshold_cache;
pub mod types;
