use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from the atomic JSON store.
///
/// Callers must tell `Missing` (file absent — optional hints may default
/// silently; core state files cannot) apart from `Corrupt` (the file
/// exists but doesn't parse — always a hard error).
#[derive(Debug, Error)]
pub enum AtomicStoreError {
    #[error("{path}: not found")]
    Missing { path: String },

    #[error("{path}: corrupt ({reason})")]
    Corrupt { path: String, reason: String },

    #[error("{path}: io error: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: failed to acquire {kind} lock")]
    Lock { path: String, kind: &'static str },
}

/// Errors surfaced by the exchange adapter boundary.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },

    #[error("invalid response for {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

/// Risk violations surfaced as hard errors (distinct from the ordinary
/// per-signal `ValidationResult::Reject` the gate returns).
#[derive(Debug, Error)]
pub enum RiskViolation {
    #[error("Position size limit exceeded for {symbol}: {current_pct:.2}% > {max_pct:.2}%")]
    PositionSizeLimit {
        symbol: String,
        current_pct: f64,
        max_pct: f64,
    },

    #[error("Daily loss limit breached: {loss_pct:.2}% > {limit_pct:.2}%")]
    DailyLossLimit { loss_pct: f64, limit_pct: f64 },

    #[error("Maximum drawdown exceeded: {drawdown_pct:.2}% > {max_pct:.2}%")]
    MaxDrawdown { drawdown_pct: f64, max_pct: f64 },
}

/// Errors related to position/equity bookkeeping.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(
        "daily pnl inconsistent: equity {equity} != start {start} + realized {realized} + unrealized {unrealized}"
    )]
    PnlMismatch {
        equity: Decimal,
        start: Decimal,
        realized: Decimal,
        unrealized: Decimal,
    },

    #[error("orphaned exit metadata for {symbol}: position open with no owning strategy record")]
    OrphanedExitMeta { symbol: String },
}

/// Exhaustion of the retry-with-backoff helper. Routes to safe-hold; does
/// not flip the kill-switch.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempts: {last_error}")]
pub struct RetryExhausted {
    pub operation: String,
    pub attempts: u32,
    pub last_error: String,
}
