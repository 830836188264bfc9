//! Exponential-backoff retry wrapper and safe-hold escalation, grounded
//! on `retry_with_backoff`/`enter_safe_hold` from the original agent's
//! retry utility (spec.md 5, 7, 9).
//!
//! Every exchange call and file I/O operation on the cycle's critical
//! path runs through [`retry_with_backoff`]. Exhaustion never flips the
//! kill-switch directly — it escalates to [`enter_safe_hold`], which
//! overwrites the signal batch with a hold and sets the kill-switch's
//! non-fatal warning flag.

use std::fmt;
use std::future::Future;

use tracing::{error, info, warn};

use crate::config::RetryConfig;
use crate::domain::errors::RetryExhausted;
use crate::domain::kill_switch::KillSwitch;
use crate::domain::ports::Clock;
use crate::domain::signal::SignalBatch;
use crate::infrastructure::persistence::state_store::StateStore;

/// Runs `op` with exponential backoff: delay doubles (by
/// `backoff_factor`) after every failed attempt, starting at
/// `base_delay_ms` and capped at `max_delay_ms`, up to `max_retries`
/// retries beyond the initial attempt. Returns [`RetryExhausted`] if the
/// final attempt still fails.
pub async fn retry_with_backoff<T, E, F, Fut>(
    operation: &str,
    config: &RetryConfig,
    mut op: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut delay_ms = config.base_delay_ms;
    let mut last_error = String::new();

    for attempt in 0..=config.max_retries {
        match op().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                last_error = e.to_string();
                let remaining = config.max_retries - attempt;
                if remaining == 0 {
                    error!(operation, attempts = attempt + 1, error = %last_error, "all retries exhausted");
                    return Err(RetryExhausted {
                        operation: operation.to_string(),
                        attempts: attempt + 1,
                        last_error,
                    });
                }
                let actual_delay = delay_ms.min(config.max_delay_ms);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    remaining,
                    delay_ms = actual_delay,
                    error = %last_error,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(std::time::Duration::from_millis(actual_delay)).await;
                delay_ms = ((delay_ms as f64) * config.backoff_factor) as u64;
            }
        }
    }

    Err(RetryExhausted {
        operation: operation.to_string(),
        attempts: config.max_retries + 1,
        last_error,
    })
}

/// Final recovery step after a `RetryExhausted`: force the signal batch
/// to hold and set the kill-switch warning flag (never `enabled`
/// itself — that stays reserved for the supervisor's risk-breach
/// triggers, spec.md 4.8).
pub fn enter_safe_hold(state: &StateStore, clock: &dyn Clock, reason: &str) {
    error!(reason, "entering safe-hold");

    if let Err(e) = state.save_signal_batch(&SignalBatch::safe_hold(reason)) {
        error!(error = %e, "safe-hold: failed to overwrite signal batch");
    }

    let mut ks = state.load_kill_switch().unwrap_or_else(|_| KillSwitch::failsafe_default());
    ks.set_warning(format!("safe_hold: {reason}"), clock.now_ms());
    if let Err(e) = state.save_kill_switch(&ks) {
        error!(error = %e, "safe-hold: failed to persist kill-switch warning");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn cfg() -> RetryConfig {
        RetryConfig {
            base_delay_ms: 1,
            backoff_factor: 2.0,
            max_delay_ms: 10,
            max_retries: 3,
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let result: Result<i32, RetryExhausted> =
            retry_with_backoff("noop", &cfg(), || async { Ok::<i32, String>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = Cell::new(0);
        let result = retry_with_backoff("flaky", &cfg(), || {
            let n = attempts.get();
            attempts.set(n + 1);
            async move {
                if n < 2 {
                    Err::<i32, String>("transient".to_string())
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.get(), 3);
    }

    #[tokio::test]
    async fn raises_retry_exhausted_after_max_retries() {
        let attempts = Cell::new(0);
        let result: Result<i32, RetryExhausted> = retry_with_backoff("always_fails", &cfg(), || {
            attempts.set(attempts.get() + 1);
            async { Err::<i32, String>("down".to_string()) }
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 4); // initial + 3 retries
        assert_eq!(attempts.get(), 4);
        assert!(err.last_error.contains("down"));
    }
}
