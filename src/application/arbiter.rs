//! Signal arbiter (spec.md 4.5): runs every strategy's exit scan ahead
//! of its entry scan, picks the one authoritative signal per symbol,
//! and folds the per-symbol picks into the cycle's `SignalBatch`.

use std::collections::HashMap;

use tracing::warn;

use crate::config::{ArbiterConfig, StrategyZones};
use crate::domain::errors::AtomicStoreError;
use crate::domain::failure::FallbackTracker;
use crate::domain::ports::Clock;
use crate::domain::position::Position;
use crate::domain::signal::{Action, Ooda, Signal, SignalBatch};
use crate::domain::types::SymbolSnapshot;
use crate::infrastructure::persistence::state_store::StateStore;

use super::strategies::{PositionInfo, StrategyContext, StrategyFactory};

pub struct SignalArbiter;

impl SignalArbiter {
    /// Run the full engine for `symbols` and return the batch to
    /// persist to `signals/signals.json`.
    pub fn run(
        symbols: &[String],
        snapshots: &HashMap<String, SymbolSnapshot>,
        positions: &[Position],
        state: &StateStore,
        zones: &StrategyZones,
        arbiter_config: &ArbiterConfig,
        clock: &dyn Clock,
        fallback_tracker: &mut FallbackTracker,
    ) -> Result<SignalBatch, AtomicStoreError> {
        let now_ms = clock.now_ms();
        let live_by_symbol: HashMap<&str, &Position> =
            positions.iter().map(|p| (p.symbol.as_str(), p)).collect();

        let mut signals = Vec::with_capacity(symbols.len());
        let mut any_actionable = false;

        for symbol in symbols {
            let Some(snapshot) = snapshots.get(symbol) else {
                continue;
            };
            let strategies = StrategyFactory::for_symbol(symbol);
            if strategies.is_empty() {
                continue;
            }
            let has_live_position = live_by_symbol.contains_key(symbol.as_str());

            let mut authoritative: Option<Signal> = None;
            let mut entry_candidate: Option<Signal> = None;

            for strategy in &strategies {
                let family = strategy.family();
                let exit_meta = state.load_exit_meta(symbol, family)?;
                let pending_reversion = if family == "wave_rider" {
                    state.load_pending_reversion(symbol)?
                } else {
                    None
                };
                let position = PositionInfo {
                    exit_meta: exit_meta.clone(),
                    has_live_position,
                    pending_reversion,
                };
                let ctx = StrategyContext {
                    snapshot,
                    position: &position,
                    zones,
                    now_ms,
                };

                if let Some(signal) = strategy.exit_scan(&ctx) {
                    Self::apply_exit_bookkeeping(state, symbol, family, &exit_meta, &signal)?;
                    let signal = signal.with_family(family);
                    if Self::prefer(&signal, authoritative.as_ref()) {
                        authoritative = Some(signal);
                    }
                    continue;
                }

                if has_live_position {
                    // This family isn't managing the live position
                    // (its own exit scan found no meta and returned
                    // `None` only because `has_live_position` is
                    // false from its point of view -- unreachable in
                    // practice since `exit_scan_generic` always
                    // rescues; kept as a defensive no-op).
                    continue;
                }

                let prior_cache = state.load_threshold_cache(symbol, family)?;
                let output = strategy.entry_scan(&ctx, prior_cache);
                if let Some(cache) = output.next_cache {
                    state.save_threshold_cache(symbol, family, &cache)?;
                }
                if let Some(signal) = output.signal {
                    if entry_candidate.is_some() {
                        warn!(symbol = symbol.as_str(), family, "multiple strategy families fired an entry signal this cycle; keeping the first");
                    } else {
                        entry_candidate = Some(signal.with_family(family));
                    }
                }
            }

            let chosen = match authoritative {
                Some(signal) => {
                    any_actionable |= signal.action == Action::Close;
                    Some(Self::apply_min_hold(signal, symbol, &live_by_symbol, now_ms, arbiter_config))
                }
                None => match entry_candidate {
                    Some(signal) => {
                        any_actionable = true;
                        Some(Self::apply_caps(signal, arbiter_config))
                    }
                    None if has_live_position => {
                        warn!(symbol = symbol.as_str(), "live position with no strategy signal this cycle; holding position defensively");
                        Some(Signal::hold_position(symbol.clone(), "live position, no strategy output this cycle"))
                    }
                    None => None,
                },
            };

            if let Some(signal) = chosen {
                if signal.action == Action::Hold {
                    fallback_tracker.record_fallback("no_volume_spike", now_ms);
                } else if signal.action != Action::HoldPosition {
                    fallback_tracker.record_spike();
                }
                signals.push(signal);
            } else {
                fallback_tracker.record_fallback("no_volume_spike", now_ms);
                signals.push(Signal::hold(symbol.clone(), "no spike this cycle"));
            }
        }

        let ooda = Ooda {
            observe: format!("{} symbols scanned", symbols.len()),
            orient: if any_actionable {
                "at least one actionable signal this cycle".to_string()
            } else {
                "no actionable signals this cycle".to_string()
            },
            decide: if any_actionable { "trade" } else { "hold" }.to_string(),
        };
        Ok(SignalBatch::from_signals(signals, ooda, "cycle arbitration complete"))
    }

    /// Exit-authoritative signal ordering: an explicit `close` beats a
    /// `hold_position` placeholder from a different family on the same
    /// symbol (only one family ever actually owns the live position's
    /// ExitMeta, so this only matters when another family's rescue
    /// logic also fires defensively).
    fn prefer(candidate: &Signal, current: Option<&Signal>) -> bool {
        match current {
            None => true,
            Some(existing) => candidate.action == Action::Close && existing.action != Action::Close,
        }
    }

    /// Persist the bookkeeping an exit scan implies: increment
    /// `bar_count` while a position is still held, and carry forward
    /// any adaptive stop-loss the strategy computed in-memory (e.g.
    /// WaveRider's trailing stop).
    fn apply_exit_bookkeeping(
        state: &StateStore,
        symbol: &str,
        family: &str,
        exit_meta: &Option<crate::domain::position::ExitMeta>,
        signal: &Signal,
    ) -> Result<(), AtomicStoreError> {
        if signal.action != Action::HoldPosition {
            return Ok(());
        }
        let Some(meta) = exit_meta else {
            return Ok(());
        };
        let mut updated = meta.clone();
        updated.bar_count += 1;
        if let Some(trailed) = signal.stop_loss {
            updated.stop_loss = trailed;
        }
        state.save_exit_meta(symbol, family, &updated)
    }

    /// Scenario 3: a `close` on a position opened less than
    /// `min_hold_minutes` ago is downgraded to `hold` unless confidence
    /// clears the override threshold.
    fn apply_min_hold(
        signal: Signal,
        symbol: &str,
        live_by_symbol: &HashMap<&str, &Position>,
        now_ms: i64,
        config: &ArbiterConfig,
    ) -> Signal {
        if signal.action != Action::Close {
            return signal;
        }
        let Some(position) = live_by_symbol.get(symbol) else {
            return signal;
        };
        let Some(opened_at) = position.opened_at else {
            return signal;
        };
        let held_minutes = (now_ms - opened_at) as f64 / 60_000.0;
        if held_minutes >= config.min_hold_minutes || signal.confidence >= config.min_hold_override_confidence {
            return signal;
        }
        Signal::hold(
            symbol,
            format!(
                "min hold: position held {held_minutes:.1}m < {}m and confidence {:.2} < {:.2}",
                config.min_hold_minutes, signal.confidence, config.min_hold_override_confidence
            ),
        )
    }

    /// CAPS: derive leverage from confidence when the strategy left it
    /// unset.
    fn apply_caps(mut signal: Signal, config: &ArbiterConfig) -> Signal {
        if signal.leverage.is_none() {
            let leverage = super::strategies::base::confidence_to_leverage(signal.confidence, config.caps_base_leverage);
            signal.leverage = Some(leverage);
        }
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyZones;
    use crate::domain::ports::{Paths, SystemClock};
    use crate::domain::types::{Candle, Side};
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    fn btc_penetration_candles() -> Vec<Candle> {
        // 288 flat bars establish the vol_ratio/H4 trailing windows.
        let mut candles: Vec<Candle> = (0..300)
            .map(|i| Candle {
                t: i * 300_000,
                o: 100.0,
                h: 105.0,
                l: 95.0,
                c: 100.0,
                v: 10.0,
            })
            .collect();
        let last_confirmed = candles.len() - 2;
        candles[last_confirmed].o = 100.0;
        candles[last_confirmed].c = 94.0;
        candles[last_confirmed].h = 100.0;
        candles[last_confirmed].l = 90.0;
        candles[last_confirmed].v = 100.0;
        candles
    }

    #[test]
    fn no_position_spike_produces_long_entry_with_caps_leverage() {
        let dir = tempdir().unwrap();
        let state = StateStore::new(Paths::new(dir.path()));
        let mut snapshots = HashMap::new();
        snapshots.insert(
            "BTC".to_string(),
            SymbolSnapshot {
                symbol: "BTC".to_string(),
                candles_5m: btc_penetration_candles(),
                mid_price: Some(96.0),
                ..Default::default()
            },
        );
        let symbols = vec!["BTC".to_string()];
        let zones = StrategyZones::default();
        let arbiter_config = ArbiterConfig::default();
        let clock = SystemClock;
        let mut tracker = FallbackTracker::default();

        let batch = SignalArbiter::run(&symbols, &snapshots, &[], &state, &zones, &arbiter_config, &clock, &mut tracker).unwrap();

        let signal = batch.signals.iter().find(|s| s.symbol == "BTC").unwrap();
        assert_eq!(signal.action, Action::Long);
        assert!(signal.leverage.is_some());
    }

    #[test]
    fn min_hold_downgrades_low_confidence_close() {
        let dir = tempdir().unwrap();
        let state = StateStore::new(Paths::new(dir.path()));
        let meta = crate::domain::position::ExitMeta {
            pattern: "wall".to_string(),
            direction: Side::Long,
            entry_price: 100.0,
            stop_loss: 200.0, // force hit_sl_tp for Long: mid >= take_profit
            take_profit: 1.0,
            exit_mode: crate::domain::position::ExitMode::TpSl,
            exit_bars: 0,
            bar_count: 0,
            entry_time: 0,
            vol_ratio: None,
        };
        state.save_exit_meta("BTC", "btc_wall", &meta).unwrap();

        let mut snapshots = HashMap::new();
        snapshots.insert(
            "BTC".to_string(),
            SymbolSnapshot {
                symbol: "BTC".to_string(),
                mid_price: Some(150.0),
                ..Default::default()
            },
        );
        let position = Position {
            symbol: "BTC".to_string(),
            side: Side::Long,
            size: Decimal::ONE,
            entry_price: Decimal::from(100),
            leverage: 3,
            opened_at: Some(0),
            unrealized_pnl: Decimal::ZERO,
            mid_price: Decimal::from(150),
        };
        let symbols = vec!["BTC".to_string()];
        let zones = StrategyZones::default();
        let arbiter_config = ArbiterConfig::default();
        let mut tracker = FallbackTracker::default();

        // now_ms = 4 minutes after opened_at=0.
        struct FixedClock(i64);
        impl Clock for FixedClock {
            fn now_ms(&self) -> i64 {
                self.0
            }
            fn today(&self) -> chrono::NaiveDate {
                chrono::Utc::now().date_naive()
            }
        }
        let fixed = FixedClock(4 * 60_000);

        let batch = SignalArbiter::run(&symbols, &snapshots, &[position], &state, &zones, &arbiter_config, &fixed, &mut tracker).unwrap();

        let signal = batch.signals.iter().find(|s| s.symbol == "BTC").unwrap();
        assert_eq!(signal.action, Action::Hold);
        assert!(signal.reasoning.contains("min hold"));
    }
}
