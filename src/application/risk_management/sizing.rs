//! Order sizing (spec.md 4.6.3), grounded on
//! `original_source/src/executor/trade_executor.py`'s `_calculate_size`
//! / `_apply_size_caps`: one base allocation from equity, leverage and
//! an optional regime multiplier, then four sequential caps. Any cap
//! that would leave the order below `min_order_size_usd` kills it
//! outright rather than rounding up.

use rust_decimal::Decimal;

use crate::config::RiskConfig;
use crate::domain::position::Position;
use crate::domain::signal::Signal;
use crate::domain::size_regime::SizeRegime;

/// `None` means "do not place this order" — every cap collapsed the
/// size to zero, or the caller lacked the inputs (entry price, leverage)
/// to size at all.
pub fn calculate_size(
    signal: &Signal,
    risk: &RiskConfig,
    regime: &SizeRegime,
    equity: Decimal,
    positions: &[Position],
) -> Option<Decimal> {
    let entry = signal.entry_price?;
    let leverage = signal.leverage?;
    if entry <= 0.0 || equity <= Decimal::ZERO || leverage == 0 {
        return None;
    }
    let entry = Decimal::try_from(entry).ok()?;

    let max_single_pct = Decimal::try_from(risk.max_single_pct / 100.0).ok()?;
    let regime_mult = Decimal::try_from(regime.multiplier).ok()?;
    let margin = equity * max_single_pct * regime_mult;
    let mut size = (margin * Decimal::from(leverage)) / entry;

    // 1. Per-symbol hard cap, in coin units.
    if let Some(cap) = risk.max_size_by_symbol.get(&signal.symbol) {
        size = size.min(*cap);
    }

    // 2. Per-trade notional cap (USD). Zero disables it.
    if risk.max_notional_usd_per_trade > Decimal::ZERO {
        size = size.min(risk.max_notional_usd_per_trade / entry);
    }

    // 3. Equity-percent notional cap. Zero disables it.
    if risk.max_notional_pct_of_equity > 0.0 {
        let pct = Decimal::try_from(risk.max_notional_pct_of_equity / 100.0).ok()?;
        size = size.min((equity * pct) / entry);
    }

    // 4. Available exposure budget: existing notional plus this order
    // cannot exceed `max_total_exposure_pct` of equity.
    let max_total_pct = Decimal::try_from(risk.max_total_exposure_pct / 100.0).ok()?;
    let max_total_notional = equity * max_total_pct;
    let current_exposure = current_notional_exposure(positions);
    let remaining = max_total_notional - current_exposure;
    let min_order = Decimal::try_from(risk.min_order_size_usd).ok()?;
    if remaining < min_order {
        return None;
    }
    if size * entry > remaining {
        size = remaining / entry;
    }

    if size <= Decimal::ZERO || size * entry < min_order {
        return None;
    }
    Some(size)
}

fn current_notional_exposure(positions: &[Position]) -> Decimal {
    positions.iter().map(|p| p.size.abs() * p.mid_price).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::Action;
    use crate::domain::types::Side;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn risk() -> RiskConfig {
        RiskConfig {
            max_concurrent: 4,
            max_leverage: 10,
            max_single_pct: 10.0,
            max_total_exposure_pct: 30.0,
            daily_loss_limit_pct: 8.0,
            max_drawdown_pct: 12.0,
            min_order_size_usd: 10.0,
            equity_sanity_floor_pct: 10.0,
            max_size_by_symbol: HashMap::new(),
            max_notional_usd_per_trade: Decimal::ZERO,
            max_notional_pct_of_equity: 0.0,
        }
    }

    fn long_signal(entry: f64, leverage: u32) -> Signal {
        Signal::new("BTC", Action::Long, "test")
            .with_levels(entry, entry * 0.99, entry * 1.01)
            .with_leverage(leverage)
    }

    #[test]
    fn base_allocation_uses_equity_pct_and_leverage() {
        let signal = long_signal(100.0, 5);
        let regime = SizeRegime::default();
        let size = calculate_size(&signal, &risk(), &regime, dec!(10000), &[]).unwrap();
        // margin = 10000 * 0.10 * 1.0 = 1000; notional = 1000*5=5000; size=50
        assert_eq!(size, dec!(50));
    }

    #[test]
    fn regime_multiplier_scales_size_down() {
        let signal = long_signal(100.0, 5);
        let regime = SizeRegime {
            multiplier: 0.5,
            reason: "high volatility".to_string(),
        };
        let size = calculate_size(&signal, &risk(), &regime, dec!(10000), &[]).unwrap();
        assert_eq!(size, dec!(25));
    }

    #[test]
    fn per_symbol_hard_cap_applies() {
        let signal = long_signal(100.0, 5);
        let mut r = risk();
        r.max_size_by_symbol.insert("BTC".to_string(), dec!(10));
        let regime = SizeRegime::default();
        let size = calculate_size(&signal, &r, &regime, dec!(10000), &[]).unwrap();
        assert_eq!(size, dec!(10));
    }

    #[test]
    fn exposure_budget_caps_and_rejects_when_exhausted() {
        let signal = long_signal(100.0, 5);
        let regime = SizeRegime::default();
        let existing = Position {
            symbol: "ETH".to_string(),
            side: Side::Long,
            size: dec!(25),
            entry_price: dec!(100),
            leverage: 1,
            opened_at: None,
            unrealized_pnl: dec!(0),
            mid_price: dec!(100),
        };
        // existing exposure = 2500; max_total_notional = 30% of 10000 = 3000; remaining = 500
        let size = calculate_size(&signal, &risk(), &regime, dec!(10000), std::slice::from_ref(&existing)).unwrap();
        assert_eq!(size, dec!(5)); // 500/100

        let exhausted = Position {
            size: dec!(29),
            ..existing
        };
        assert!(calculate_size(&signal, &risk(), &regime, dec!(10000), std::slice::from_ref(&exhausted)).is_none());
    }

    #[test]
    fn below_min_order_size_returns_none() {
        let signal = long_signal(100.0, 1);
        let mut r = risk();
        r.max_single_pct = 0.01;
        let regime = SizeRegime::default();
        assert!(calculate_size(&signal, &r, &regime, dec!(10000), &[]).is_none());
    }

    #[test]
    fn missing_entry_price_or_leverage_returns_none() {
        let signal = Signal::new("BTC", Action::Long, "no levels");
        let regime = SizeRegime::default();
        assert!(calculate_size(&signal, &risk(), &regime, dec!(10000), &[]).is_none());
    }
}
