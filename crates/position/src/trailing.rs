//! Stealth trailing ratchet.
//!
//! The stop is recalculated internally on every refresh and never rests as
//! a visible order at the brokerage. It can only tighten: the trailing
//! reference tracks the best favorable price seen, and the candidate stop
//! derived from it is applied only when it improves on the current stop.

use rust_decimal::Decimal;
use stealth_trade_core::{Position, PositionStatus, Side, TrailConfig, TrailDistance};

/// Resolves the configured trail distance against a reference price.
#[must_use]
pub fn resolve_distance(distance: TrailDistance, reference: Decimal) -> Decimal {
    match distance {
        TrailDistance::Percent(p) => {
            reference * Decimal::try_from(p).unwrap_or(Decimal::ZERO)
        }
        TrailDistance::Fixed(amount) => amount,
    }
}

/// Advances the trailing reference and tightens the stop when earned.
///
/// Returns the new stop when it tightened. Activation requires the best
/// favorable excursion to exceed the breakeven threshold; before that the
/// static entry-based stop stands untouched.
pub fn update(config: &TrailConfig, position: &mut Position, price: Decimal) -> Option<Decimal> {
    // Track the best favorable price seen since entry.
    match position.side {
        Side::Long => {
            if price > position.trailing_ref {
                position.trailing_ref = price;
            }
        }
        Side::Short => {
            if price < position.trailing_ref {
                position.trailing_ref = price;
            }
        }
    }

    if !activated(config, position) {
        return None;
    }

    if position.status == PositionStatus::Open {
        position.status = PositionStatus::Trailing;
        tracing::debug!(
            symbol = %position.symbol,
            trailing_ref = %position.trailing_ref,
            "trailing protection activated"
        );
    }

    let distance = resolve_distance(config.distance, position.trailing_ref);
    let candidate = match position.side {
        Side::Long => position.trailing_ref - distance,
        Side::Short => position.trailing_ref + distance,
    };

    let tightens = match position.side {
        Side::Long => candidate > position.stop_price,
        Side::Short => candidate < position.stop_price,
    };
    if !tightens {
        return None;
    }

    position.stop_price = candidate;
    Some(candidate)
}

/// True once favorable excursion from entry reached the activation threshold.
fn activated(config: &TrailConfig, position: &Position) -> bool {
    if position.status == PositionStatus::Trailing {
        return true;
    }
    if position.entry_price <= Decimal::ZERO {
        return false;
    }
    let excursion = match position.side {
        Side::Long => (position.trailing_ref - position.entry_price) / position.entry_price,
        Side::Short => (position.entry_price - position.trailing_ref) / position.entry_price,
    };
    let threshold = Decimal::try_from(config.breakeven_activation_pct).unwrap_or(Decimal::MAX);
    excursion >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn long_position(entry: Decimal, stop: Decimal) -> Position {
        Position {
            id: Uuid::new_v4(),
            symbol: "ABC".to_string(),
            side: Side::Long,
            quantity: 10,
            entry_price: entry,
            opened_at: Utc::now(),
            stop_price: stop,
            target_price: entry * dec!(1.04),
            trailing_ref: entry,
            status: PositionStatus::Open,
            exit_reason: None,
            close_attempts: 0,
            next_close_attempt_at: None,
        }
    }

    fn fixed_two_dollar_config() -> TrailConfig {
        TrailConfig {
            stop_loss_pct: 0.02,
            take_profit_pct: 0.10,
            breakeven_activation_pct: 0.005,
            distance: TrailDistance::Fixed(dec!(2)),
        }
    }

    #[test]
    fn below_activation_leaves_static_stop() {
        let cfg = fixed_two_dollar_config();
        let mut pos = long_position(dec!(100), dec!(98));

        // +0.3% is under the +0.5% activation threshold
        assert!(update(&cfg, &mut pos, dec!(100.30)).is_none());
        assert_eq!(pos.stop_price, dec!(98));
        assert_eq!(pos.status, PositionStatus::Open);
    }

    #[test]
    fn ratchet_locks_in_gains_on_pullback() {
        // Long at $100, activation +0.5%, fixed $2 distance.
        let cfg = fixed_two_dollar_config();
        let mut pos = long_position(dec!(100), dec!(98));

        // Price rises to $103: ref = 103, stop = 101.
        let tightened = update(&cfg, &mut pos, dec!(103));
        assert_eq!(tightened, Some(dec!(101)));
        assert_eq!(pos.trailing_ref, dec!(103));
        assert_eq!(pos.status, PositionStatus::Trailing);

        // Pullback to $100.50: stop must not loosen back toward $98.50.
        assert!(update(&cfg, &mut pos, dec!(100.50)).is_none());
        assert_eq!(pos.stop_price, dec!(101));
        assert_eq!(pos.trailing_ref, dec!(103));
    }

    #[test]
    fn short_side_ratchets_downward() {
        let cfg = fixed_two_dollar_config();
        let mut pos = long_position(dec!(100), dec!(102));
        pos.side = Side::Short;

        let tightened = update(&cfg, &mut pos, dec!(97));
        assert_eq!(tightened, Some(dec!(99)));

        // Bounce up: stop stays at 99
        assert!(update(&cfg, &mut pos, dec!(98.50)).is_none());
        assert_eq!(pos.stop_price, dec!(99));
    }

    #[test]
    fn percent_distance_scales_with_reference() {
        let cfg = TrailConfig {
            distance: TrailDistance::Percent(0.01),
            ..fixed_two_dollar_config()
        };
        let mut pos = long_position(dec!(100), dec!(98));

        let tightened = update(&cfg, &mut pos, dec!(110));
        // 110 - 1% of 110 = 108.90
        assert_eq!(tightened, Some(dec!(108.90)));
    }

    #[test]
    fn stop_never_tightens_past_better_level() {
        let cfg = fixed_two_dollar_config();
        let mut pos = long_position(dec!(100), dec!(98));

        update(&cfg, &mut pos, dec!(105));
        assert_eq!(pos.stop_price, dec!(103));

        // A smaller rally produces a worse candidate (101); it is ignored.
        assert!(update(&cfg, &mut pos, dec!(103)).is_none());
        assert_eq!(pos.stop_price, dec!(103));
    }
}
