//! Decimal helpers shared by the aggregators and the GPA roll-up.

use rust_decimal::{Decimal, RoundingStrategy};

/// Every aggregate is expressed on a 4.0-equivalent scale.
pub const POINT_SCALE: Decimal = Decimal::from_parts(4, 0, 0, false, 0);

/// Precision of persisted aggregate values.
pub const STORED_VALUE_PLACES: u32 = 8;

/// Round half away from zero and pad to exactly `places` decimal places.
pub fn round_half_up(value: Decimal, places: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(places);
    rounded
}

/// Normalize a computed value before it is cached.
///
/// Recomputing over an identical mark set yields the same value bit for bit.
pub fn normalize_stored(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(STORED_VALUE_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Running numerator/denominator pair.
///
/// Arithmetic is checked: once a contribution overflows the decimal range
/// the sum is poisoned and [`ratio`](WeightedSum::ratio) yields `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeightedSum {
    pub numerator: Decimal,
    pub denominator: Decimal,
    overflowed: bool,
}

impl WeightedSum {
    /// Add `weight * value` to the numerator and `weight` to the denominator.
    pub fn add(&mut self, value: Decimal, weight: Decimal) {
        self.accumulate(weight.checked_mul(value), weight);
    }

    /// Add raw contributions to both sides.
    pub fn add_raw(&mut self, numerator: Decimal, denominator: Decimal) {
        self.accumulate(Some(numerator), denominator);
    }

    fn accumulate(&mut self, numerator: Option<Decimal>, denominator: Decimal) {
        let numerator = numerator.and_then(|n| self.numerator.checked_add(n));
        match numerator.zip(self.denominator.checked_add(denominator)) {
            Some((numerator, denominator)) => {
                self.numerator = numerator;
                self.denominator = denominator;
            }
            None => self.overflowed = true,
        }
    }

    /// Whether a contribution fell outside the decimal range.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// `numerator / denominator`, or `None` when nothing contributed or the
    /// sum overflowed.
    pub fn ratio(&self) -> Option<Decimal> {
        if self.overflowed || self.denominator.is_zero() {
            None
        } else {
            self.numerator.checked_div(self.denominator)
        }
    }
}
