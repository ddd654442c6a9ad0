//! Overflow and numerical guard.
//!
//! Every coefficient and bound produced while deriving or strengthening a cut
//! passes through [`NumericGuard`]. Arithmetic is carried out in `i128` and
//! the result must land inside the safe range resolved from the target
//! integer width; anything outside it abandons the candidate. Nothing here
//! returns an error: leaving the safe range only bumps a diagnostic counter.

use std::cell::Cell;

use num_integer::Integer;
use num_traits::{CheckedAdd, CheckedMul, Signed, Zero};

use crate::model::LinearConstraint;
use crate::relaxation::RelaxationSnapshot;

/// Numeric safety constants, resolved once from the target integer width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericLimits {
    /// Width in bits of the integer type cuts are handed over in.
    pub integer_width: u32,

    /// Bits of headroom kept between the safe coefficient range and the
    /// largest value of the integer type.
    pub headroom_bits: u32,

    /// Largest value of the target integer type.
    pub type_max: i128,

    /// Largest magnitude allowed for any coefficient or bound.
    pub max_magnitude: i64,

    /// Absolute tolerance a violation must exceed to count.
    pub violation_tolerance: f64,
}

impl NumericLimits {
    /// Default headroom: one bit, giving `2^62 - 1` for 64-bit integers.
    pub const DEFAULT_HEADROOM_BITS: u32 = 1;

    /// Default absolute violation tolerance.
    pub const DEFAULT_VIOLATION_TOLERANCE: f64 = 1e-4;

    /// Limits for `integer_width` bits with default headroom and tolerance.
    pub fn for_width(integer_width: u32) -> Self {
        Self::new(
            integer_width,
            Self::DEFAULT_HEADROOM_BITS,
            Self::DEFAULT_VIOLATION_TOLERANCE,
        )
    }

    /// Create limits. The width is clamped to `8..=64`.
    pub fn new(integer_width: u32, headroom_bits: u32, violation_tolerance: f64) -> Self {
        let width = integer_width.clamp(8, 64);
        let type_max = (1i128 << (width - 1)) - 1;
        // Keep at least one bit of value range.
        let headroom = headroom_bits.min(width - 2);
        let max_magnitude = (type_max >> headroom) as i64;

        Self {
            integer_width: width,
            headroom_bits: headroom,
            type_max,
            max_magnitude,
            violation_tolerance,
        }
    }
}

impl Default for NumericLimits {
    fn default() -> Self {
        Self::for_width(64)
    }
}

/// Round-local arithmetic guard shared by generators and the strengthener.
#[derive(Debug)]
pub struct NumericGuard {
    limits: NumericLimits,

    /// Number of operations that left the safe range.
    overflow_events: Cell<u64>,
}

impl NumericGuard {
    /// Create a guard from resolved limits.
    pub fn new(limits: NumericLimits) -> Self {
        Self {
            limits,
            overflow_events: Cell::new(0),
        }
    }

    /// The limits this guard enforces.
    pub fn limits(&self) -> &NumericLimits {
        &self.limits
    }

    /// Absolute violation tolerance.
    #[inline]
    pub fn tolerance(&self) -> f64 {
        self.limits.violation_tolerance
    }

    /// Largest magnitude allowed for a coefficient or bound.
    #[inline]
    pub fn max_magnitude(&self) -> i64 {
        self.limits.max_magnitude
    }

    /// Returns true if `|value|` is within both `magnitude_bound` and the
    /// safe range. Records an overflow event otherwise.
    pub fn check(&self, value: i128, magnitude_bound: i128) -> bool {
        let bound = magnitude_bound.min(i128::from(self.limits.max_magnitude));
        let within = value.checked_abs().is_some_and(|v| v <= bound);
        if !within {
            self.record_overflow();
        }
        within
    }

    /// Narrow a wide intermediate into the safe range.
    #[inline]
    pub fn fit(&self, value: i128) -> Option<i64> {
        if self.check(value, i128::from(self.limits.max_magnitude)) {
            Some(value as i64)
        } else {
            None
        }
    }

    /// Checked `a + b`.
    #[inline]
    pub fn add(&self, a: i64, b: i64) -> Option<i64> {
        self.fit(i128::from(a) + i128::from(b))
    }

    /// Checked `a - b`.
    #[inline]
    pub fn sub(&self, a: i64, b: i64) -> Option<i64> {
        self.fit(i128::from(a) - i128::from(b))
    }

    /// Checked `a * b`.
    #[inline]
    pub fn mul(&self, a: i64, b: i64) -> Option<i64> {
        self.fit(i128::from(a) * i128::from(b))
    }

    /// Checked `-a`.
    #[inline]
    pub fn neg(&self, a: i64) -> Option<i64> {
        self.fit(-i128::from(a))
    }

    /// Checked `acc + a * b`.
    #[inline]
    pub fn mul_add(&self, acc: i64, a: i64, b: i64) -> Option<i64> {
        self.fit(i128::from(acc) + i128::from(a) * i128::from(b))
    }

    /// Returns true if `violation` exceeds the absolute tolerance.
    #[inline]
    pub fn is_violated(&self, violation: f64) -> bool {
        violation.is_finite() && violation > self.limits.violation_tolerance
    }

    /// Check a finished constraint against the safe range.
    ///
    /// Every coefficient and finite bound must be within the safe magnitude,
    /// and the activity at the extreme finite bounds of every variable must
    /// fit the target integer type.
    pub fn validate(&self, constraint: &LinearConstraint, snapshot: &RelaxationSnapshot) -> bool {
        let max = i128::from(self.limits.max_magnitude);

        for bound in [constraint.lower(), constraint.upper()].into_iter().flatten() {
            if !self.check(i128::from(bound), max) {
                return false;
            }
        }
        for term in constraint.terms() {
            if !self.check(i128::from(term.coefficient), max) {
                return false;
            }
        }

        let extremes = constraint.terms().iter().map(|term| {
            let reach = [snapshot.lower_bound(term.var), snapshot.upper_bound(term.var)]
                .into_iter()
                .flatten()
                .map(|b| i128::from(b).abs())
                .max()
                .unwrap_or(0);
            (i128::from(term.coefficient).abs(), reach)
        });

        let within = checked_sum_of_products(extremes)
            .is_some_and(|activity| activity <= self.limits.type_max);
        if !within {
            self.record_overflow();
        }
        within
    }

    /// Number of overflow events since the last [`take_overflow_events`].
    ///
    /// [`take_overflow_events`]: NumericGuard::take_overflow_events
    pub fn overflow_events(&self) -> u64 {
        self.overflow_events.get()
    }

    /// Return and reset the overflow counter.
    pub fn take_overflow_events(&self) -> u64 {
        self.overflow_events.replace(0)
    }

    fn record_overflow(&self) {
        self.overflow_events.set(self.overflow_events.get() + 1);
    }
}

impl Default for NumericGuard {
    fn default() -> Self {
        Self::new(NumericLimits::default())
    }
}

/// `Σ a·b` with overflow detection.
pub fn checked_sum_of_products<T, I>(pairs: I) -> Option<T>
where
    T: CheckedAdd + CheckedMul + Zero + Copy,
    I: IntoIterator<Item = (T, T)>,
{
    pairs.into_iter().try_fold(T::zero(), |acc, (a, b)| {
        a.checked_mul(&b).and_then(|p| acc.checked_add(&p))
    })
}

/// Greatest common divisor of the magnitudes of `values`; zero if all are zero.
pub fn gcd_of<T, I>(values: I) -> u64
where
    T: Signed + Copy + Into<i128>,
    I: IntoIterator<Item = T>,
{
    values.into_iter().fold(0u64, |g, v| {
        let magnitude = Into::<i128>::into(v).unsigned_abs();
        g.gcd(&u64::try_from(magnitude).unwrap_or(u64::MAX))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarId;
    use crate::relaxation::SnapshotBuilder;

    #[test]
    fn test_limits_for_width() {
        let limits = NumericLimits::for_width(64);
        assert_eq!(limits.type_max, i128::from(i64::MAX));
        assert_eq!(limits.max_magnitude, (1i64 << 62) - 1);

        let limits = NumericLimits::for_width(32);
        assert_eq!(limits.type_max, i128::from(i32::MAX));
        assert_eq!(limits.max_magnitude, (1i64 << 30) - 1);
    }

    #[test]
    fn test_check_records_overflow() {
        let guard = NumericGuard::new(NumericLimits::for_width(16));
        assert!(guard.check(100, 1000));
        assert!(!guard.check(2000, 1000));
        assert!(!guard.check(1 << 20, i128::MAX));
        assert_eq!(guard.overflow_events(), 2);
        assert_eq!(guard.take_overflow_events(), 2);
        assert_eq!(guard.overflow_events(), 0);
    }

    #[test]
    fn test_checked_ops() {
        let guard = NumericGuard::default();
        let max = guard.max_magnitude();
        assert_eq!(guard.add(2, 3), Some(5));
        assert_eq!(guard.add(max, 1), None);
        assert_eq!(guard.mul(max, 2), None);
        assert_eq!(guard.mul(-4, 5), Some(-20));
        assert_eq!(guard.neg(7), Some(-7));
        assert_eq!(guard.mul_add(1, 2, 3), Some(7));
    }

    #[test]
    fn test_validate_extreme_activity() {
        let guard = NumericGuard::default();
        let big = guard.max_magnitude();

        let mut builder = SnapshotBuilder::new(0);
        let x = builder.add_integer(0.0, 0, big);
        let y = builder.add_integer(0.0, 0, big);
        let snapshot = builder.build();

        // Coefficients in range, but 2 * 4 * 2^62 overflows the type.
        let c = LinearConstraint::less_or_equal([(4, x), (4, y)], 1).unwrap();
        assert!(!guard.validate(&c, &snapshot));

        let c = LinearConstraint::less_or_equal([(1, x)], 1).unwrap();
        assert!(guard.validate(&c, &snapshot));

        let c = LinearConstraint::less_or_equal([(1, VarId(0))], i64::MAX).unwrap();
        assert!(!guard.validate(&c, &snapshot));
    }

    #[test]
    fn test_gcd_of() {
        assert_eq!(gcd_of([6i64, -9, 15]), 3);
        assert_eq!(gcd_of([0i64, 0]), 0);
        assert_eq!(gcd_of([7i64]), 7);
    }

    #[test]
    fn test_is_violated() {
        let guard = NumericGuard::default();
        assert!(guard.is_violated(0.3));
        assert!(!guard.is_violated(1e-9));
        assert!(!guard.is_violated(f64::NAN));
    }
}
