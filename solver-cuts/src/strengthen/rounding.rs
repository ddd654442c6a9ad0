//! Exact rounding of fractional MIR candidates.
//!
//! The divisor picked in floating point is turned into a fraction `p/q`.
//! Scaling the shifted base row by `q/p` and applying MIR gives, after
//! multiplying through by `p - r` with `r = (q β) mod p`, the integral cut
//!
//! ```text
//! g_j = (p - r) ⌊q a_j / p⌋ + max(0, (q a_j) mod p - r)   (integer y_j)
//! g_j = q a_j if a_j < 0, else 0                            (continuous y_j)
//! rhs = (p - r) ⌊q β / p⌋
//! ```
//!
//! Each floating-point estimate is scaled by `p - r` and rounded to the
//! nearest integer. The rounded cut is kept only if every coefficient is at
//! most `g_j` and the right-hand side at least `rhs`; it is then implied by
//! the exact MIR cut over `y >= 0`.

use rustc_hash::FxHashMap;

use crate::cuts::shifted::{ShiftRule, ShiftedRow};
use crate::model::{FractionalCut, LinearConstraint, VarId};
use crate::numeric::NumericGuard;
use crate::relaxation::RelaxationSnapshot;

/// Reason a fractional candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RoundingFailure {
    /// Base row could not be shifted or arithmetic left the safe range.
    Shift,

    /// The divisor has no usable fraction.
    Divisor,

    /// The scaled right-hand side is integral, so there is no cut.
    IntegralRhs,

    /// A rounded estimate is stronger than the exact cut allows.
    Unverified,
}

/// Best rational approximation `p/q` of a positive `x` with `q <= max_denominator`.
pub(crate) fn rational_approximation(x: f64, max_denominator: i64) -> Option<(i64, i64)> {
    if !x.is_finite() || x <= 0.0 || max_denominator < 1 {
        return None;
    }

    // Convergents h/k of the continued fraction of x.
    let (mut h0, mut h1) = (0i128, 1i128);
    let (mut k0, mut k1) = (1i128, 0i128);
    let mut rest = x;

    for _ in 0..64 {
        let a = rest.floor();
        if a > 1e18 {
            break;
        }
        let a = a as i128;
        let h2 = a.checked_mul(h1)?.checked_add(h0)?;
        let k2 = a.checked_mul(k1)?.checked_add(k0)?;
        if k2 > i128::from(max_denominator) {
            break;
        }
        (h0, h1) = (h1, h2);
        (k0, k1) = (k1, k2);

        let frac = rest - rest.floor();
        if frac < 1e-12 {
            break;
        }
        rest = 1.0 / frac;
    }

    if h1 <= 0 || k1 <= 0 {
        return None;
    }
    Some((i64::try_from(h1).ok()?, i64::try_from(k1).ok()?))
}

/// Round to the nearest integer, ties toward negative infinity.
fn round_half_down(x: f64) -> f64 {
    (x - 0.5).ceil()
}

/// Exact integral cut for `cut`, or the reason it was dropped.
pub(crate) fn round_fractional(
    cut: &FractionalCut,
    snapshot: &RelaxationSnapshot,
    guard: &NumericGuard,
    max_denominator: i64,
) -> Result<LinearConstraint, RoundingFailure> {
    let row = ShiftedRow::new(&cut.base, cut.base_rhs, snapshot, guard, ShiftRule::NearestBound)
        .ok_or(RoundingFailure::Shift)?;
    let (p, q) = rational_approximation(cut.divisor, max_denominator).ok_or(RoundingFailure::Divisor)?;

    let scaled_rhs = guard.mul(q, row.rhs).ok_or(RoundingFailure::Shift)?;
    let r = scaled_rhs.rem_euclid(p);
    if r == 0 {
        return Err(RoundingFailure::IntegralRhs);
    }
    let step = p - r;
    let exact_rhs = guard
        .mul(step, scaled_rhs.div_euclid(p))
        .ok_or(RoundingFailure::Shift)?;

    let estimates: FxHashMap<VarId, f64> = cut.estimates.iter().copied().collect();
    let max = guard.max_magnitude() as f64;
    let scale = step as f64;

    let mut coefficients = Vec::with_capacity(row.terms.len());
    for term in &row.terms {
        let bound = if term.is_integer {
            let scaled = guard.mul(q, term.coefficient).ok_or(RoundingFailure::Shift)?;
            let excess = (scaled.rem_euclid(p) - r).max(0);
            guard
                .mul_add(excess, step, scaled.div_euclid(p))
                .ok_or(RoundingFailure::Shift)?
        } else if term.coefficient < 0 {
            guard.mul(q, term.coefficient).ok_or(RoundingFailure::Shift)?
        } else {
            0
        };

        let estimate = estimates.get(&term.var).copied().unwrap_or(0.0);
        let rounded = round_half_down(estimate * scale);
        if !rounded.is_finite() || rounded.abs() > max || rounded as i64 > bound {
            return Err(RoundingFailure::Unverified);
        }
        coefficients.push(rounded as i64);
    }

    let rounded_rhs = round_half_down(cut.rhs_estimate * scale);
    if !rounded_rhs.is_finite() || rounded_rhs.abs() > max || (rounded_rhs as i64) < exact_rhs {
        return Err(RoundingFailure::Unverified);
    }

    let (terms, rhs) = row
        .unshift(&coefficients, rounded_rhs as i64, guard)
        .ok_or(RoundingFailure::Shift)?;
    LinearConstraint::less_or_equal(terms, rhs).map_err(|_| RoundingFailure::Shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinearTerm;
    use crate::relaxation::SnapshotBuilder;

    #[test]
    fn test_rational_approximation() {
        assert_eq!(rational_approximation(2.0, 1024), Some((2, 1)));
        assert_eq!(rational_approximation(2.5, 1024), Some((5, 2)));
        assert_eq!(rational_approximation(0.25, 1024), Some((1, 4)));
        assert_eq!(rational_approximation(1.0 / 3.0, 1024), Some((1, 3)));
        assert_eq!(rational_approximation(std::f64::consts::PI, 7), Some((22, 7)));
        assert_eq!(rational_approximation(-1.0, 1024), None);
        assert_eq!(rational_approximation(f64::NAN, 1024), None);
    }

    #[test]
    fn test_round_half_down() {
        assert_eq!(round_half_down(2.5), 2.0);
        assert_eq!(round_half_down(2.4), 2.0);
        assert_eq!(round_half_down(2.6), 3.0);
        assert_eq!(round_half_down(-1.5), -2.0);
        assert_eq!(round_half_down(0.9999999), 1.0);
    }

    #[test]
    fn test_round_mixed_row() {
        // 2x - z <= 3, divisor 2: x - z <= 1.
        let mut builder = SnapshotBuilder::new(0);
        let x = builder.add_integer(1.5, 0, 10);
        let z = builder.add_continuous(0.0, Some(0), None);
        let snapshot = builder.build();
        let guard = NumericGuard::default();

        let cut = FractionalCut {
            base: vec![LinearTerm::new(2, x), LinearTerm::new(-1, z)],
            base_rhs: 3,
            divisor: 2.0,
            estimates: vec![(x, 1.0), (z, -1.0)],
            rhs_estimate: 1.0,
        };
        let exact = round_fractional(&cut, &snapshot, &guard, 1024).unwrap();
        assert_eq!(exact.terms(), &[LinearTerm::new(1, x), LinearTerm::new(-1, z)]);
        assert_eq!(exact.upper(), Some(1));
    }

    #[test]
    fn test_overstated_estimate_is_dropped() {
        let mut builder = SnapshotBuilder::new(0);
        let x = builder.add_integer(0.75, 0, 5);
        let y = builder.add_integer(0.75, 0, 5);
        let snapshot = builder.build();
        let guard = NumericGuard::default();

        let cut = FractionalCut {
            base: vec![LinearTerm::new(2, x), LinearTerm::new(2, y)],
            base_rhs: 3,
            divisor: 2.0,
            estimates: vec![(x, 1.0), (y, 2.0)],
            rhs_estimate: 1.0,
        };
        assert_eq!(
            round_fractional(&cut, &snapshot, &guard, 1024),
            Err(RoundingFailure::Unverified)
        );

        let cut = FractionalCut {
            estimates: vec![(x, 1.0), (y, 1.0)],
            rhs_estimate: 0.0,
            ..cut
        };
        assert_eq!(
            round_fractional(&cut, &snapshot, &guard, 1024),
            Err(RoundingFailure::Unverified)
        );
    }

    #[test]
    fn test_half_integral_divisor() {
        // 3x <= 4 with divisor 1.5 = 3/2: q β = 8, p = 3, r = 2, step = 1.
        // g_x = 1 * ⌊6/3⌋ + max(0, 0 - 2) = 2, rhs = ⌊8/3⌋ = 2: 2x <= 2.
        let mut builder = SnapshotBuilder::new(0);
        let x = builder.add_integer(1.3, 0, 3);
        let snapshot = builder.build();
        let guard = NumericGuard::default();

        let cut = FractionalCut {
            base: vec![LinearTerm::new(3, x)],
            base_rhs: 4,
            divisor: 1.5,
            estimates: vec![(x, 2.0)],
            rhs_estimate: 2.0,
        };
        let exact = round_fractional(&cut, &snapshot, &guard, 1024).unwrap();
        assert_eq!(exact.terms(), &[LinearTerm::new(2, x)]);
        assert_eq!(exact.upper(), Some(2));
    }
}
