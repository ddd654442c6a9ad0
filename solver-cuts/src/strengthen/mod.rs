//! Cut strengthening.
//!
//! Every raw candidate passes through [`Strengthener::strengthen`] before it
//! reaches the pool:
//! 1. fixed variables are folded into the bound
//! 2. fractional candidates are rounded to an exactly verified integral cut
//! 3. integer coefficients are tightened against the variable bounds and the
//!    row is divided by the gcd of its coefficients
//! 4. the result is checked against the safe numeric range
//!
//! Each step either keeps the cut valid or drops it.

mod rounding;

use crate::cuts::shifted::{ShiftRule, ShiftedRow};
use crate::model::{Cut, CutBody, LinearConstraint, LinearTerm, RawCut, VarId};
use crate::numeric::{checked_sum_of_products, gcd_of, NumericGuard};
use crate::relaxation::RelaxationSnapshot;
use crate::settings::CutSettings;

use rounding::{round_fractional, RoundingFailure};

/// Statistics for cut strengthening.
#[derive(Debug, Default, Clone)]
pub struct StrengthenStats {
    /// Candidates handed in.
    pub candidates: usize,

    /// Cuts returned.
    pub strengthened: usize,

    /// Coefficients reduced by bound tightening.
    pub coefficients_tightened: usize,

    /// Cuts divided by a gcd greater than one.
    pub gcd_reductions: usize,

    /// Fractional candidates whose rounding could not be verified.
    pub rounding_failures: usize,

    /// Candidates dropped for leaving the safe numeric range.
    pub overflow_drops: usize,
}

/// Normalizes and tightens raw candidates.
pub struct Strengthener {
    /// Largest denominator for rounding divisors.
    max_denominator: i64,

    /// Statistics.
    stats: StrengthenStats,
}

impl Strengthener {
    /// Create a strengthener from the cut settings.
    pub fn new(settings: &CutSettings) -> Self {
        Self {
            max_denominator: settings.mir.max_denominator,
            stats: StrengthenStats::default(),
        }
    }

    /// Turn a raw candidate into a valid cut, or drop it.
    ///
    /// The returned cut is implied by the raw candidate (for integral
    /// candidates) or by the exact rounding of its base row (for fractional
    /// ones), and fits the guard's safe range.
    pub fn strengthen(
        &mut self,
        raw: RawCut,
        snapshot: &RelaxationSnapshot,
        guard: &NumericGuard,
    ) -> Option<Cut> {
        self.stats.candidates += 1;

        let constraint = match raw.body {
            CutBody::Integral(c) => fold_fixed(&c, snapshot, guard),
            CutBody::Fractional(f) => {
                match round_fractional(&f, snapshot, guard, self.max_denominator) {
                    Ok(c) => Some(c),
                    Err(RoundingFailure::Shift) => None,
                    Err(failure) => {
                        log::trace!("dropped fractional cut from {:?}: {:?}", raw.source, failure);
                        self.stats.rounding_failures += 1;
                        return None;
                    }
                }
            }
        };
        let Some(constraint) = constraint.and_then(|c| self.tighten(c, snapshot, guard)) else {
            self.stats.overflow_drops += 1;
            return None;
        };

        if !guard.validate(&constraint, snapshot) {
            self.stats.overflow_drops += 1;
            return None;
        }

        self.stats.strengthened += 1;
        Some(Cut::evaluate(constraint, raw.source, snapshot))
    }

    /// Tighten a one-sided cut against the variable bounds, then divide by
    /// the coefficient gcd. Two-sided constraints are returned unchanged.
    ///
    /// Returns `None` only when arithmetic leaves the safe range.
    fn tighten(
        &mut self,
        constraint: LinearConstraint,
        snapshot: &RelaxationSnapshot,
        guard: &NumericGuard,
    ) -> Option<LinearConstraint> {
        let constraint = match (constraint.lower(), constraint.upper()) {
            (None, Some(_)) => constraint,
            (Some(_), None) => constraint.negated()?,
            _ => return Some(constraint),
        };
        let upper = constraint.upper()?;

        let raw_violation = constraint.violation(snapshot);
        let (terms, rhs) = match self.tighten_coefficients(&constraint, upper, snapshot, guard) {
            // Never trade violation at the relaxation point for tightness.
            Some((terms, rhs)) if tightened_violation(&terms, rhs, snapshot) >= raw_violation - 1e-9 => {
                (terms, rhs)
            }
            _ => (
                constraint.terms().iter().map(|t| (t.coefficient, t.var)).collect(),
                upper,
            ),
        };

        let all_integer = terms.iter().all(|&(_, var)| snapshot.is_integer(var));
        let divisor = if all_integer {
            gcd_of(terms.iter().map(|&(c, _)| c))
        } else {
            0
        };
        if divisor > 1 {
            let g = i64::try_from(divisor).ok()?;
            self.stats.gcd_reductions += 1;
            let terms = terms.into_iter().map(|(c, var)| (c / g, var));
            return LinearConstraint::less_or_equal(terms, rhs.div_euclid(g)).ok();
        }

        LinearConstraint::less_or_equal(terms, rhs).ok()
    }

    /// Savelsbergh-style coefficient tightening on the positive-shifted row.
    ///
    /// With `M` the largest activity of the other terms, a binary term
    /// with `a_j > β - M > 0` can drop both `a_j` and `β` by `β - M`.
    /// Wider integer terms are left alone: their activity drops by
    /// `(β - M) r_j` against `β - M` on the right.
    /// `None` when the row has unbounded terms or cannot be shifted.
    fn tighten_coefficients(
        &mut self,
        constraint: &LinearConstraint,
        upper: i64,
        snapshot: &RelaxationSnapshot,
        guard: &NumericGuard,
    ) -> Option<(Vec<(i64, VarId)>, i64)> {
        let row = ShiftedRow::new(
            constraint.terms(),
            upper,
            snapshot,
            guard,
            ShiftRule::PositiveCoefficients,
        )?;

        let ranges = row
            .terms
            .iter()
            .map(|t| t.range.map(i128::from))
            .collect::<Option<Vec<_>>>()?;
        let mut coefficients: Vec<i64> = row.terms.iter().map(|t| t.coefficient).collect();
        let mut rhs = i128::from(row.rhs);
        let mut max_activity: i128 = checked_sum_of_products(
            coefficients
                .iter()
                .zip(&ranges)
                .map(|(&c, &r)| (i128::from(c), r)),
        )?;

        for (j, term) in row.terms.iter().enumerate() {
            if !term.is_integer || ranges[j] != 1 {
                continue;
            }
            let own = i128::from(coefficients[j]) * ranges[j];
            let others = max_activity - own;
            if others >= rhs {
                continue;
            }
            let delta = rhs - others;
            if i128::from(coefficients[j]) > delta {
                coefficients[j] = guard.fit(i128::from(coefficients[j]) - delta)?;
                rhs -= delta;
                max_activity -= delta * ranges[j];
                self.stats.coefficients_tightened += 1;
            }
        }

        row.unshift(&coefficients, guard.fit(rhs)?, guard)
    }

    /// Strengthening statistics.
    pub fn stats(&self) -> &StrengthenStats {
        &self.stats
    }
}

/// Violation of `Σ terms <= rhs` at the snapshot point.
fn tightened_violation(terms: &[(i64, VarId)], rhs: i64, snapshot: &RelaxationSnapshot) -> f64 {
    let activity: f64 = terms
        .iter()
        .map(|&(c, var)| c as f64 * snapshot.value(var))
        .sum();
    activity - rhs as f64
}

/// Move fixed variables into the bounds.
fn fold_fixed(
    constraint: &LinearConstraint,
    snapshot: &RelaxationSnapshot,
    guard: &NumericGuard,
) -> Option<LinearConstraint> {
    let mut shift = 0i64;
    let mut terms: Vec<LinearTerm> = Vec::with_capacity(constraint.support_size());

    for term in constraint.terms() {
        match snapshot.get(term.var) {
            Some(v) if v.is_fixed() => {
                shift = guard.mul_add(shift, term.coefficient, v.lower?)?;
            }
            _ => terms.push(*term),
        }
    }
    if terms.len() == constraint.support_size() {
        return Some(constraint.clone());
    }

    let lower = match constraint.lower() {
        Some(l) => Some(guard.sub(l, shift)?),
        None => None,
    };
    let upper = match constraint.upper() {
        Some(u) => Some(guard.sub(u, shift)?),
        None => None,
    };
    Some(LinearConstraint::from_parts(terms, lower, upper))
}
