//! Rows rewritten over nonnegative shifted variables.
//!
//! Each non-fixed variable `x` with bounds `[l, u]` is replaced by either
//! `y = x - l` or `y = u - x`, so that `y >= 0`. Fixed variables are folded
//! into the right-hand side. All arithmetic goes through the guard; a row
//! that leaves the safe range is abandoned.

use crate::model::{LinearTerm, VarId};
use crate::numeric::NumericGuard;
use crate::relaxation::RelaxationSnapshot;

/// How a variable was shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shift {
    /// `y = x - l`.
    Lower(i64),

    /// `y = u - x`.
    Upper(i64),
}

/// Which bound each variable is shifted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShiftRule {
    /// The bound closer to the relaxation value.
    NearestBound,

    /// The bound that makes the shifted coefficient positive.
    PositiveCoefficients,
}

/// One term of a shifted row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ShiftedTerm {
    /// Original variable.
    pub var: VarId,

    /// Coefficient on the shifted variable.
    pub coefficient: i64,

    /// Shift applied.
    pub shift: Shift,

    /// Upper bound of the shifted variable, if finite.
    pub range: Option<i64>,

    /// Relaxation value of the shifted variable, clamped at zero.
    pub value: f64,

    /// Whether the variable is integral.
    pub is_integer: bool,
}

/// `Σ coefficient * y <= rhs` with every `y >= 0`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ShiftedRow {
    pub terms: Vec<ShiftedTerm>,
    pub rhs: i64,
}

impl ShiftedRow {
    /// Shift `Σ terms <= rhs`.
    ///
    /// Returns `None` if a variable is unknown, lacks the bound the rule asks
    /// for, or the shifted data leaves the safe range.
    pub fn new(
        terms: &[LinearTerm],
        rhs: i64,
        snapshot: &RelaxationSnapshot,
        guard: &NumericGuard,
        rule: ShiftRule,
    ) -> Option<Self> {
        let mut shifted = Vec::with_capacity(terms.len());
        let mut rhs = rhs;

        for term in terms {
            let var = snapshot.get(term.var)?;
            let a = term.coefficient;

            if var.is_fixed() {
                let value = var.lower?;
                rhs = sub_product(guard, rhs, a, value)?;
                continue;
            }

            let shift = match rule {
                ShiftRule::PositiveCoefficients if a > 0 => Shift::Lower(var.lower?),
                ShiftRule::PositiveCoefficients => Shift::Upper(var.upper?),
                ShiftRule::NearestBound => match (var.lower, var.upper) {
                    (Some(l), Some(u)) => {
                        if var.value - l as f64 <= u as f64 - var.value {
                            Shift::Lower(l)
                        } else {
                            Shift::Upper(u)
                        }
                    }
                    (Some(l), None) => Shift::Lower(l),
                    (None, Some(u)) => Shift::Upper(u),
                    (None, None) => return None,
                },
            };

            let (coefficient, value) = match shift {
                Shift::Lower(l) => {
                    rhs = sub_product(guard, rhs, a, l)?;
                    (a, var.value - l as f64)
                }
                Shift::Upper(u) => {
                    rhs = sub_product(guard, rhs, a, u)?;
                    (guard.neg(a)?, u as f64 - var.value)
                }
            };

            shifted.push(ShiftedTerm {
                var: term.var,
                coefficient,
                shift,
                range: var.range().and_then(|r| i64::try_from(r).ok()),
                value: value.max(0.0),
                is_integer: var.is_integer,
            });
        }

        Some(Self { terms: shifted, rhs })
    }

    /// Map `Σ coefficients[j] * y_j <= rhs` back to the original variables.
    ///
    /// `coefficients` is aligned with `self.terms`; zeros are skipped.
    pub fn unshift(
        &self,
        coefficients: &[i64],
        rhs: i64,
        guard: &NumericGuard,
    ) -> Option<(Vec<(i64, VarId)>, i64)> {
        let mut terms = Vec::with_capacity(self.terms.len());
        let mut rhs = rhs;

        for (term, &c) in self.terms.iter().zip(coefficients) {
            if c == 0 {
                continue;
            }
            match term.shift {
                Shift::Lower(l) => {
                    rhs = guard.mul_add(rhs, c, l)?;
                    terms.push((c, term.var));
                }
                Shift::Upper(u) => {
                    rhs = sub_product(guard, rhs, c, u)?;
                    terms.push((guard.neg(c)?, term.var));
                }
            }
        }

        Some((terms, rhs))
    }

    /// `Σ coefficients[j] * y*_j` for coefficients aligned with the terms.
    pub fn activity(&self, coefficients: &[f64]) -> f64 {
        self.terms
            .iter()
            .zip(coefficients)
            .map(|(t, c)| c * t.value)
            .sum()
    }
}

/// `acc - a * b` through the guard.
fn sub_product(guard: &NumericGuard, acc: i64, a: i64, b: i64) -> Option<i64> {
    guard.fit(i128::from(acc) - i128::from(a) * i128::from(b))
}
