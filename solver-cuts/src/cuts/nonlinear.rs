//! Linear relaxation cuts for square and product constraints.
//!
//! For `y = x²` with `x ∈ [l, u]`:
//! - secant `y <= (l + u) x - l u`
//! - tangent at `v = ⌊x*⌋`: `y >= (2v + 1) x - v (v + 1)` for integer `x`,
//!   `y >= 2v x - v²` otherwise
//!
//! For `z = x y` the four McCormick inequalities over the factor boxes.

use crate::cuts::{ensure_known_vars, CutGenerator, GeneratorStats};
use crate::error::CutResult;
use crate::model::{Constraint, CutSource, LinearConstraint, RawCut, VarId};
use crate::numeric::NumericGuard;
use crate::relaxation::RelaxationSnapshot;
use crate::settings::GeneratorKind;

/// Square and product cut generator.
#[derive(Default)]
pub struct NonlinearGenerator {
    /// Statistics.
    stats: GeneratorStats,
}

impl NonlinearGenerator {
    /// Create a new nonlinear generator.
    pub fn new() -> Self {
        Self::default()
    }

    fn square(
        &self,
        square: VarId,
        base: VarId,
        snapshot: &RelaxationSnapshot,
        guard: &NumericGuard,
    ) -> Vec<LinearConstraint> {
        let (Some(l), Some(u)) = (snapshot.lower_bound(base), snapshot.upper_bound(base)) else {
            return Vec::new();
        };
        let mut cuts = Vec::new();

        // Secant through (l, l²) and (u, u²).
        let secant = guard.add(l, u).zip(guard.mul(l, u)).and_then(|(slope, lu)| {
            let rhs = guard.neg(lu)?;
            LinearConstraint::less_or_equal([(1, square), (guard.neg(slope)?, base)], rhs).ok()
        });
        cuts.extend(secant);

        // Tangent at the integer below the relaxation value.
        let value = snapshot.value(base).clamp(l as f64, u as f64);
        let v = value.floor() as i64;
        let tangent = if snapshot.is_integer(base) {
            guard
                .mul_add(1, 2, v)
                .zip(guard.add(v, 1).and_then(|w| guard.mul(v, w)))
        } else {
            guard.mul(2, v).zip(guard.mul(v, v))
        };
        if let Some((slope, offset)) = tangent {
            let cut = guard.neg(slope).zip(guard.neg(offset)).and_then(|(s, o)| {
                LinearConstraint::greater_or_equal([(1, square), (s, base)], o).ok()
            });
            cuts.extend(cut);
        }

        cuts.retain(|c| guard.is_violated(c.violation(snapshot)));
        cuts
    }

    fn product(
        &self,
        product: VarId,
        left: VarId,
        right: VarId,
        snapshot: &RelaxationSnapshot,
        guard: &NumericGuard,
    ) -> Vec<LinearConstraint> {
        let bounds = (
            snapshot.lower_bound(left),
            snapshot.upper_bound(left),
            snapshot.lower_bound(right),
            snapshot.upper_bound(right),
        );
        let (Some(xl), Some(xu), Some(yl), Some(yu)) = bounds else {
            return Vec::new();
        };

        // (x coefficient, y coefficient, is lower bound on z)
        let envelopes = [
            (xl, yl, true),
            (xu, yu, true),
            (xu, yl, false),
            (xl, yu, false),
        ];

        envelopes
            .into_iter()
            .filter_map(|(bx, by, below)| {
                // z ≷ bx * y + by * x - bx * by
                let terms = [(1, product), (guard.neg(bx)?, right), (guard.neg(by)?, left)];
                let rhs = guard.neg(guard.mul(bx, by)?)?;
                if below {
                    LinearConstraint::greater_or_equal(terms, rhs).ok()
                } else {
                    LinearConstraint::less_or_equal(terms, rhs).ok()
                }
            })
            .filter(|c| guard.is_violated(c.violation(snapshot)))
            .collect()
    }
}

impl CutGenerator for NonlinearGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Nonlinear
    }

    fn generate(
        &mut self,
        snapshot: &RelaxationSnapshot,
        constraints: &[Constraint],
        guard: &NumericGuard,
    ) -> CutResult<Vec<RawCut>> {
        self.stats.invocations += 1;
        let mut cuts = Vec::new();

        for (index, constraint) in constraints.iter().enumerate() {
            let found: Vec<RawCut> = match *constraint {
                Constraint::Square { square, base } => {
                    ensure_known_vars(snapshot, constraint, index)?;
                    self.square(square, base, snapshot, guard)
                        .into_iter()
                        .map(|c| RawCut::integral(c, CutSource::Square { constraint: index }))
                        .collect()
                }
                Constraint::Product {
                    product,
                    left,
                    right,
                } => {
                    ensure_known_vars(snapshot, constraint, index)?;
                    self.product(product, left, right, snapshot, guard)
                        .into_iter()
                        .map(|c| RawCut::integral(c, CutSource::Product { constraint: index }))
                        .collect()
                }
                _ => continue,
            };

            if found.is_empty() {
                self.stats.rows_skipped += 1;
            }
            cuts.extend(found);
        }

        self.stats.cuts_generated += cuts.len();
        Ok(cuts)
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }
}
