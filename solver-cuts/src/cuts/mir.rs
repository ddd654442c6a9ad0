//! Mixed-integer rounding (MIR) cuts.
//!
//! For a row `Σ a_j y_j <= β` over nonnegative shifted variables and a
//! divisor `δ > 0`, let `f0 = frac(β/δ)` and `f_j = frac(a_j/δ)`. The MIR
//! inequality is
//!
//! ```text
//! Σ_{int} (⌊a_j/δ⌋ + max(0, f_j - f0)/(1 - f0)) y_j
//!   + Σ_{cont} min(a_j, 0)/(δ(1 - f0)) y_j  <=  ⌊β/δ⌋
//! ```
//!
//! The divisor is chosen here in floating point by efficacy. The candidate
//! leaves as a [`FractionalCut`]; the strengthener derives the exact
//! integral cut and re-checks every coefficient.

use crate::cuts::shifted::{ShiftRule, ShiftedRow};
use crate::cuts::{ensure_known_vars, is_fractional, CutGenerator, GeneratorStats};
use crate::error::CutResult;
use crate::model::{Constraint, CutSource, FractionalCut, LinearTerm, RawCut};
use crate::numeric::NumericGuard;
use crate::relaxation::RelaxationSnapshot;
use crate::settings::{GeneratorKind, MirSettings};

/// MIR inequality for one divisor, in shifted variables.
#[derive(Debug, Clone)]
struct MirEstimate {
    divisor: f64,
    coefficients: Vec<f64>,
    rhs: f64,
    violation: f64,
    efficacy: f64,
}

/// MIR cut generator.
pub struct MirGenerator {
    /// Settings.
    settings: MirSettings,

    /// Tolerance for integral relaxation values.
    integrality_tolerance: f64,

    /// Statistics.
    stats: GeneratorStats,
}

impl MirGenerator {
    /// Create a new MIR generator.
    pub fn new(settings: MirSettings, integrality_tolerance: f64) -> Self {
        Self {
            settings,
            integrality_tolerance,
            stats: GeneratorStats::default(),
        }
    }

    /// Separate one `Σ terms <= rhs` row.
    fn separate_row(
        &self,
        terms: &[LinearTerm],
        rhs: i64,
        snapshot: &RelaxationSnapshot,
        guard: &NumericGuard,
    ) -> Option<FractionalCut> {
        let has_fractional = terms.iter().any(|t| {
            snapshot.is_integer(t.var) && is_fractional(snapshot.value(t.var), self.integrality_tolerance)
        });
        if !has_fractional {
            return None;
        }

        let row = ShiftedRow::new(terms, rhs, snapshot, guard, ShiftRule::NearestBound)?;

        let mut divisors: Vec<f64> = Vec::new();
        for term in &row.terms {
            if !term.is_integer || term.value <= self.integrality_tolerance {
                continue;
            }
            let d = (term.coefficient as f64).abs();
            if !divisors.contains(&d) {
                divisors.push(d);
            }
            if divisors.len() >= self.settings.max_divisors {
                break;
            }
        }

        let mut best: Option<MirEstimate> = None;
        for &divisor in &divisors {
            keep_better(&mut best, self.estimate(&row, divisor));
        }

        let base = best.as_ref()?.divisor;
        let mut divisor = base;
        for _ in 0..self.settings.halvings {
            divisor /= 2.0;
            keep_better(&mut best, self.estimate(&row, divisor));
        }

        let best = best?;
        if !guard.is_violated(best.violation) {
            return None;
        }

        Some(FractionalCut {
            base: terms.to_vec(),
            base_rhs: rhs,
            divisor: best.divisor,
            estimates: row
                .terms
                .iter()
                .map(|t| t.var)
                .zip(best.coefficients)
                .collect(),
            rhs_estimate: best.rhs,
        })
    }

    /// MIR inequality of `row` for `divisor`, if the scaled right-hand side
    /// is fractional enough.
    fn estimate(&self, row: &ShiftedRow, divisor: f64) -> Option<MirEstimate> {
        let scaled_rhs = row.rhs as f64 / divisor;
        let rhs = scaled_rhs.floor();
        let f0 = scaled_rhs - rhs;
        let min_frac = self.settings.min_fractionality;
        if !scaled_rhs.is_finite() || f0 < min_frac || f0 > 1.0 - min_frac {
            return None;
        }

        let coefficients: Vec<f64> = row
            .terms
            .iter()
            .map(|t| {
                let a = t.coefficient as f64;
                if t.is_integer {
                    let scaled = a / divisor;
                    let floor = scaled.floor();
                    floor + (scaled - floor - f0).max(0.0) / (1.0 - f0)
                } else {
                    a.min(0.0) / (divisor * (1.0 - f0))
                }
            })
            .collect();

        let norm = coefficients.iter().map(|c| c * c).sum::<f64>().sqrt();
        if norm <= 0.0 {
            return None;
        }
        let violation = row.activity(&coefficients) - rhs;

        Some(MirEstimate {
            divisor,
            coefficients,
            rhs,
            violation,
            efficacy: violation / norm,
        })
    }
}

fn keep_better(best: &mut Option<MirEstimate>, candidate: Option<MirEstimate>) {
    if let Some(candidate) = candidate {
        if best.as_ref().map_or(true, |b| candidate.efficacy > b.efficacy) {
            *best = Some(candidate);
        }
    }
}

impl CutGenerator for MirGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Mir
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
            let Some(linear) = constraint.as_linear() else {
                continue;
            };
            ensure_known_vars(snapshot, constraint, index)?;

            for (terms, rhs) in linear.upper_rows() {
                match self.separate_row(&terms, rhs, snapshot, guard) {
                    Some(cut) => cuts.push(RawCut::fractional(
                        cut,
                        CutSource::Mir { constraint: index },
                    )),
                    None => self.stats.rows_skipped += 1,
                }
            }
        }

        self.stats.cuts_generated += cuts.len();
        Ok(cuts)
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CutBody, LinearConstraint};
    use crate::relaxation::SnapshotBuilder;

    fn generator() -> MirGenerator {
        MirGenerator::new(MirSettings::default(), 1e-6)
    }

    fn fractional(cut: &RawCut) -> &FractionalCut {
        match &cut.body {
            CutBody::Fractional(f) => f,
            CutBody::Integral(_) => panic!("MIR cuts leave the generator unrounded"),
        }
    }

    #[test]
    fn test_pure_integer_row() {
        // 2x + 2y <= 3 at (0.75, 0.75): x + y <= 1.
        let mut builder = SnapshotBuilder::new(0);
        let x = builder.add_integer(0.75, 0, 5);
        let y = builder.add_integer(0.75, 0, 5);
        let snapshot = builder.build();

        let row = LinearConstraint::less_or_equal([(2, x), (2, y)], 3).unwrap();
        let cuts = generator()
            .generate(&snapshot, &[row.into()], &NumericGuard::default())
            .unwrap();

        assert_eq!(cuts.len(), 1);
        let cut = fractional(&cuts[0]);
        assert_eq!(cut.divisor, 2.0);
        assert_eq!(cut.base_rhs, 3);
        assert_eq!(cut.estimates, vec![(x, 1.0), (y, 1.0)]);
        assert_eq!(cut.rhs_estimate, 1.0);
    }

    #[test]
    fn test_continuous_term() {
        // 2x - z <= 3 at x = 1.5, z = 0: x - z <= 1.
        let mut builder = SnapshotBuilder::new(0);
        let x = builder.add_integer(1.5, 0, 10);
        let z = builder.add_continuous(0.0, Some(0), None);
        let snapshot = builder.build();

        let row = LinearConstraint::less_or_equal([(2, x), (-1, z)], 3).unwrap();
        let cuts = generator()
            .generate(&snapshot, &[row.into()], &NumericGuard::default())
            .unwrap();

        assert_eq!(cuts.len(), 1);
        let cut = fractional(&cuts[0]);
        assert_eq!(cut.estimates.len(), 2);
        assert!((cut.estimates[0].1 - 1.0).abs() < 1e-12);
        assert!((cut.estimates[1].1 + 1.0).abs() < 1e-12);
        assert_eq!(cut.rhs_estimate, 1.0);
        assert_eq!(cuts[0].source, CutSource::Mir { constraint: 0 });
    }

    #[test]
    fn test_integral_point_gives_nothing() {
        let mut builder = SnapshotBuilder::new(0);
        let x = builder.add_integer(1.0, 0, 5);
        let y = builder.add_integer(0.0, 0, 5);
        let snapshot = builder.build();

        let row = LinearConstraint::less_or_equal([(2, x), (2, y)], 3).unwrap();
        let cuts = generator()
            .generate(&snapshot, &[row.into()], &NumericGuard::default())
            .unwrap();
        assert!(cuts.is_empty());
    }

    #[test]
    fn test_integral_rhs_after_scaling_gives_nothing() {
        // 2x + 2y <= 4 has no fractional right-hand side for any tried divisor.
        let mut builder = SnapshotBuilder::new(0);
        let x = builder.add_integer(1.5, 0, 5);
        let y = builder.add_integer(0.5, 0, 5);
        let snapshot = builder.build();

        let row = LinearConstraint::less_or_equal([(2, x), (2, y)], 4).unwrap();
        let cuts = generator()
            .generate(&snapshot, &[row.into()], &NumericGuard::default())
            .unwrap();
        assert!(cuts.is_empty());
    }
}
