//! Flow cover cuts.
//!
//! A single-node flow row `Σ_{N+} a_j y_j - Σ_{N-} |a_j| y_j <= b` with
//! nonnegative flows, where each inflow obeys `a_j y_j <= u_j x_j` for a
//! binary indicator `x_j` (an implied upper bound) or a plain upper bound
//! (an indicator fixed at one). For a cover `C ⊆ N+` with
//! `λ = Σ_C u_j - b > 0`:
//!
//! ```text
//! Σ_C a_j y_j - Σ_C (u_j - λ)⁺ x_j - Σ_{N-} |a_j| y_j <= b - Σ_C (u_j - λ)⁺
//! ```
//!
//! Both orientations of a constraint are tried.

use crate::cuts::{ensure_known_vars, is_fractional, CutGenerator, GeneratorStats};
use crate::error::CutResult;
use crate::model::{Constraint, CutSource, LinearConstraint, LinearTerm, RawCut, VarId};
use crate::numeric::NumericGuard;
use crate::relaxation::RelaxationSnapshot;
use crate::settings::GeneratorKind;

/// Inflow arc with its capacity `u_j = a_j * bound`.
#[derive(Debug, Clone, Copy)]
struct Inflow {
    var: VarId,
    coefficient: i64,
    capacity: i64,
    /// `None` when bounded by a plain upper bound.
    indicator: Option<VarId>,
    indicator_value: f64,
}

/// Flow cover cut generator.
pub struct FlowCoverGenerator {
    /// Tolerance for integral relaxation values.
    integrality_tolerance: f64,

    /// Statistics.
    stats: GeneratorStats,
}

impl FlowCoverGenerator {
    /// Create a new flow cover generator.
    pub fn new(integrality_tolerance: f64) -> Self {
        Self {
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
    ) -> Option<LinearConstraint> {
        if terms.iter().any(|t| snapshot.lower_bound(t.var).map_or(true, |l| l < 0)) {
            return None;
        }

        let mut inflows = Vec::new();
        for term in terms.iter().filter(|t| t.coefficient > 0) {
            inflows.push(self.inflow(term, snapshot, guard)?);
        }

        let has_fractional_indicator = inflows.iter().any(|f| {
            f.indicator.is_some() && is_fractional(f.indicator_value, self.integrality_tolerance)
        });
        if !has_fractional_indicator {
            return None;
        }

        inflows.sort_by(|a, b| {
            b.indicator_value
                .total_cmp(&a.indicator_value)
                .then(a.var.cmp(&b.var))
        });

        let mut cover = Vec::new();
        let mut total = 0i128;
        for flow in &inflows {
            cover.push(*flow);
            total += i128::from(flow.capacity);
            if total > i128::from(rhs) {
                break;
            }
        }
        if total <= i128::from(rhs) {
            return None;
        }
        let excess = guard.fit(total - i128::from(rhs))?;

        let mut cut_terms: Vec<(i64, VarId)> = Vec::with_capacity(2 * cover.len() + terms.len());
        let mut cut_rhs = rhs;
        for flow in &cover {
            cut_terms.push((flow.coefficient, flow.var));
            let reduced = guard.sub(flow.capacity, excess)?.max(0);
            if let Some(indicator) = flow.indicator {
                if reduced > 0 {
                    cut_terms.push((guard.neg(reduced)?, indicator));
                    cut_rhs = guard.sub(cut_rhs, reduced)?;
                }
            }
        }
        cut_terms.extend(
            terms
                .iter()
                .filter(|t| t.coefficient < 0)
                .map(|t| (t.coefficient, t.var)),
        );

        let cut = LinearConstraint::less_or_equal(cut_terms, cut_rhs).ok()?;
        guard.is_violated(cut.violation(snapshot)).then_some(cut)
    }

    /// Capacity and indicator of an inflow term, `None` if it has neither an
    /// implied nor a plain upper bound.
    fn inflow(&self, term: &LinearTerm, snapshot: &RelaxationSnapshot, guard: &NumericGuard) -> Option<Inflow> {
        let upper = snapshot.upper_bound(term.var);
        let implied = snapshot
            .implied_bound(term.var)
            .filter(|b| b.indicator != term.var && b.capacity >= 0 && snapshot.is_binary(b.indicator));

        let bound = match (implied, upper) {
            (Some(b), Some(u)) => b.capacity.min(u),
            (Some(b), None) => b.capacity,
            (None, Some(u)) => u,
            (None, None) => return None,
        };

        Some(Inflow {
            var: term.var,
            coefficient: term.coefficient,
            capacity: guard.mul(term.coefficient, bound)?,
            indicator: implied.map(|b| b.indicator),
            indicator_value: implied.map_or(1.0, |b| snapshot.value(b.indicator)),
        })
    }
}

impl CutGenerator for FlowCoverGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::FlowCover
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
                    Some(cut) => cuts.push(RawCut::integral(
                        cut,
                        CutSource::FlowCover { constraint: index },
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
    use crate::model::CutBody;
    use crate::relaxation::SnapshotBuilder;

    fn integral(cut: &RawCut) -> &LinearConstraint {
        match &cut.body {
            CutBody::Integral(c) => c,
            CutBody::Fractional(_) => panic!("flow cover cuts are integral"),
        }
    }

    #[test]
    fn test_two_arc_cover() {
        // y1 + y2 <= 10, y_i <= 8 x_i, at x = (0.625, 0.625), y = (5, 5).
        let mut builder = SnapshotBuilder::new(0);
        let y1 = builder.add_continuous(5.0, Some(0), Some(8));
        let y2 = builder.add_continuous(5.0, Some(0), Some(8));
        let x1 = builder.add_binary(0.625);
        let x2 = builder.add_binary(0.625);
        builder.add_implied_bound(y1, x1, 8);
        builder.add_implied_bound(y2, x2, 8);
        let snapshot = builder.build();

        let row = LinearConstraint::less_or_equal([(1, y1), (1, y2)], 10).unwrap();
        let cuts = FlowCoverGenerator::new(1e-6)
            .generate(&snapshot, &[row.into()], &NumericGuard::default())
            .unwrap();

        // λ = 6: y1 + y2 - 2x1 - 2x2 <= 6
        assert_eq!(cuts.len(), 1);
        let cut = integral(&cuts[0]);
        assert_eq!(cut.coefficient(y1), 1);
        assert_eq!(cut.coefficient(y2), 1);
        assert_eq!(cut.coefficient(x1), -2);
        assert_eq!(cut.coefficient(x2), -2);
        assert_eq!(cut.upper(), Some(6));
        assert!((cut.violation(&snapshot) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_outflow_kept_in_cut() {
        // y1 + y2 - z <= 10 with z = 0.
        let mut builder = SnapshotBuilder::new(0);
        let y1 = builder.add_continuous(5.0, Some(0), Some(8));
        let y2 = builder.add_continuous(5.0, Some(0), Some(8));
        let z = builder.add_continuous(0.0, Some(0), Some(4));
        let x1 = builder.add_binary(0.625);
        let x2 = builder.add_binary(0.625);
        builder.add_implied_bound(y1, x1, 8);
        builder.add_implied_bound(y2, x2, 8);
        let snapshot = builder.build();

        let row = LinearConstraint::less_or_equal([(1, y1), (1, y2), (-1, z)], 10).unwrap();
        let cuts = FlowCoverGenerator::new(1e-6)
            .generate(&snapshot, &[row.into()], &NumericGuard::default())
            .unwrap();

        assert_eq!(cuts.len(), 1);
        assert_eq!(integral(&cuts[0]).coefficient(z), -1);
    }

    #[test]
    fn test_without_indicators_gives_nothing() {
        let mut builder = SnapshotBuilder::new(0);
        let y1 = builder.add_continuous(5.0, Some(0), Some(8));
        let y2 = builder.add_continuous(5.0, Some(0), Some(8));
        let snapshot = builder.build();

        let row = LinearConstraint::less_or_equal([(1, y1), (1, y2)], 10).unwrap();
        let cuts = FlowCoverGenerator::new(1e-6)
            .generate(&snapshot, &[row.into()], &NumericGuard::default())
            .unwrap();
        assert!(cuts.is_empty());
    }

    #[test]
    fn test_negative_flow_bound_skips_row() {
        let mut builder = SnapshotBuilder::new(0);
        let y1 = builder.add_continuous(5.0, Some(-1), Some(8));
        let x1 = builder.add_binary(0.5);
        builder.add_implied_bound(y1, x1, 8);
        let snapshot = builder.build();

        let row = LinearConstraint::less_or_equal([(1, y1)], 4).unwrap();
        let cuts = FlowCoverGenerator::new(1e-6)
            .generate(&snapshot, &[row.into()], &NumericGuard::default())
            .unwrap();
        assert!(cuts.is_empty());
    }
}
