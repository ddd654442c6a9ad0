//! Cuts and raw cut candidates.

use super::{LinearConstraint, LinearTerm, VarId};
use crate::relaxation::RelaxationSnapshot;
use crate::settings::GeneratorKind;

/// Generator that produced a cut (for tracking and debugging).
///
/// `constraint` is the index of the input constraint the cut was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CutSource {
    /// Lifted knapsack cover inequality.
    KnapsackCover {
        /// Source constraint.
        constraint: usize,
    },

    /// Mixed-integer rounding cut.
    Mir {
        /// Source constraint.
        constraint: usize,
    },

    /// Flow cover inequality.
    FlowCover {
        /// Source constraint.
        constraint: usize,
    },

    /// Bound on a subset of an all-different constraint.
    AllDifferent {
        /// Source constraint.
        constraint: usize,
    },

    /// Subtour elimination for a circuit constraint.
    Circuit {
        /// Source constraint.
        constraint: usize,
    },

    /// Secant or tangent of `y = x^2`.
    Square {
        /// Source constraint.
        constraint: usize,
    },

    /// McCormick inequality of `z = x * y`.
    Product {
        /// Source constraint.
        constraint: usize,
    },
}

impl CutSource {
    /// The generator family this source belongs to.
    pub fn kind(&self) -> GeneratorKind {
        match self {
            CutSource::KnapsackCover { .. } => GeneratorKind::KnapsackCover,
            CutSource::Mir { .. } => GeneratorKind::Mir,
            CutSource::FlowCover { .. } => GeneratorKind::FlowCover,
            CutSource::AllDifferent { .. } | CutSource::Circuit { .. } => GeneratorKind::Structural,
            CutSource::Square { .. } | CutSource::Product { .. } => GeneratorKind::Nonlinear,
        }
    }

    /// Index of the input constraint.
    pub fn constraint(&self) -> usize {
        match *self {
            CutSource::KnapsackCover { constraint }
            | CutSource::Mir { constraint }
            | CutSource::FlowCover { constraint }
            | CutSource::AllDifferent { constraint }
            | CutSource::Circuit { constraint }
            | CutSource::Square { constraint }
            | CutSource::Product { constraint } => constraint,
        }
    }
}

/// A strengthened, exactly valid cut.
#[derive(Debug, Clone, PartialEq)]
pub struct Cut {
    /// The inequality itself.
    pub constraint: LinearConstraint,

    /// Generator that produced it.
    pub source: CutSource,

    /// Violation at the snapshot the cut was separated from.
    pub violation: f64,
}

impl Cut {
    /// Wrap a constraint, evaluating its violation on `snapshot`.
    pub fn evaluate(constraint: LinearConstraint, source: CutSource, snapshot: &RelaxationSnapshot) -> Self {
        let violation = constraint.violation(snapshot);
        Self {
            constraint,
            source,
            violation,
        }
    }

    /// Number of nonzero terms.
    pub fn support_size(&self) -> usize {
        self.constraint.support_size()
    }

    /// Violation divided by the Euclidean norm of the coefficients.
    pub fn efficacy(&self) -> f64 {
        let norm = self.constraint.norm();
        if norm > 0.0 {
            self.violation / norm
        } else {
            0.0
        }
    }

    /// Consume the cut, keeping only the inequality.
    pub fn into_constraint(self) -> LinearConstraint {
        self.constraint
    }
}

/// A rounding candidate whose scaling was chosen in floating point.
///
/// The base row is exact; the divisor and coefficient estimates are not.
/// The strengthener turns this into an integral cut and drops it if the
/// estimates cannot be confirmed exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct FractionalCut {
    /// Exact base row `Σ base <= base_rhs` in original variables.
    pub base: Vec<LinearTerm>,

    /// Right-hand side of the base row.
    pub base_rhs: i64,

    /// Positive divisor the base row is scaled by before rounding.
    pub divisor: f64,

    /// Estimated rounded coefficient for each shifted variable.
    pub estimates: Vec<(VarId, f64)>,

    /// Estimated rounded right-hand side.
    pub rhs_estimate: f64,
}

/// Body of a raw candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum CutBody {
    /// Derived entirely in exact integer arithmetic.
    Integral(LinearConstraint),

    /// Needs rounding-closure normalization.
    Fractional(FractionalCut),
}

/// Candidate cut as emitted by a generator.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCut {
    /// Candidate inequality.
    pub body: CutBody,

    /// Generator that produced it.
    pub source: CutSource,
}

impl RawCut {
    /// An exactly derived candidate.
    pub fn integral(constraint: LinearConstraint, source: CutSource) -> Self {
        Self {
            body: CutBody::Integral(constraint),
            source,
        }
    }

    /// A candidate that still needs rounding.
    pub fn fractional(cut: FractionalCut, source: CutSource) -> Self {
        Self {
            body: CutBody::Fractional(cut),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relaxation::SnapshotBuilder;

    #[test]
    fn test_cut_evaluate() {
        let mut builder = SnapshotBuilder::new(0);
        let x = builder.add_integer(0.8, 0, 1);
        let y = builder.add_integer(0.5, 0, 1);
        let snapshot = builder.build();

        let c = LinearConstraint::less_or_equal([(1, x), (1, y)], 1).unwrap();
        let cut = Cut::evaluate(c, CutSource::KnapsackCover { constraint: 0 }, &snapshot);

        assert!((cut.violation - 0.3).abs() < 1e-12);
        assert_eq!(cut.support_size(), 2);
        assert!((cut.efficacy() - 0.3 / 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_source_kind() {
        assert_eq!(CutSource::Mir { constraint: 3 }.kind(), GeneratorKind::Mir);
        assert_eq!(
            CutSource::Circuit { constraint: 1 }.kind(),
            GeneratorKind::Structural
        );
        assert_eq!(CutSource::Product { constraint: 7 }.constraint(), 7);
    }
}
