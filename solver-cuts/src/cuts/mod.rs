//! Cut generators.
//!
//! This module provides the cut families run by the cut manager:
//! - Lifted knapsack cover cuts
//! - Mixed-integer rounding (MIR) cuts
//! - Flow cover cuts over implied variable upper bounds
//! - Structural cuts for all-different and circuit constraints
//! - Secant, tangent and McCormick cuts for square and product constraints
//!
//! Generators read the snapshot, never mutate it, and keep nothing across
//! rounds except statistics.

pub mod flow;
pub mod knapsack;
pub mod mir;
pub mod nonlinear;
pub(crate) mod shifted;
pub mod structural;

pub use flow::FlowCoverGenerator;
pub use knapsack::KnapsackCoverGenerator;
pub use mir::MirGenerator;
pub use nonlinear::NonlinearGenerator;
pub use structural::StructuralGenerator;

use crate::error::{CutError, CutResult};
use crate::model::{Constraint, RawCut};
use crate::numeric::NumericGuard;
use crate::relaxation::RelaxationSnapshot;
use crate::settings::{CutSettings, GeneratorKind};

/// Statistics kept by every generator.
#[derive(Debug, Default, Clone)]
pub struct GeneratorStats {
    /// Number of `generate` calls.
    pub invocations: usize,

    /// Raw candidates returned.
    pub cuts_generated: usize,

    /// Rows or constraints examined without producing a candidate.
    pub rows_skipped: usize,
}

/// Common capability of all cut families.
pub trait CutGenerator {
    /// Family this generator belongs to.
    fn kind(&self) -> GeneratorKind;

    /// Name used in logs.
    fn name(&self) -> &str {
        self.kind().name()
    }

    /// Derive raw candidates from `constraints` at the snapshot point.
    ///
    /// Constraints the generator does not understand are ignored. Returns an
    /// empty list when nothing is violated.
    ///
    /// # Errors
    ///
    /// `MalformedConstraint` when a constraint breaks a structural
    /// precondition of this family.
    fn generate(
        &mut self,
        snapshot: &RelaxationSnapshot,
        constraints: &[Constraint],
        guard: &NumericGuard,
    ) -> CutResult<Vec<RawCut>>;

    /// Generation statistics.
    fn stats(&self) -> &GeneratorStats;
}

/// Create the generator for `kind`.
pub fn create_generator(kind: GeneratorKind, settings: &CutSettings) -> Box<dyn CutGenerator> {
    match kind {
        GeneratorKind::KnapsackCover => Box::new(KnapsackCoverGenerator::new(
            settings.knapsack.clone(),
            settings.integrality_tolerance,
        )),
        GeneratorKind::Mir => Box::new(MirGenerator::new(
            settings.mir.clone(),
            settings.integrality_tolerance,
        )),
        GeneratorKind::FlowCover => Box::new(FlowCoverGenerator::new(settings.integrality_tolerance)),
        GeneratorKind::Structural => Box::new(StructuralGenerator::new(settings.integrality_tolerance)),
        GeneratorKind::Nonlinear => Box::new(NonlinearGenerator::new()),
    }
}

/// Fail with `MalformedConstraint` if `constraint` mentions a variable the
/// snapshot does not know.
pub(crate) fn ensure_known_vars(
    snapshot: &RelaxationSnapshot,
    constraint: &Constraint,
    index: usize,
) -> CutResult<()> {
    match constraint.vars().into_iter().find(|&v| !snapshot.contains(v)) {
        Some(var) => Err(CutError::MalformedConstraint(format!(
            "constraint {index} refers to unknown variable {var}"
        ))),
        None => Ok(()),
    }
}

/// Returns true if `value` is strictly between two integers.
#[inline]
pub(crate) fn is_fractional(value: f64, tolerance: f64) -> bool {
    (value - value.round()).abs() > tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinearConstraint, VarId};
    use crate::relaxation::SnapshotBuilder;

    #[test]
    fn test_create_generator_kinds() {
        let settings = CutSettings::default();
        for kind in GeneratorKind::ALL {
            let generator = create_generator(kind, &settings);
            assert_eq!(generator.kind(), kind);
            assert_eq!(generator.name(), kind.name());
        }
    }

    #[test]
    fn test_ensure_known_vars() {
        let mut builder = SnapshotBuilder::new(0);
        let x = builder.add_binary(0.5);
        let snapshot = builder.build();

        let ok = Constraint::Linear(LinearConstraint::less_or_equal([(1, x)], 1).unwrap());
        assert!(ensure_known_vars(&snapshot, &ok, 0).is_ok());

        let bad = Constraint::AllDifferent(vec![x, VarId(5)]);
        assert!(matches!(
            ensure_known_vars(&snapshot, &bad, 1),
            Err(CutError::MalformedConstraint(_))
        ));
    }

    #[test]
    fn test_is_fractional() {
        assert!(is_fractional(0.5, 1e-6));
        assert!(!is_fractional(2.0 + 1e-9, 1e-6));
        assert!(!is_fractional(-3.0, 1e-6));
    }
}
