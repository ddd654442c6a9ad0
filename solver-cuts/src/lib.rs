//! Cutting-plane generation for a hybrid CP/MIP solver.
//!
//! Given the fractional point of a linear relaxation and the problem
//! constraints, this crate derives linear inequalities that every
//! integer-feasible point satisfies but the relaxation point violates.
//! Supported cut families:
//!
//! - **Knapsack cover**: lifted cover inequalities on binary knapsack rows
//! - **Mixed-integer rounding (MIR)**: rounding of mixed integer rows
//! - **Flow cover**: single-node flow rows with implied variable upper bounds
//! - **Structural**: all-different bounds and circuit subtour elimination
//! - **Nonlinear**: secant/tangent cuts for squares, McCormick for products
//!
//! # Soundness
//!
//! Cut data is exact integer arithmetic throughout. Floating point is used
//! only to pick candidates: every fractional candidate is rounded to
//! integers and re-checked against the exact rounding bound before it can
//! be returned. All arithmetic runs through a [`NumericGuard`] that
//! abandons candidates leaving the safe range of the target integer width.
//!
//! # Example
//!
//! ```
//! use solver_cuts::{CutManager, CutSettings, LinearConstraint, NoTimeLimit, SnapshotBuilder};
//!
//! let mut builder = SnapshotBuilder::new(0);
//! let x1 = builder.add_binary(1.0);
//! let x2 = builder.add_binary(0.8);
//! let x3 = builder.add_binary(1.0);
//! let x4 = builder.add_binary(0.5);
//! let snapshot = builder.build();
//!
//! let row = LinearConstraint::less_or_equal([(3, x1), (5, x2), (4, x3), (6, x4)], 10)?;
//! let mut manager = CutManager::new(CutSettings::default())?;
//! let cuts = manager.run_round(&snapshot, &[row.into()], &NoTimeLimit)?;
//!
//! // The cover {x2, x4} gives x2 + x4 <= 1.
//! assert!(cuts.iter().any(|cut| {
//!     let c = &cut.constraint;
//!     c.support_size() == 2 && c.coefficient(x2) == 1 && c.coefficient(x4) == 1 && c.upper() == Some(1)
//! }));
//! # Ok::<(), solver_cuts::CutError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cuts;
pub mod error;
pub mod manager;
pub mod model;
pub mod numeric;
pub mod relaxation;
pub mod settings;
pub mod strengthen;

pub use cuts::{create_generator, CutGenerator, GeneratorStats};
pub use error::{CutError, CutResult};
pub use manager::{CutManager, CutManagerStats};
pub use model::{
    CircuitArc, Constraint, Cut, CutBody, CutSource, FractionalCut, LinearConstraint, LinearTerm,
    RawCut, VarId,
};
pub use numeric::{NumericGuard, NumericLimits};
pub use relaxation::{
    BoundTracker, ImpliedBound, NoTimeLimit, RelaxationSnapshot, RelaxationSolver, SnapshotBuilder,
    TimeLimit, WallClockLimit,
};
pub use settings::{CutPoolSettings, CutSettings, GeneratorKind, KnapsackSettings, MirSettings};
pub use strengthen::{StrengthenStats, Strengthener};
