//! Read-only view of the relaxation and the external collaborators it is
//! built from.

mod interfaces;
mod snapshot;

pub use interfaces::{BoundTracker, NoTimeLimit, RelaxationSolver, TimeLimit, WallClockLimit};
pub use snapshot::{BasisStatus, ImpliedBound, RelaxationSnapshot, SnapshotBuilder, VarSnapshot};
