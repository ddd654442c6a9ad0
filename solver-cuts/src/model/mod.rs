//! Constraint and cut types shared by every generator.

mod constraint;
mod cut;
mod linear;

pub use constraint::{CircuitArc, Constraint};
pub use cut::{Cut, CutBody, CutSource, FractionalCut, RawCut};
pub use linear::{CutSignature, LinearConstraint, LinearTerm, VarId};
