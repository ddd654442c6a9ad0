//! Per-round relaxation snapshot.
//!
//! A snapshot is built once per cut round and only read afterwards. It must
//! not be used once its round has ended; the cut manager refuses snapshots
//! whose round is not newer than the last completed one.

use rustc_hash::FxHashMap;

use super::{BoundTracker, RelaxationSolver};
use crate::model::VarId;

/// Basis status reported by the relaxation solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisStatus {
    /// Variable is basic.
    Basic,

    /// Nonbasic at its lower bound.
    AtLower,

    /// Nonbasic at its upper bound.
    AtUpper,

    /// Nonbasic with equal bounds.
    Fixed,

    /// Nonbasic and free.
    Free,
}

/// Implied upper bound `var <= capacity * indicator` with binary `indicator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpliedBound {
    /// Bounded variable.
    pub var: VarId,

    /// Binary indicator variable.
    pub indicator: VarId,

    /// Upper bound of `var` when the indicator is one.
    pub capacity: i64,
}

/// Relaxation data of a single variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarSnapshot {
    /// Relaxation value.
    pub value: f64,

    /// Lower bound, `None` if unbounded.
    pub lower: Option<i64>,

    /// Upper bound, `None` if unbounded.
    pub upper: Option<i64>,

    /// Whether the variable is integral.
    pub is_integer: bool,

    /// Value sits on the lower bound (within the capture tolerance).
    pub at_lower: bool,

    /// Value sits on the upper bound (within the capture tolerance).
    pub at_upper: bool,

    /// Optional basis status.
    pub basis: Option<BasisStatus>,

    /// Optional reduced cost.
    pub reduced_cost: Option<f64>,
}

impl VarSnapshot {
    /// Integer variable with the given value and bounds.
    pub fn integer(value: f64, lower: i64, upper: i64) -> Self {
        Self::new(value, Some(lower), Some(upper), true)
    }

    /// Continuous variable with the given value and bounds.
    pub fn continuous(value: f64, lower: Option<i64>, upper: Option<i64>) -> Self {
        Self::new(value, lower, upper, false)
    }

    fn new(value: f64, lower: Option<i64>, upper: Option<i64>, is_integer: bool) -> Self {
        Self {
            value,
            lower,
            upper,
            is_integer,
            at_lower: false,
            at_upper: false,
            basis: None,
            reduced_cost: None,
        }
    }

    /// Set the at-bound flags from the value.
    fn with_bound_flags(mut self, tolerance: f64) -> Self {
        self.at_lower = self
            .lower
            .is_some_and(|l| (self.value - l as f64).abs() <= tolerance);
        self.at_upper = self
            .upper
            .is_some_and(|u| (self.value - u as f64).abs() <= tolerance);
        self
    }

    /// Both bounds finite and equal.
    pub fn is_fixed(&self) -> bool {
        matches!((self.lower, self.upper), (Some(l), Some(u)) if l == u)
    }

    /// `upper - lower` when both are finite.
    pub fn range(&self) -> Option<i128> {
        match (self.lower, self.upper) {
            (Some(l), Some(u)) => Some(i128::from(u) - i128::from(l)),
            _ => None,
        }
    }
}

/// Immutable per-round view of the relaxation and the variable bounds.
#[derive(Debug, Clone)]
pub struct RelaxationSnapshot {
    round: u64,
    vars: Vec<VarSnapshot>,
    implied: Vec<ImpliedBound>,
    implied_index: FxHashMap<VarId, usize>,
}

impl RelaxationSnapshot {
    /// Capture the snapshot for `round` from the external collaborators.
    ///
    /// `tolerance` decides the at-bound flags.
    pub fn capture<R, B>(round: u64, relaxation: &R, bounds: &B, tolerance: f64) -> Self
    where
        R: RelaxationSolver + ?Sized,
        B: BoundTracker + ?Sized,
    {
        let vars = (0..relaxation.num_variables())
            .map(VarId)
            .map(|var| VarSnapshot {
                value: relaxation.value(var),
                lower: bounds.lower_bound(var),
                upper: bounds.upper_bound(var),
                is_integer: bounds.is_integer(var),
                at_lower: false,
                at_upper: false,
                basis: relaxation.basis_status(var),
                reduced_cost: relaxation.reduced_cost(var),
            }
            .with_bound_flags(tolerance))
            .collect();

        Self::from_parts(round, vars, bounds.implied_upper_bounds())
    }

    /// Start building a snapshot by hand.
    pub fn builder(round: u64) -> SnapshotBuilder {
        SnapshotBuilder::new(round)
    }

    fn from_parts(round: u64, vars: Vec<VarSnapshot>, implied: Vec<ImpliedBound>) -> Self {
        let mut implied_index = FxHashMap::default();
        for (i, bound) in implied.iter().enumerate() {
            // First relation per variable wins.
            implied_index.entry(bound.var).or_insert(i);
        }
        Self {
            round,
            vars,
            implied,
            implied_index,
        }
    }

    /// Round the snapshot was built for.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Returns true if `var` is known to the snapshot.
    #[inline]
    pub fn contains(&self, var: VarId) -> bool {
        var.index() < self.vars.len()
    }

    /// Data of `var`, `None` if unknown.
    #[inline]
    pub fn get(&self, var: VarId) -> Option<&VarSnapshot> {
        self.vars.get(var.index())
    }

    /// Relaxation value of `var`; NaN if unknown.
    #[inline]
    pub fn value(&self, var: VarId) -> f64 {
        self.get(var).map_or(f64::NAN, |v| v.value)
    }

    /// Lower bound of `var`.
    #[inline]
    pub fn lower_bound(&self, var: VarId) -> Option<i64> {
        self.get(var).and_then(|v| v.lower)
    }

    /// Upper bound of `var`.
    #[inline]
    pub fn upper_bound(&self, var: VarId) -> Option<i64> {
        self.get(var).and_then(|v| v.upper)
    }

    /// Whether `var` is integral; unknown variables are not.
    #[inline]
    pub fn is_integer(&self, var: VarId) -> bool {
        self.get(var).is_some_and(|v| v.is_integer)
    }

    /// Whether `var` has equal finite bounds.
    pub fn is_fixed(&self, var: VarId) -> bool {
        self.get(var).is_some_and(VarSnapshot::is_fixed)
    }

    /// Whether `var` sits on its lower bound.
    pub fn is_at_lower(&self, var: VarId) -> bool {
        self.get(var).is_some_and(|v| v.at_lower)
    }

    /// Whether `var` sits on its upper bound.
    pub fn is_at_upper(&self, var: VarId) -> bool {
        self.get(var).is_some_and(|v| v.at_upper)
    }

    /// Basis status of `var`, if known.
    pub fn basis_status(&self, var: VarId) -> Option<BasisStatus> {
        self.get(var).and_then(|v| v.basis)
    }

    /// Reduced cost of `var`, if known.
    pub fn reduced_cost(&self, var: VarId) -> Option<f64> {
        self.get(var).and_then(|v| v.reduced_cost)
    }

    /// Returns true if `var` is integral and its value is within
    /// `tolerance` of an integer.
    pub fn is_integral_value(&self, var: VarId, tolerance: f64) -> bool {
        self.get(var)
            .is_some_and(|v| v.is_integer && (v.value - v.value.round()).abs() <= tolerance)
    }

    /// Binary variable: integral with bounds `[0, 1]`.
    pub fn is_binary(&self, var: VarId) -> bool {
        self.get(var)
            .is_some_and(|v| v.is_integer && v.lower == Some(0) && v.upper == Some(1))
    }

    /// All implied upper bounds.
    pub fn implied_bounds(&self) -> &[ImpliedBound] {
        &self.implied
    }

    /// Implied upper bound on `var`, if any.
    pub fn implied_bound(&self, var: VarId) -> Option<&ImpliedBound> {
        self.implied_index.get(&var).map(|&i| &self.implied[i])
    }
}

/// Hand-built snapshot, for embedders without a live relaxation solver.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    round: u64,
    tolerance: f64,
    vars: Vec<VarSnapshot>,
    implied: Vec<ImpliedBound>,
}

impl SnapshotBuilder {
    /// Default tolerance for the at-bound flags.
    pub const DEFAULT_TOLERANCE: f64 = 1e-9;

    /// Empty builder for `round`.
    pub fn new(round: u64) -> Self {
        Self {
            round,
            tolerance: Self::DEFAULT_TOLERANCE,
            vars: Vec::new(),
            implied: Vec::new(),
        }
    }

    /// Set the at-bound tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Add a variable and return its reference.
    pub fn add_var(&mut self, var: VarSnapshot) -> VarId {
        self.vars.push(var);
        VarId(self.vars.len() - 1)
    }

    /// Add an integer variable.
    pub fn add_integer(&mut self, value: f64, lower: i64, upper: i64) -> VarId {
        self.add_var(VarSnapshot::integer(value, lower, upper))
    }

    /// Add a binary variable.
    pub fn add_binary(&mut self, value: f64) -> VarId {
        self.add_integer(value, 0, 1)
    }

    /// Add a continuous variable.
    pub fn add_continuous(&mut self, value: f64, lower: Option<i64>, upper: Option<i64>) -> VarId {
        self.add_var(VarSnapshot::continuous(value, lower, upper))
    }

    /// Record `var <= capacity * indicator`.
    pub fn add_implied_bound(&mut self, var: VarId, indicator: VarId, capacity: i64) {
        self.implied.push(ImpliedBound {
            var,
            indicator,
            capacity,
        });
    }

    /// Finish the snapshot.
    pub fn build(self) -> RelaxationSnapshot {
        let tolerance = self.tolerance;
        let vars = self
            .vars
            .into_iter()
            .map(|v| v.with_bound_flags(tolerance))
            .collect();
        RelaxationSnapshot::from_parts(self.round, vars, self.implied)
    }
}
