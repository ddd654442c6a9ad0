//! Interfaces consumed from the relaxation solver, the bound tracker and the
//! time-limit object.

use std::time::{Duration, Instant};

use super::{BasisStatus, ImpliedBound};
use crate::model::VarId;

/// Source of relaxation values. Only queried between relaxation solves.
pub trait RelaxationSolver {
    /// Number of variables in the relaxation.
    fn num_variables(&self) -> usize;

    /// Current relaxation value of `var`.
    fn value(&self, var: VarId) -> f64;

    /// Basis status of `var`, if the solver exposes one.
    fn basis_status(&self, _var: VarId) -> Option<BasisStatus> {
        None
    }

    /// Reduced cost of `var`, if the solver exposes one.
    fn reduced_cost(&self, _var: VarId) -> Option<f64> {
        None
    }
}

/// Current integer bounds per variable.
///
/// Bounds are assumed consistent (`lower <= upper`) for the whole round.
pub trait BoundTracker {
    /// Lower bound, `None` if unbounded below.
    fn lower_bound(&self, var: VarId) -> Option<i64>;

    /// Upper bound, `None` if unbounded above.
    fn upper_bound(&self, var: VarId) -> Option<i64>;

    /// Whether `var` is restricted to integer values.
    fn is_integer(&self, _var: VarId) -> bool {
        true
    }

    /// Known relations `var <= capacity * indicator`.
    fn implied_upper_bounds(&self) -> Vec<ImpliedBound> {
        Vec::new()
    }
}

/// Non-blocking view of the global time budget.
pub trait TimeLimit {
    /// Returns true once the budget is exhausted.
    fn limit_reached(&self) -> bool;

    /// Time left, `None` if unlimited.
    fn time_remaining(&self) -> Option<Duration>;
}

/// Wall-clock budget measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct WallClockLimit {
    start: Instant,
    budget: Duration,
}

impl WallClockLimit {
    /// Start a budget of `budget` from now. A zero budget is exhausted
    /// immediately.
    pub fn new(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// Budget in milliseconds.
    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Time elapsed since construction.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl TimeLimit for WallClockLimit {
    #[inline]
    fn limit_reached(&self) -> bool {
        self.start.elapsed() >= self.budget
    }

    fn time_remaining(&self) -> Option<Duration> {
        Some(self.budget.saturating_sub(self.start.elapsed()))
    }
}

/// A time limit that never expires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTimeLimit;

impl TimeLimit for NoTimeLimit {
    #[inline]
    fn limit_reached(&self) -> bool {
        false
    }

    fn time_remaining(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_is_exhausted() {
        let limit = WallClockLimit::new(Duration::ZERO);
        assert!(limit.limit_reached());
        assert_eq!(limit.time_remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_generous_budget() {
        let limit = WallClockLimit::new(Duration::from_secs(3600));
        assert!(!limit.limit_reached());
        assert!(limit.time_remaining().unwrap() > Duration::from_secs(3000));
    }

    #[test]
    fn test_no_time_limit() {
        assert!(!NoTimeLimit.limit_reached());
        assert_eq!(NoTimeLimit.time_remaining(), None);
    }
}
