//! Exact-integer linear expressions and constraints.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::{FxHashMap, FxHasher};

use crate::error::{CutError, CutResult};
use crate::relaxation::RelaxationSnapshot;

/// Opaque reference to a variable of the bound tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub usize);

impl VarId {
    /// Position of the variable in the snapshot.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for VarId {
    fn from(index: usize) -> Self {
        VarId(index)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A single `coefficient * variable` term. The coefficient is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinearTerm {
    /// Nonzero integer coefficient.
    pub coefficient: i64,

    /// Variable the coefficient applies to.
    pub var: VarId,
}

impl LinearTerm {
    /// Create a term.
    pub fn new(coefficient: i64, var: VarId) -> Self {
        Self { coefficient, var }
    }
}

/// A linear constraint `lower <= Σ a_i x_i <= upper` with exact integer data.
///
/// Terms are variable-unique and keep the order in which variables first
/// appeared. A `None` bound is infinite; at least one bound is finite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinearConstraint {
    terms: Vec<LinearTerm>,
    lower: Option<i64>,
    upper: Option<i64>,
}

impl LinearConstraint {
    /// Build a constraint from `(coefficient, variable)` pairs.
    ///
    /// Duplicate variables are merged by summing their coefficients and zero
    /// terms are dropped.
    ///
    /// # Errors
    ///
    /// `MalformedConstraint` if both bounds are infinite or merging
    /// duplicate coefficients overflows.
    pub fn new<I>(terms: I, lower: Option<i64>, upper: Option<i64>) -> CutResult<Self>
    where
        I: IntoIterator<Item = (i64, VarId)>,
    {
        if lower.is_none() && upper.is_none() {
            return Err(CutError::MalformedConstraint(
                "constraint has no finite bound".to_string(),
            ));
        }

        let mut merged: Vec<LinearTerm> = Vec::new();
        let mut position: FxHashMap<VarId, usize> = FxHashMap::default();
        for (coefficient, var) in terms {
            match position.get(&var) {
                Some(&i) => {
                    let sum = merged[i].coefficient.checked_add(coefficient).ok_or_else(|| {
                        CutError::MalformedConstraint(format!(
                            "coefficient overflow while merging terms on {var}"
                        ))
                    })?;
                    merged[i].coefficient = sum;
                }
                None => {
                    position.insert(var, merged.len());
                    merged.push(LinearTerm::new(coefficient, var));
                }
            }
        }
        merged.retain(|t| t.coefficient != 0);

        Ok(Self {
            terms: merged,
            lower,
            upper,
        })
    }

    /// `Σ terms <= upper`.
    pub fn less_or_equal<I>(terms: I, upper: i64) -> CutResult<Self>
    where
        I: IntoIterator<Item = (i64, VarId)>,
    {
        Self::new(terms, None, Some(upper))
    }

    /// `Σ terms >= lower`.
    pub fn greater_or_equal<I>(terms: I, lower: i64) -> CutResult<Self>
    where
        I: IntoIterator<Item = (i64, VarId)>,
    {
        Self::new(terms, Some(lower), None)
    }

    /// Build from terms already known to be variable-unique and nonzero.
    pub(crate) fn from_parts(terms: Vec<LinearTerm>, lower: Option<i64>, upper: Option<i64>) -> Self {
        debug_assert!(lower.is_some() || upper.is_some());
        debug_assert!(terms.iter().all(|t| t.coefficient != 0));
        Self {
            terms,
            lower,
            upper,
        }
    }

    /// Terms in order.
    pub fn terms(&self) -> &[LinearTerm] {
        &self.terms
    }

    /// Lower bound, `None` if infinite.
    pub fn lower(&self) -> Option<i64> {
        self.lower
    }

    /// Upper bound, `None` if infinite.
    pub fn upper(&self) -> Option<i64> {
        self.upper
    }

    /// Number of nonzero terms.
    pub fn support_size(&self) -> usize {
        self.terms.len()
    }

    /// Returns true if the constraint has no terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Coefficient of `var`, zero if absent.
    pub fn coefficient(&self, var: VarId) -> i64 {
        self.terms
            .iter()
            .find(|t| t.var == var)
            .map_or(0, |t| t.coefficient)
    }

    /// Activity `Σ a_i x*_i` at the snapshot point.
    pub fn activity(&self, snapshot: &RelaxationSnapshot) -> f64 {
        self.terms
            .iter()
            .map(|t| t.coefficient as f64 * snapshot.value(t.var))
            .sum()
    }

    /// Amount by which the snapshot point violates the constraint.
    ///
    /// Positive means violated; the larger side wins for two-sided
    /// constraints.
    pub fn violation(&self, snapshot: &RelaxationSnapshot) -> f64 {
        let activity = self.activity(snapshot);
        let above = self.upper.map_or(f64::NEG_INFINITY, |u| activity - u as f64);
        let below = self.lower.map_or(f64::NEG_INFINITY, |l| l as f64 - activity);
        above.max(below)
    }

    /// Euclidean norm of the coefficient vector.
    pub fn norm(&self) -> f64 {
        self.terms
            .iter()
            .map(|t| {
                let c = t.coefficient as f64;
                c * c
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Multiply the constraint by -1, swapping the bounds.
    ///
    /// Returns `None` if a value has no negation (`i64::MIN`).
    pub fn negated(&self) -> Option<Self> {
        let terms = self
            .terms
            .iter()
            .map(|t| t.coefficient.checked_neg().map(|c| LinearTerm::new(c, t.var)))
            .collect::<Option<Vec<_>>>()?;
        let lower = match self.upper {
            Some(u) => Some(u.checked_neg()?),
            None => None,
        };
        let upper = match self.lower {
            Some(l) => Some(l.checked_neg()?),
            None => None,
        };
        Some(Self::from_parts(terms, lower, upper))
    }

    /// The constraint as one or two `Σ terms <= rhs` rows.
    ///
    /// The upper side comes first; the lower side is negated. Sides whose
    /// negation is not representable are skipped.
    pub fn upper_rows(&self) -> Vec<(Vec<LinearTerm>, i64)> {
        let mut rows = Vec::with_capacity(2);
        if let Some(upper) = self.upper {
            rows.push((self.terms.clone(), upper));
        }
        if let Some(lower) = self.lower {
            let negated = self
                .terms
                .iter()
                .map(|t| t.coefficient.checked_neg().map(|c| LinearTerm::new(c, t.var)))
                .collect::<Option<Vec<_>>>();
            if let (Some(terms), Some(rhs)) = (negated, lower.checked_neg()) {
                rows.push((terms, rhs));
            }
        }
        rows
    }

    /// Canonical form: terms sorted by variable index and sign chosen so the
    /// leading coefficient is positive.
    pub fn canonical(&self) -> Self {
        let mut terms = self.terms.clone();
        terms.sort_by_key(|t| t.var);
        let sorted = Self::from_parts(terms, self.lower, self.upper);

        match sorted.terms.first() {
            Some(lead) if lead.coefficient < 0 => sorted.negated().unwrap_or(sorted),
            _ => sorted,
        }
    }

    /// Hashable canonical signature used for deduplication.
    pub fn signature(&self) -> CutSignature {
        CutSignature::new(self.canonical())
    }
}

impl fmt::Display for LinearConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(lower) = self.lower {
            write!(f, "{lower} <= ")?;
        }
        if self.terms.is_empty() {
            write!(f, "0")?;
        }
        for (i, term) in self.terms.iter().enumerate() {
            let c = term.coefficient;
            match (i, c < 0) {
                (0, _) => write!(f, "{c}*{}", term.var)?,
                (_, true) => write!(f, " - {}*{}", -i128::from(c), term.var)?,
                (_, false) => write!(f, " + {c}*{}", term.var)?,
            }
        }
        if let Some(upper) = self.upper {
            write!(f, " <= {upper}")?;
        }
        Ok(())
    }
}

/// Canonical form of a constraint with a precomputed hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutSignature {
    canonical: LinearConstraint,
    hash: u64,
}

impl CutSignature {
    fn new(canonical: LinearConstraint) -> Self {
        let mut hasher = FxHasher::default();
        canonical.hash(&mut hasher);
        Self {
            hash: hasher.finish(),
            canonical,
        }
    }

    /// The canonical constraint.
    pub fn canonical(&self) -> &LinearConstraint {
        &self.canonical
    }

    /// Structural hash of the canonical form.
    pub fn hash_value(&self) -> u64 {
        self.hash
    }
}

impl Hash for CutSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relaxation::SnapshotBuilder;

    #[test]
    fn test_merge_and_drop_zero() {
        let c = LinearConstraint::less_or_equal(
            [(2, VarId(1)), (3, VarId(0)), (-2, VarId(1)), (4, VarId(0))],
            5,
        )
        .unwrap();
        assert_eq!(c.terms(), &[LinearTerm::new(7, VarId(0))]);
        assert_eq!(c.upper(), Some(5));
        assert_eq!(c.lower(), None);
    }

    #[test]
    fn test_no_finite_bound_is_malformed() {
        let err = LinearConstraint::new([(1, VarId(0))], None, None).unwrap_err();
        assert!(matches!(err, CutError::MalformedConstraint(_)));

        let err = LinearConstraint::new(Vec::<(i64, VarId)>::new(), None, None).unwrap_err();
        assert!(matches!(err, CutError::MalformedConstraint(_)));
    }

    #[test]
    fn test_merge_overflow_is_malformed() {
        let err = LinearConstraint::less_or_equal([(i64::MAX, VarId(0)), (1, VarId(0))], 0)
            .unwrap_err();
        assert!(matches!(err, CutError::MalformedConstraint(_)));
    }

    #[test]
    fn test_activity_and_violation() {
        let mut builder = SnapshotBuilder::new(0);
        let x = builder.add_integer(0.6, 0, 1);
        let y = builder.add_integer(0.6, 0, 1);
        let snapshot = builder.build();

        let c = LinearConstraint::less_or_equal([(1, x), (1, y)], 1).unwrap();
        assert!((c.activity(&snapshot) - 1.2).abs() < 1e-12);
        assert!((c.violation(&snapshot) - 0.2).abs() < 1e-12);

        let c = LinearConstraint::new([(1, x), (1, y)], Some(2), Some(3)).unwrap();
        assert!((c.violation(&snapshot) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_canonical_sign_and_order() {
        let c = LinearConstraint::less_or_equal([(3, VarId(2)), (-2, VarId(0))], 4).unwrap();
        let canon = c.canonical();
        assert_eq!(
            canon.terms(),
            &[LinearTerm::new(2, VarId(0)), LinearTerm::new(-3, VarId(2))]
        );
        assert_eq!(canon.lower(), Some(-4));
        assert_eq!(canon.upper(), None);
    }

    #[test]
    fn test_signature_equal_for_equivalent_forms() {
        let a = LinearConstraint::less_or_equal([(1, VarId(0)), (1, VarId(1))], 1).unwrap();
        let b = LinearConstraint::greater_or_equal([(-1, VarId(1)), (-1, VarId(0))], -1).unwrap();
        assert_eq!(a.signature(), b.signature());
        assert_eq!(a.signature().hash_value(), b.signature().hash_value());

        let c = LinearConstraint::less_or_equal([(1, VarId(0)), (1, VarId(1))], 2).unwrap();
        assert_ne!(a.signature(), c.signature());
    }

    #[test]
    fn test_upper_rows() {
        let c = LinearConstraint::new([(2, VarId(0)), (-1, VarId(1))], Some(-3), Some(5)).unwrap();
        let rows = c.upper_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1, 5);
        assert_eq!(rows[1].0[0].coefficient, -2);
        assert_eq!(rows[1].0[1].coefficient, 1);
        assert_eq!(rows[1].1, 3);
    }

    #[test]
    fn test_display() {
        let c = LinearConstraint::less_or_equal([(1, VarId(1)), (-2, VarId(3))], 1).unwrap();
        assert_eq!(c.to_string(), "1*x1 - 2*x3 <= 1");
    }
}
