//! Lifted knapsack cover cuts.
//!
//! A row `Σ a_j y_j <= b` over shifted variables (all `a_j > 0`) whose
//! binary items have total weight above `b` contains a cover `C`: a set of
//! items that cannot all be one. The cover inequality is
//!
//! ```text
//! Σ_{j ∈ C} y_j <= |C| - 1
//! ```
//!
//! and is sequentially up-lifted onto the remaining items. Non-binary terms
//! are nonnegative and relaxed away.

use crate::cuts::shifted::{ShiftRule, ShiftedRow};
use crate::cuts::{ensure_known_vars, is_fractional, CutGenerator, GeneratorStats};
use crate::error::{CutError, CutResult};
use crate::model::{Constraint, CutSource, LinearConstraint, LinearTerm, RawCut, VarId};
use crate::numeric::NumericGuard;
use crate::relaxation::RelaxationSnapshot;
use crate::settings::{GeneratorKind, KnapsackSettings};

/// One binary item of a knapsack row.
#[derive(Debug, Clone, Copy)]
struct Item {
    /// Position in the shifted row.
    position: usize,
    var: VarId,
    weight: i64,
    value: f64,
}

/// Knapsack cover cut generator.
pub struct KnapsackCoverGenerator {
    /// Settings.
    settings: KnapsackSettings,

    /// Tolerance for integral relaxation values.
    integrality_tolerance: f64,

    /// Statistics.
    stats: GeneratorStats,
}

impl KnapsackCoverGenerator {
    /// Create a new knapsack cover generator.
    pub fn new(settings: KnapsackSettings, integrality_tolerance: f64) -> Self {
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
        index: usize,
        declared: bool,
        snapshot: &RelaxationSnapshot,
        guard: &NumericGuard,
    ) -> CutResult<Option<LinearConstraint>> {
        let Some(row) = ShiftedRow::new(terms, rhs, snapshot, guard, ShiftRule::PositiveCoefficients)
        else {
            return Ok(None);
        };

        let capacity = row.rhs;
        if capacity < 0 {
            // Infeasible at the current bounds; only a declared knapsack is malformed.
            if declared {
                return Err(CutError::MalformedConstraint(format!(
                    "knapsack row of constraint {index} has negative capacity {capacity}"
                )));
            }
            return Ok(None);
        }

        let items: Vec<Item> = row
            .terms
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_integer && t.range == Some(1) && t.coefficient > 0)
            .map(|(position, t)| Item {
                position,
                var: t.var,
                weight: t.coefficient,
                value: t.value.min(1.0),
            })
            .collect();

        let total: i128 = items.iter().map(|i| i128::from(i.weight)).sum();
        if total <= i128::from(capacity) {
            return Ok(None);
        }
        if !items
            .iter()
            .any(|i| is_fractional(i.value, self.integrality_tolerance))
        {
            return Ok(None);
        }

        let Some(mut cover) = self.find_cover(&items, capacity) else {
            return Ok(None);
        };
        minimize_cover(&mut cover, &items, capacity);
        if cover.len() > self.settings.max_cover_size {
            return Ok(None);
        }

        let mut coefficients = vec![0i64; row.terms.len()];
        for &c in &cover {
            coefficients[items[c].position] = 1;
        }
        let cover_rhs = cover.len() as i64 - 1;

        if self.settings.lift {
            self.lift(&items, &cover, capacity, &mut coefficients);
        }

        let as_float: Vec<f64> = coefficients.iter().map(|&c| c as f64).collect();
        let violation = row.activity(&as_float) - cover_rhs as f64;
        if !guard.is_violated(violation) {
            return Ok(None);
        }

        let Some((terms, rhs)) = row.unshift(&coefficients, cover_rhs, guard) else {
            return Ok(None);
        };
        Ok(LinearConstraint::less_or_equal(terms, rhs).ok())
    }

    /// Greedy cover: fractional items by decreasing value, then items at one.
    ///
    /// Returns indices into `items`, or `None` if these items cannot exceed
    /// the capacity.
    fn find_cover(&self, items: &[Item], capacity: i64) -> Option<Vec<usize>> {
        let tol = self.integrality_tolerance;
        let mut fractional: Vec<usize> = (0..items.len())
            .filter(|&i| items[i].value > tol && items[i].value < 1.0 - tol)
            .collect();
        fractional.sort_by(|&a, &b| {
            items[b]
                .value
                .total_cmp(&items[a].value)
                .then(items[a].var.cmp(&items[b].var))
        });
        let mut at_one: Vec<usize> = (0..items.len())
            .filter(|&i| items[i].value >= 1.0 - tol)
            .collect();
        at_one.sort_by_key(|&i| items[i].var);

        let mut cover = Vec::new();
        let mut weight = 0i128;
        for i in fractional.into_iter().chain(at_one) {
            cover.push(i);
            weight += i128::from(items[i].weight);
            if weight > i128::from(capacity) {
                return Some(cover);
            }
        }
        None
    }

    /// Sequentially up-lift the cover inequality onto items outside it.
    ///
    /// Candidates with a positive value are lifted by decreasing value. The
    /// lifting coefficient of item `k` is `|C| - 1 - m`, where `m` is the
    /// largest left-hand side reachable within `capacity - w_k` by the
    /// items lifted so far.
    fn lift(&self, items: &[Item], cover: &[usize], capacity: i64, coefficients: &mut [i64]) {
        let limit = cover.len() - 1;
        if limit == 0 {
            return;
        }

        let mut in_cover = vec![false; items.len()];
        for &c in cover {
            in_cover[c] = true;
        }
        let mut candidates: Vec<usize> = (0..items.len())
            .filter(|&i| !in_cover[i] && items[i].value > self.integrality_tolerance)
            .collect();
        candidates.sort_by(|&a, &b| {
            items[b]
                .value
                .total_cmp(&items[a].value)
                .then(items[a].var.cmp(&items[b].var))
        });

        let mut members: Vec<(i128, usize)> = cover
            .iter()
            .map(|&c| (i128::from(items[c].weight), 1))
            .collect();

        for k in candidates {
            let residual = i128::from(capacity) - i128::from(items[k].weight);
            let alpha = if residual < 0 {
                limit
            } else {
                limit - max_value_within(&members, limit, residual)
            };
            if alpha > 0 {
                coefficients[items[k].position] = alpha as i64;
                members.push((i128::from(items[k].weight), alpha));
            }
        }
    }
}

/// Drop cover items, smallest value first, while the rest still exceeds
/// the capacity.
fn minimize_cover(cover: &mut Vec<usize>, items: &[Item], capacity: i64) {
    let mut weight: i128 = cover.iter().map(|&c| i128::from(items[c].weight)).sum();

    let mut order = cover.clone();
    order.sort_by(|&a, &b| {
        items[a]
            .value
            .total_cmp(&items[b].value)
            .then(items[b].var.cmp(&items[a].var))
    });

    for i in order {
        let w = i128::from(items[i].weight);
        if weight - w > i128::from(capacity) {
            weight -= w;
            cover.retain(|&c| c != i);
        }
    }
}

/// Largest `Σ coef` over subsets of `members` with total weight at most
/// `residual`, capped at `limit`.
fn max_value_within(members: &[(i128, usize)], limit: usize, residual: i128) -> usize {
    // min_weight[v]: lightest subset reaching exactly v.
    let mut min_weight: Vec<Option<i128>> = vec![None; limit + 1];
    min_weight[0] = Some(0);

    for &(weight, coef) in members {
        for v in (coef..=limit).rev() {
            if let Some(base) = min_weight[v - coef] {
                let candidate = base + weight;
                if min_weight[v].map_or(true, |current| candidate < current) {
                    min_weight[v] = Some(candidate);
                }
            }
        }
    }

    (0..=limit)
        .rev()
        .find(|&v| min_weight[v].is_some_and(|w| w <= residual))
        .unwrap_or(0)
}

impl CutGenerator for KnapsackCoverGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::KnapsackCover
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
            let declared = matches!(constraint, Constraint::Knapsack(_));

            for (terms, rhs) in linear.upper_rows() {
                match self.separate_row(&terms, rhs, index, declared, snapshot, guard)? {
                    Some(cut) => cuts.push(RawCut::integral(
                        cut,
                        CutSource::KnapsackCover { constraint: index },
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
