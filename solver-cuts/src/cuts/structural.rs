//! Structural cuts for all-different and circuit constraints.
//!
//! All-different: for any subset `S` of the variables, `Σ_S x` is at least
//! the sum of the `|S|` smallest distinct values in the union of their
//! domains, and at most the sum of the `|S|` largest. The subsets tried are
//! the prefixes of the variables sorted by relaxation value.
//!
//! Circuit: the arcs with positive value split the nodes into connected
//! components. For a proper component `S` with mandatory nodes on both
//! sides, any circuit leaves and enters `S` at least once.

use petgraph::unionfind::UnionFind;
use rustc_hash::FxHashMap;

use crate::cuts::{ensure_known_vars, is_fractional, CutGenerator, GeneratorStats};
use crate::error::{CutError, CutResult};
use crate::model::{CircuitArc, Constraint, CutSource, LinearConstraint, RawCut, VarId};
use crate::numeric::NumericGuard;
use crate::relaxation::RelaxationSnapshot;
use crate::settings::GeneratorKind;

/// All-different and circuit cut generator.
pub struct StructuralGenerator {
    /// Tolerance for integral relaxation values.
    integrality_tolerance: f64,

    /// Statistics.
    stats: GeneratorStats,
}

impl StructuralGenerator {
    /// Create a new structural generator.
    pub fn new(integrality_tolerance: f64) -> Self {
        Self {
            integrality_tolerance,
            stats: GeneratorStats::default(),
        }
    }

    /// Most violated prefix bound in each direction.
    fn all_different(
        &self,
        vars: &[VarId],
        snapshot: &RelaxationSnapshot,
        guard: &NumericGuard,
    ) -> Vec<LinearConstraint> {
        let mut domains = Vec::with_capacity(vars.len());
        for &var in vars {
            match (snapshot.get(var), snapshot.lower_bound(var), snapshot.upper_bound(var)) {
                (Some(v), Some(l), Some(u)) if v.is_integer => domains.push((var, v.value, l, u)),
                _ => return Vec::new(),
            }
        }
        if domains.len() < 2
            || !domains
                .iter()
                .any(|d| is_fractional(d.1, self.integrality_tolerance))
        {
            return Vec::new();
        }

        let mut cuts = Vec::new();

        // Lower side: smallest values first.
        domains.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        if let Some((k, bound)) = most_violated_prefix(&domains, guard, Direction::AtLeast) {
            let terms = domains[..k].iter().map(|d| (1, d.0));
            cuts.extend(LinearConstraint::greater_or_equal(terms, bound).ok());
        }

        // Upper side: largest values first.
        domains.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        if let Some((k, bound)) = most_violated_prefix(&domains, guard, Direction::AtMost) {
            let terms = domains[..k].iter().map(|d| (1, d.0));
            cuts.extend(LinearConstraint::less_or_equal(terms, bound).ok());
        }

        cuts
    }

    /// Outgoing and incoming cuts for every proper component.
    fn circuit(
        &self,
        num_nodes: usize,
        arcs: &[CircuitArc],
        snapshot: &RelaxationSnapshot,
        guard: &NumericGuard,
    ) -> Vec<LinearConstraint> {
        if num_nodes < 2 {
            return Vec::new();
        }

        let mut optional = vec![false; num_nodes];
        let mut components = UnionFind::<usize>::new(num_nodes);
        for arc in arcs {
            if arc.tail == arc.head {
                optional[arc.tail] = true;
            } else if snapshot.value(arc.literal) > self.integrality_tolerance {
                components.union(arc.tail, arc.head);
            }
        }

        // Components keyed by root, ordered by their smallest node.
        let mut order: Vec<usize> = Vec::new();
        let mut members: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for node in 0..num_nodes {
            let root = components.find(node);
            members
                .entry(root)
                .or_insert_with(|| {
                    order.push(root);
                    Vec::new()
                })
                .push(node);
        }
        if order.len() < 2 {
            return Vec::new();
        }

        let mandatory_total = optional.iter().filter(|&&o| !o).count();
        let mut cuts = Vec::new();

        for root in order {
            let nodes = &members[&root];
            let mandatory_inside = nodes.iter().filter(|&&n| !optional[n]).count();
            if mandatory_inside == 0 || mandatory_inside == mandatory_total {
                continue;
            }

            let mut inside = vec![false; num_nodes];
            for &n in nodes {
                inside[n] = true;
            }

            let leaving = arcs
                .iter()
                .filter(|a| inside[a.tail] && !inside[a.head])
                .map(|a| a.literal);
            cuts.extend(crossing_cut(leaving, snapshot, guard));

            let entering = arcs
                .iter()
                .filter(|a| !inside[a.tail] && inside[a.head])
                .map(|a| a.literal);
            cuts.extend(crossing_cut(entering, snapshot, guard));
        }

        cuts
    }
}

/// `Σ literals >= 1` if the literals exist and the cut is violated.
fn crossing_cut(
    literals: impl Iterator<Item = VarId>,
    snapshot: &RelaxationSnapshot,
    guard: &NumericGuard,
) -> Option<LinearConstraint> {
    let terms: Vec<(i64, VarId)> = literals.map(|l| (1, l)).collect();
    if terms.is_empty() {
        return None;
    }
    let cut = LinearConstraint::greater_or_equal(terms, 1).ok()?;
    guard.is_violated(cut.violation(snapshot)).then_some(cut)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    AtLeast,
    AtMost,
}

/// Prefix length and bound of the most violated prefix inequality, if any.
fn most_violated_prefix(
    domains: &[(VarId, f64, i64, i64)],
    guard: &NumericGuard,
    direction: Direction,
) -> Option<(usize, i64)> {
    let mut best: Option<(usize, i64, f64)> = None;
    let mut sum = 0.0;

    for k in 1..=domains.len() {
        sum += domains[k - 1].1;
        if k < 2 {
            continue;
        }
        let intervals = domains[..k]
            .iter()
            .map(|d| (i128::from(d.2), i128::from(d.3)));
        let bound = match direction {
            Direction::AtLeast => min_distinct_sum(intervals, k),
            Direction::AtMost => {
                let mirrored = intervals.map(|(l, u)| (-u, -l));
                min_distinct_sum(mirrored, k).map(|s| -s)
            }
        };
        let Some(bound) = bound.and_then(|b| guard.fit(b)) else {
            continue;
        };
        let violation = match direction {
            Direction::AtLeast => bound as f64 - sum,
            Direction::AtMost => sum - bound as f64,
        };
        if guard.is_violated(violation) && best.map_or(true, |b| violation > b.2) {
            best = Some((k, bound, violation));
        }
    }

    best.map(|(k, bound, _)| (k, bound))
}

/// Sum of the `k` smallest distinct integers in the union of `intervals`.
///
/// `None` if the union has fewer than `k` values.
fn min_distinct_sum(intervals: impl Iterator<Item = (i128, i128)>, k: usize) -> Option<i128> {
    let mut intervals: Vec<(i128, i128)> = intervals.filter(|(l, u)| l <= u).collect();
    intervals.sort_unstable();

    let mut merged: Vec<(i128, i128)> = Vec::with_capacity(intervals.len());
    for (l, u) in intervals {
        match merged.last_mut() {
            Some(last) if l <= last.1 + 1 => last.1 = last.1.max(u),
            _ => merged.push((l, u)),
        }
    }

    let mut remaining = i128::try_from(k).ok()?;
    let mut sum = 0i128;
    for (l, u) in merged {
        let take = remaining.min(u - l + 1);
        // take * l + take * (take - 1) / 2
        let run = take
            .checked_mul(l)?
            .checked_add(take.checked_mul(take - 1)? / 2)?;
        sum = sum.checked_add(run)?;
        remaining -= take;
        if remaining == 0 {
            return Some(sum);
        }
    }
    None
}

impl CutGenerator for StructuralGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Structural
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
            let found = match constraint {
                Constraint::AllDifferent(vars) => {
                    ensure_known_vars(snapshot, constraint, index)?;
                    self.all_different(vars, snapshot, guard)
                        .into_iter()
                        .map(|c| RawCut::integral(c, CutSource::AllDifferent { constraint: index }))
                        .collect::<Vec<_>>()
                }
                Constraint::Circuit { num_nodes, arcs } => {
                    ensure_known_vars(snapshot, constraint, index)?;
                    if let Some(arc) = arcs.iter().find(|a| a.tail >= *num_nodes || a.head >= *num_nodes) {
                        return Err(CutError::MalformedConstraint(format!(
                            "circuit constraint {index} has arc {} -> {} outside {num_nodes} nodes",
                            arc.tail, arc.head
                        )));
                    }
                    self.circuit(*num_nodes, arcs, snapshot, guard)
                        .into_iter()
                        .map(|c| RawCut::integral(c, CutSource::Circuit { constraint: index }))
                        .collect()
                }
                _ => continue,
            };

            if found.is_empty() {
                self.stats.rows_skipped += 1;
            }
            cuts.extend(found);
        }

        self.stats.cuts_generated += cuts.len();
        Ok(cuts)
    }

    fn stats(&self) -> &GeneratorStats {
        &self.stats
    }
}
