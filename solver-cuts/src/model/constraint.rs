//! Problem constraints as seen by the cut generators.

use super::{LinearConstraint, VarId};

/// One arc of a circuit constraint, selected when `literal` is one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitArc {
    /// Source node.
    pub tail: usize,

    /// Target node.
    pub head: usize,

    /// Binary variable selecting the arc. A self-loop marks the node as
    /// optional.
    pub literal: VarId,
}

/// A problem constraint handed to the generators.
///
/// Each generator picks out the variants it understands and ignores the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Linear constraint over integer or continuous variables.
    Linear(LinearConstraint),

    /// Linear constraint the model declares as a knapsack: its rows over
    /// complemented variables must have a nonnegative capacity.
    Knapsack(LinearConstraint),

    /// The listed integer variables take pairwise distinct values.
    AllDifferent(Vec<VarId>),

    /// The selected arcs form a single circuit through all mandatory nodes.
    Circuit {
        /// Number of nodes; arcs refer to nodes `0..num_nodes`.
        num_nodes: usize,
        /// Candidate arcs.
        arcs: Vec<CircuitArc>,
    },

    /// `square = base * base`.
    Square {
        /// Result variable.
        square: VarId,
        /// Variable being squared.
        base: VarId,
    },

    /// `product = left * right`.
    Product {
        /// Result variable.
        product: VarId,
        /// First factor.
        left: VarId,
        /// Second factor.
        right: VarId,
    },
}

impl Constraint {
    /// The linear constraint, if this is one (declared knapsacks included).
    pub fn as_linear(&self) -> Option<&LinearConstraint> {
        match self {
            Constraint::Linear(c) | Constraint::Knapsack(c) => Some(c),
            _ => None,
        }
    }

    /// Every variable the constraint mentions.
    pub fn vars(&self) -> Vec<VarId> {
        match self {
            Constraint::Linear(c) | Constraint::Knapsack(c) => {
                c.terms().iter().map(|t| t.var).collect()
            }
            Constraint::AllDifferent(vars) => vars.clone(),
            Constraint::Circuit { arcs, .. } => arcs.iter().map(|a| a.literal).collect(),
            Constraint::Square { square, base } => vec![*square, *base],
            Constraint::Product {
                product,
                left,
                right,
            } => vec![*product, *left, *right],
        }
    }
}

impl From<LinearConstraint> for Constraint {
    fn from(c: LinearConstraint) -> Self {
        Constraint::Linear(c)
    }
}
