//! The two kinds of node a factor graph's underlying graph structure holds.

use crate::{factor::Factor, variable::VariableNode};

/// Either half of the bipartite variable/factor graph, stored as one node
/// type so both can live in a single `petgraph` graph and be connected by
/// ordinary edges.
#[derive(Debug)]
pub enum Node {
    Variable(VariableNode),
    Factor(Factor),
}

impl Node {
    #[must_use]
    pub fn as_variable(&self) -> Option<&VariableNode> {
        match self {
            Self::Variable(v) => Some(v),
            Self::Factor(_) => None,
        }
    }

    #[must_use]
    pub fn as_variable_mut(&mut self) -> Option<&mut VariableNode> {
        match self {
            Self::Variable(v) => Some(v),
            Self::Factor(_) => None,
        }
    }

    #[must_use]
    pub fn as_factor(&self) -> Option<&Factor> {
        match self {
            Self::Factor(f) => Some(f),
            Self::Variable(_) => None,
        }
    }

    #[must_use]
    pub fn as_factor_mut(&mut self) -> Option<&mut Factor> {
        match self {
            Self::Factor(f) => Some(f),
            Self::Variable(_) => None,
        }
    }
}
