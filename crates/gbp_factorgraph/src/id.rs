//! Identifiers for variables and factors.
//!
//! Every id is scoped to the [`FactorGraph`](crate::graph::FactorGraph)
//! instance that minted it: regenerating a graph's topology between frames
//! starts fresh, rather than drawing from a process-wide counter that could
//! clash with ids a previous graph instance handed out.

use std::sync::atomic::{AtomicU32, Ordering};

use petgraph::stable_graph::NodeIndex;

static NEXT_GRAPH_ID: AtomicU32 = AtomicU32::new(0);

/// Distinguishes one `FactorGraph` instance from another. Variable and
/// factor ids embed their owning graph's id so that an id from a stale
/// graph can never be mistaken for one from its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FactorGraphId(u32);

impl FactorGraphId {
    pub(crate) fn next() -> Self {
        Self(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifies a variable node within a single factor graph.
///
/// Wraps a `petgraph` `NodeIndex`, which is already stable across removal of
/// other nodes; the wrapper just keeps that index from leaking out as a raw
/// graph-library type and ties it to the owning graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId {
    graph: FactorGraphId,
    index: NodeIndex,
}

impl VariableId {
    pub(crate) fn new(graph: FactorGraphId, index: NodeIndex) -> Self {
        Self { graph, index }
    }

    #[must_use]
    pub fn graph(&self) -> FactorGraphId {
        self.graph
    }

    pub(crate) fn node_index(&self) -> NodeIndex {
        self.index
    }
}

/// Identifies a factor node within a single factor graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FactorId {
    graph: FactorGraphId,
    index: NodeIndex,
}

impl FactorId {
    pub(crate) fn new(graph: FactorGraphId, index: NodeIndex) -> Self {
        Self { graph, index }
    }

    #[must_use]
    pub fn graph(&self) -> FactorGraphId {
        self.graph
    }

    pub(crate) fn node_index(&self) -> NodeIndex {
        self.index
    }
}
