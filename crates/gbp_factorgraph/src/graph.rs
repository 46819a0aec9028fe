//! The factor graph itself: owns every variable and factor, resolves
//! adjacency, and drives synchronous rounds of message passing.

use std::collections::BTreeMap;

use gbp_gaussian::GaussianState;
use gbp_linalg::{Float, Matrix, Vector};
use petgraph::stable_graph::{NodeIndex, StableGraph};

use crate::{
    factor::{Factor, FactorError, JacobianFn, MeasurementFn},
    id::{FactorGraphId, FactorId, VariableId},
    node::Node,
    variable::VariableNode,
};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("variable {0:?} does not belong to this factor graph")]
    UnknownVariable(VariableId),
    #[error(transparent)]
    Factor(#[from] FactorError),
}

type Result<T> = std::result::Result<T, GraphError>;

/// Owns a flat collection of variable and factor nodes, connected by edges
/// recording adjacency. Variables and factors refer to each other only by
/// [`VariableId`]/[`FactorId`], never by reference, so topology mutation
/// (birth/death/merge between frames) never leaves a dangling pointer.
pub struct FactorGraph {
    id: FactorGraphId,
    graph: StableGraph<Node, (), petgraph::Undirected>,
}

impl Default for FactorGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FactorGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: FactorGraphId::next(),
            graph: StableGraph::default(),
        }
    }

    #[must_use]
    pub fn id(&self) -> FactorGraphId {
        self.id
    }

    /// Insert a new variable with the given dimension and optional prior
    /// (default `N(0, I)`).
    pub fn add_variable(&mut self, dim: usize, prior: Option<GaussianState>) -> VariableId {
        let placeholder = VariableNode::new(VariableId::new(self.id, NodeIndex::new(0)), dim, None);
        let idx = self.graph.add_node(Node::Variable(placeholder));
        let vid = VariableId::new(self.id, idx);
        self.graph[idx] = Node::Variable(VariableNode::new(vid, dim, prior));
        vid
    }

    /// Insert a new factor bound to `variables` (order matters: it fixes
    /// the block layout of the stacked Jacobian). Registers the factor's id
    /// in each adjacent variable's neighbor list.
    #[allow(clippy::too_many_arguments)]
    pub fn add_factor(
        &mut self,
        variables: Vec<VariableId>,
        measurement_fn: MeasurementFn,
        jacobian_fn: JacobianFn,
        measurement: Vector<Float>,
        measurement_covariance: Matrix<Float>,
        huber_enabled: bool,
        huber_epsilon: Option<Float>,
    ) -> Result<FactorId> {
        for &vid in &variables {
            if vid.graph() != self.id {
                return Err(GraphError::UnknownVariable(vid));
            }
        }
        let dims: Vec<usize> = variables
            .iter()
            .map(|v| {
                self.variable(*v)
                    .ok_or(GraphError::UnknownVariable(*v))
                    .map(VariableNode::dim)
            })
            .collect::<Result<_>>()?;

        let factor = Factor::new(
            variables.clone(),
            dims,
            measurement_fn,
            jacobian_fn,
            measurement,
            measurement_covariance,
            huber_enabled,
            huber_epsilon,
        )?;
        let idx = self.graph.add_node(Node::Factor(factor));
        let fid = FactorId::new(self.id, idx);

        for vid in variables {
            self.graph.add_edge(idx, vid.node_index(), ());
            if let Some(variable) = self.graph[vid.node_index()].as_variable_mut() {
                variable.add_neighbor(fid);
            }
        }
        Ok(fid)
    }

    #[must_use]
    pub fn variable(&self, id: VariableId) -> Option<&VariableNode> {
        self.graph.node_weight(id.node_index()).and_then(Node::as_variable)
    }

    #[must_use]
    pub fn variable_mut(&mut self, id: VariableId) -> Option<&mut VariableNode> {
        self.graph.node_weight_mut(id.node_index()).and_then(Node::as_variable_mut)
    }

    #[must_use]
    pub fn factor(&self, id: FactorId) -> Option<&Factor> {
        self.graph.node_weight(id.node_index()).and_then(Node::as_factor)
    }

    pub fn variable_ids(&self) -> impl Iterator<Item = VariableId> + '_ {
        let graph_id = self.id;
        self.graph.node_indices().filter_map(move |idx| {
            self.graph[idx].as_variable().map(|_| VariableId::new(graph_id, idx))
        })
    }

    pub fn factor_ids(&self) -> impl Iterator<Item = FactorId> + '_ {
        let graph_id = self.id;
        self.graph.node_indices().filter_map(move |idx| {
            self.graph[idx].as_factor().map(|_| FactorId::new(graph_id, idx))
        })
    }

    /// Remove a variable and every edge touching it. Used by the dynamic
    /// topology manager; callers are expected to regenerate factors
    /// afterwards rather than patch up the survivors' adjacency lists.
    pub fn remove_variable(&mut self, id: VariableId) -> Option<VariableNode> {
        self.graph.remove_node(id.node_index()).and_then(|node| match node {
            Node::Variable(v) => Some(v),
            Node::Factor(_) => None,
        })
    }

    pub fn remove_factor(&mut self, id: FactorId) -> Option<Factor> {
        self.graph.remove_node(id.node_index()).and_then(|node| match node {
            Node::Factor(f) => Some(f),
            Node::Variable(_) => None,
        })
    }

    /// Remove every factor node (and its edges), leaving the variables and
    /// their ids untouched. Mirrors the per-frame reset used by dynamic
    /// topology managers that discard and regenerate the whole factor list
    /// rather than patch it incrementally.
    pub fn clear_factors(&mut self) {
        for idx in self.factor_node_indices() {
            self.graph.remove_node(idx);
        }
        for idx in self.variable_node_indices() {
            if let Some(variable) = self.graph[idx].as_variable_mut() {
                variable.clear_neighbors();
            }
        }
    }

    fn factor_node_indices(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| matches!(self.graph[idx], Node::Factor(_)))
            .collect()
    }

    fn variable_node_indices(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| matches!(self.graph[idx], Node::Variable(_)))
            .collect()
    }

    /// One round: every factor relinearizes and recomputes its local
    /// potential from the previous round's inbox; every factor then
    /// computes its outgoing messages and delivers them; every variable
    /// updates its belief from this round's deliveries and sends its
    /// response back. The three phases run to completion in turn, which is
    /// what gives the round its "synchronous, no partial updates visible
    /// mid-round" semantics without needing an explicit double buffer.
    pub fn synchronous_iteration(&mut self) -> Result<()> {
        let factor_indices = self.factor_node_indices();

        for &idx in &factor_indices {
            if let Some(factor) = self.graph[idx].as_factor_mut() {
                factor.relinearize();
                factor.compute_factor()?;
            }
        }

        for &idx in &factor_indices {
            if let Some(factor) = self.graph[idx].as_factor_mut() {
                factor.compute_outgoing_messages();
            }
        }

        let mut factor_to_variable = Vec::new();
        for &idx in &factor_indices {
            let fid = FactorId::new(self.id, idx);
            if let Some(factor) = self.graph[idx].as_factor() {
                for (&vid, message) in factor.outbox() {
                    factor_to_variable.push((vid, fid, message.clone()));
                }
            }
        }
        for (vid, fid, message) in factor_to_variable {
            if let Some(variable) = self.graph[vid.node_index()].as_variable_mut() {
                variable.receive_message(fid, message);
            }
        }

        let variable_indices = self.variable_node_indices();
        let mut variable_to_factor = Vec::new();
        for &idx in &variable_indices {
            let vid = VariableId::new(self.id, idx);
            if let Some(variable) = self.graph[idx].as_variable_mut() {
                for (fid, message) in variable.update_belief() {
                    variable_to_factor.push((fid, vid, message));
                }
            }
        }
        for (fid, vid, message) in variable_to_factor {
            if let Some(factor) = self.graph[fid.node_index()].as_factor_mut() {
                factor.receive_message(vid, message);
            }
        }

        Ok(())
    }

    fn variable_means(&self) -> BTreeMap<VariableId, Vector<Float>> {
        self.variable_ids()
            .map(|vid| {
                let mean = self
                    .variable(vid)
                    .expect("vid came from variable_ids(), so the node exists")
                    .mean()
                    .clone();
                (vid, mean)
            })
            .collect()
    }

    /// Repeat [`Self::synchronous_iteration`] until the largest per-variable
    /// change in mean drops below `tolerance`, or `max_iterations` rounds
    /// have run. Returns the number of rounds actually used.
    pub fn fit(&mut self, max_iterations: usize, tolerance: Float) -> Result<usize> {
        let mut previous = self.variable_means();
        for iteration in 1..=max_iterations {
            self.synchronous_iteration()?;
            let current = self.variable_means();
            let max_delta = previous
                .iter()
                .map(|(id, prev_mean)| {
                    current.get(id).map_or(Float::INFINITY, |cur_mean| {
                        (cur_mean - prev_mean).iter().fold(0.0, |acc, x| Float::max(acc, x.abs()))
                    })
                })
                .fold(0.0, Float::max);

            if max_delta < tolerance {
                return Ok(iteration);
            }
            previous = current;
        }
        tracing::warn!(max_iterations, "fit reached the iteration cap before converging");
        Ok(max_iterations)
    }
}
