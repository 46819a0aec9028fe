//! A variable node: a belief over a d-dimensional vector, updated from its
//! prior and the messages currently sitting in its inbox.

use gbp_gaussian::GaussianState;
use gbp_linalg::{Float, Matrix, Vector};

use crate::{
    id::{FactorId, VariableId},
    message::{FactorInbox, Message, VariableInbox},
};

#[derive(Debug)]
pub struct VariableNode {
    id: VariableId,
    dim: usize,
    prior: GaussianState,
    belief: GaussianState,
    /// (μ, Σ) as of the last successful belief readout. Retained verbatim
    /// across a round in which Λ turns out to be singular, so a transient
    /// numerical hiccup never produces a NaN-poisoned mean.
    cached_moments: (Vector<Float>, Matrix<Float>),
    neighbors: Vec<FactorId>,
    inbox: VariableInbox,
}

impl VariableNode {
    #[must_use]
    pub fn new(id: VariableId, dim: usize, prior: Option<GaussianState>) -> Self {
        let prior = prior.unwrap_or_else(|| GaussianState::new(dim));
        let belief = prior.clone();
        let cached_moments = belief
            .to_moments()
            .unwrap_or_else(|_| (Vector::zeros(dim), Matrix::eye(dim)));
        Self {
            id,
            dim,
            prior,
            belief,
            cached_moments,
            neighbors: Vec::new(),
            inbox: VariableInbox::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> VariableId {
        self.id
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub fn prior(&self) -> &GaussianState {
        &self.prior
    }

    #[must_use]
    pub fn belief(&self) -> &GaussianState {
        &self.belief
    }

    #[must_use]
    pub fn mean(&self) -> &Vector<Float> {
        &self.cached_moments.0
    }

    #[must_use]
    pub fn covariance(&self) -> &Matrix<Float> {
        &self.cached_moments.1
    }

    #[must_use]
    pub fn neighbors(&self) -> &[FactorId] {
        &self.neighbors
    }

    pub(crate) fn add_neighbor(&mut self, factor: FactorId) {
        self.neighbors.push(factor);
    }

    pub(crate) fn clear_neighbors(&mut self) {
        self.neighbors.clear();
        self.inbox.clear();
    }

    pub(crate) fn receive_message(&mut self, from: FactorId, message: Message) {
        self.inbox.insert(from, message);
    }

    /// Between-frame reset: widen the belief by a random-walk transition
    /// precision `tau * I`, leaving the information vector (and hence the
    /// direction the belief points) unchanged.
    pub fn reset(&mut self, tau: Float) {
        self.belief.inflate_precision(tau);
    }

    /// Overwrite the belief directly, bypassing [`Self::update_belief`].
    /// The only legitimate caller is a topology manager seeding a freshly
    /// born node's belief from its neighbors, before the node has any
    /// inbox entries of its own to fold in.
    pub fn set_belief(&mut self, belief: GaussianState) {
        match belief.to_moments() {
            Ok(moments) => self.cached_moments = moments,
            Err(error) => {
                tracing::warn!(variable = ?self.id, %error, "retaining previous cached moments");
            }
        }
        self.belief = belief;
    }

    /// Fold the prior and every inbox entry into the belief, then hand back
    /// the variable-to-factor response for each neighbor (the belief with
    /// that neighbor's own contribution removed, so a factor never receives
    /// its own message echoed back).
    pub fn update_belief(&mut self) -> FactorInbox {
        self.belief = self.prior.clone();
        for message in self.inbox.values() {
            if let Some(payload) = message.payload() {
                self.belief += payload;
            }
        }

        match self.belief.to_moments() {
            Ok(moments) => self.cached_moments = moments,
            Err(error) => {
                tracing::warn!(variable = ?self.id, %error, "retaining previous cached moments");
            }
        }

        let mut responses = FactorInbox::new();
        for (&factor_id, message) in &self.inbox {
            let response = match message.payload() {
                Some(payload) => {
                    let mut remainder = self.belief.clone();
                    remainder -= payload;
                    Message::new(remainder)
                }
                None => Message::new(self.belief.clone()),
            };
            responses.insert(factor_id, response);
        }
        responses
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use ndarray::array;
    use petgraph::stable_graph::NodeIndex;

    use super::*;
    use crate::id::FactorGraphId;

    fn variable_id() -> VariableId {
        VariableId::new(FactorGraphId::next(), NodeIndex::new(0))
    }

    fn factor_id() -> FactorId {
        FactorId::new(FactorGraphId::next(), NodeIndex::new(0))
    }

    #[test]
    fn unary_factor_update_matches_spec_formula() {
        // Identity prior; a single incoming message with precision P and
        // information e. After one round: Lambda = I + P, eta = e.
        let mut variable = VariableNode::new(variable_id(), 1, None);
        let fid = factor_id();
        let message = Message::new(
            GaussianState::from_information_and_precision(array![3.0], array![[5.0]]).unwrap(),
        );
        variable.receive_message(fid, message);
        variable.update_belief();

        assert_eq!(variable.belief().information_vector()[0], 3.0);
        assert_eq!(variable.belief().precision_matrix()[(0, 0)], 6.0);
    }

    #[test]
    fn response_excludes_senders_own_contribution() {
        let mut variable = VariableNode::new(variable_id(), 1, None);
        let fid = factor_id();
        let message = Message::new(
            GaussianState::from_information_and_precision(array![3.0], array![[5.0]]).unwrap(),
        );
        variable.receive_message(fid, message);
        let responses = variable.update_belief();

        let response = responses.get(&fid).unwrap().payload().unwrap();
        // belief (eta=3, lambda=6) minus the factor's own contribution
        // (eta=3, lambda=5) leaves exactly the prior (eta=0, lambda=1).
        assert_eq!(response.information_vector()[0], 0.0);
        assert_eq!(response.precision_matrix()[(0, 0)], 1.0);
    }

    #[test]
    fn set_belief_overwrites_mean_immediately() {
        let mut variable = VariableNode::new(variable_id(), 1, None);
        variable.set_belief(GaussianState::from_mean_and_covariance(array![2.0], array![[0.1]]).unwrap());
        assert!((variable.mean()[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn reset_widens_precision_without_moving_information() {
        let mut variable = VariableNode::new(variable_id(), 2, None);
        let eta_before = variable.belief().information_vector().clone();
        variable.reset(0.2);
        assert_eq!(variable.belief().information_vector(), &eta_before);
        assert_eq!(variable.belief().precision_matrix()[(0, 0)], 1.2);
    }
}
