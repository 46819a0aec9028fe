//! The dynamic topology manager for 2-D contour fitting: regenerates the
//! line-measurement factor set every frame and, between fit passes, births,
//! kills, and merges variable nodes driven by per-segment residual variance
//! and posterior covariance magnitude.
//!
//! Everything here is built on top of the generic `gbp_factorgraph` crate
//! through its public `FactorGraph` API -- the manager has no special access
//! and there is no global registry of variables or factors to reach into.

use std::cmp::Ordering;

use gbp_factorgraph::{FactorGraph, GraphError, VariableId};
use gbp_gaussian::GaussianState;
use gbp_linalg::{Float, Matrix, Vector, VectorNorm};

use crate::{factors::line_measurement_factor_closures, line::Line};

/// Number of synchronous rounds run per topology pass, and the convergence
/// tolerance passed to [`FactorGraph::fit`]. These tune the *inner* GBP fit
/// rather than the outer topology loop, so they are kept as constants here
/// rather than exposed as configuration keys.
const FIT_ROUNDS_PER_PASS: usize = 50;
const FIT_TOLERANCE: Float = 1e-4;

#[derive(Debug, thiserror::Error)]
pub enum ContourError {
    #[error("variable {0:?} is no longer in the graph")]
    MissingNode(VariableId),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

type Result<T> = std::result::Result<T, ContourError>;

/// Configuration keys consumed by the dynamic manager, with their defaults.
#[derive(Debug, Clone, Copy)]
pub struct ContourConfig {
    pub transition_noise: Float,
    pub line_factor_huber_distance: Float,
    pub birth_line_variance: Float,
    pub death_node_sigma: Float,
    pub line_measurement_noise: Float,
    pub line_merge_residual: Float,
    pub max_iterations_per_measurement: usize,
    pub num_initial_nodes: usize,
    pub use_huber: bool,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            transition_noise: 0.1,
            line_factor_huber_distance: 0.05,
            birth_line_variance: 0.1,
            death_node_sigma: 0.08,
            line_measurement_noise: 0.1,
            line_merge_residual: 0.05,
            max_iterations_per_measurement: 500,
            num_initial_nodes: 2,
            use_huber: true,
        }
    }
}

/// Outcome of fitting one measurement frame to convergence: repeated
/// alternation of GBP rounds and topology passes until a pass changes
/// nothing, or an iteration cap is reached.
#[derive(Debug, Clone)]
pub struct FrameResult {
    pub nodes: Vec<VariableId>,
    pub gbp_iterations: usize,
    pub topology_passes: usize,
}

fn frobenius_norm(m: &Matrix<Float>) -> Float {
    m.iter().map(|x| x * x).sum::<Float>().sqrt()
}

fn by_distance(a: &(usize, Float), b: &(usize, Float)) -> Ordering {
    a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal)
}

/// Canonical-form average of two priors: (η, Λ) ← ((η_a+η_b)/2, (Λ_a+Λ_b)/2).
/// Falls back to `a` if the average happens to be degenerate (the two
/// precisions were built to disagree in sign, which cannot occur with the
/// priors this manager constructs but is handled rather than assumed away).
fn average_information_form(a: &GaussianState, b: &GaussianState) -> GaussianState {
    let eta = (a.information_vector() + b.information_vector()) * 0.5;
    let lambda = (a.precision_matrix() + b.precision_matrix()) * 0.5;
    GaussianState::from_information_and_precision(eta, lambda).unwrap_or_else(|_| a.clone())
}

#[derive(Debug, Clone, Copy)]
struct SegmentStat {
    ssr: Float,
    count: usize,
}

impl SegmentStat {
    fn variance(self) -> Float {
        self.ssr / (self.count.max(1) as Float)
    }
}

pub struct ContourManager {
    config: ContourConfig,
}

impl ContourManager {
    #[must_use]
    pub fn new(config: ContourConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ContourConfig {
        &self.config
    }

    /// Seed an initial chain of `num_initial_nodes` 2-D variables spread
    /// linearly between `start` and `end`, with a loose (high-covariance)
    /// prior so the first frame's measurements dominate the posterior.
    pub fn seed(&self, graph: &mut FactorGraph, start: Vector<Float>, end: Vector<Float>) -> Vec<VariableId> {
        let n = self.config.num_initial_nodes.max(1);
        let loose_covariance = Matrix::eye(2) * 1000.0;
        (0..n)
            .map(|i| {
                let t = if n == 1 { 0.5 } else { i as Float / (n - 1) as Float };
                let mean = &start + &((&end - &start) * t);
                let prior = GaussianState::from_mean_and_covariance(mean, loose_covariance.clone())
                    .unwrap_or_else(|_| GaussianState::new(2));
                graph.add_variable(2, Some(prior))
            })
            .collect()
    }

    fn mean_of(&self, graph: &FactorGraph, id: VariableId) -> Result<Vector<Float>> {
        graph
            .variable(id)
            .map(|v| v.mean().clone())
            .ok_or(ContourError::MissingNode(id))
    }

    /// The line through each consecutive pair of the chain's current means,
    /// with every measurement assigned to its nearest segment.
    fn segment_stats(&self, graph: &FactorGraph, chain: &[VariableId], measurements: &[Vector<Float>]) -> Result<Vec<SegmentStat>> {
        let mut lines = Vec::with_capacity(chain.len().saturating_sub(1));
        for pair in chain.windows(2) {
            let a = self.mean_of(graph, pair[0])?;
            let b = self.mean_of(graph, pair[1])?;
            lines.push(Line::through(&a, &b));
        }

        let mut stats = vec![SegmentStat { ssr: 0.0, count: 0 }; lines.len()];
        for point in measurements {
            let Some((nearest, distance)) = lines
                .iter()
                .map(|line| line.distance_to_point(point))
                .enumerate()
                .min_by(by_distance)
            else {
                continue;
            };
            stats[nearest].ssr += distance * distance;
            stats[nearest].count += 1;
        }
        Ok(stats)
    }

    /// Decide whether `chain[index]` should be killed: endpoint support and
    /// diffuse-posterior checks apply to every node, while the three-point
    /// collinearity (merge) check only applies to interior nodes, since it
    /// needs both neighbors to exist.
    fn should_kill(&self, graph: &FactorGraph, chain: &[VariableId], segments: &[SegmentStat], index: usize) -> Result<bool> {
        let n = chain.len();
        let variable = graph.variable(chain[index]).ok_or(ContourError::MissingNode(chain[index]))?;

        if frobenius_norm(variable.covariance()) > self.config.death_node_sigma {
            return Ok(true);
        }

        if (index == 0 || index == n - 1) && !segments.is_empty() {
            let segment = if index == 0 { segments[0] } else { segments[segments.len() - 1] };
            if segment.count <= 1 {
                return Ok(true);
            }
        }

        if index > 0 && index < n - 1 {
            let previous = self.mean_of(graph, chain[index - 1])?;
            let next = self.mean_of(graph, chain[index + 1])?;
            let line = Line::through(&previous, &next);
            if line.distance_to_point(variable.mean()) < self.config.line_merge_residual {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Insert two interpolated nodes at the 1/3 and 2/3 points of the
    /// segment between `a` and `b`. The new nodes' means are the interpolated
    /// points with the endpoints' covariance averaged; their priors are the
    /// endpoints' priors averaged in canonical form.
    fn birth_between(&self, graph: &mut FactorGraph, a: VariableId, b: VariableId) -> Result<[VariableId; 2]> {
        let (mean_a, mean_b, covariance_a, covariance_b, prior_a, prior_b) = {
            let va = graph.variable(a).ok_or(ContourError::MissingNode(a))?;
            let vb = graph.variable(b).ok_or(ContourError::MissingNode(b))?;
            (
                va.mean().clone(),
                vb.mean().clone(),
                va.covariance().clone(),
                vb.covariance().clone(),
                va.prior().clone(),
                vb.prior().clone(),
            )
        };

        let delta = &mean_b - &mean_a;
        let averaged_covariance = (&covariance_a + &covariance_b) * 0.5;
        let averaged_prior = average_information_form(&prior_a, &prior_b);

        let ids = [1.0 / 3.0, 2.0 / 3.0].map(|t| {
            let mean = &mean_a + &(&delta * t);
            let belief = GaussianState::from_mean_and_covariance(mean, averaged_covariance.clone())
                .unwrap_or_else(|_| averaged_prior.clone());
            let id = graph.add_variable(2, Some(averaged_prior.clone()));
            if let Some(variable) = graph.variable_mut(id) {
                variable.set_belief(belief);
            }
            id
        });
        Ok(ids)
    }

    /// Handle the degenerate single-node start: splits the lone node
    /// perpendicular to its prior-to-posterior displacement, offset by the
    /// posterior standard deviation, and returns the two replacements.
    fn split_single_node(&self, graph: &mut FactorGraph, only: VariableId) -> Result<(Vec<VariableId>, usize)> {
        let (prior, mean, covariance) = {
            let variable = graph.variable(only).ok_or(ContourError::MissingNode(only))?;
            (variable.prior().clone(), variable.mean().clone(), variable.covariance().clone())
        };
        let prior_mean = prior
            .to_moments()
            .map(|(mean, _)| mean)
            .unwrap_or_else(|_| Vector::zeros(mean.len()));
        let displacement = &mean - &prior_mean;

        let mut perpendicular = Vector::from(vec![-displacement[1], displacement[0]]);
        let norm = perpendicular.euclidean_norm();
        if norm > Float::EPSILON {
            perpendicular /= norm;
        } else {
            perpendicular = Vector::from(vec![1.0, 0.0]);
        }
        let offset = &perpendicular * covariance[(0, 0)].max(0.0).sqrt();

        graph.remove_variable(only);
        let a = graph.add_variable(2, Some(prior.clone()));
        if let Ok(belief) = GaussianState::from_mean_and_covariance(&mean + &offset, covariance.clone()) {
            if let Some(variable) = graph.variable_mut(a) {
                variable.set_belief(belief);
            }
        }
        let b = graph.add_variable(2, Some(prior));
        if let Ok(belief) = GaussianState::from_mean_and_covariance(&mean - &offset, covariance) {
            if let Some(variable) = graph.variable_mut(b) {
                variable.set_belief(belief);
            }
        }

        Ok((vec![a, b], 2))
    }

    /// Picks the 2- or 3-node window a measurement's line factor attaches
    /// to: the nearest node, clamped so there is always a left neighbor,
    /// extended to a right neighbor when one exists. This lets
    /// [`crate::factors::line_measurement`] pick between the two segments
    /// meeting at the pivot node rather than committing to one in advance.
    fn node_window(&self, graph: &FactorGraph, chain: &[VariableId], point: &Vector<Float>) -> Result<Vec<VariableId>> {
        if chain.len() < 2 {
            return Ok(Vec::new());
        }
        let mut distances = Vec::with_capacity(chain.len());
        for (idx, &id) in chain.iter().enumerate() {
            let mean = self.mean_of(graph, id)?;
            distances.push((idx, (&mean - point).euclidean_norm()));
        }
        let nearest = distances
            .into_iter()
            .min_by(by_distance)
            .map_or(0, |(idx, _)| idx)
            .clamp(1, chain.len() - 1);

        let mut window = vec![chain[nearest - 1], chain[nearest]];
        if nearest + 1 < chain.len() {
            window.push(chain[nearest + 1]);
        }
        Ok(window)
    }

    /// Attach every measurement to its window of 2-or-3 chain nodes via a
    /// line-measurement factor.
    fn regenerate_factors(&self, graph: &mut FactorGraph, chain: &[VariableId], measurements: &[Vector<Float>]) -> Result<()> {
        let noise = Matrix::eye(1) * self.config.line_measurement_noise;
        for point in measurements {
            let window = self.node_window(graph, chain, point)?;
            if window.len() < 2 {
                continue;
            }
            let (measurement_fn, jacobian_fn) = line_measurement_factor_closures(point.clone());
            graph.add_factor(
                window,
                measurement_fn,
                jacobian_fn,
                Vector::zeros(1),
                noise.clone(),
                self.config.use_huber,
                Some(self.config.line_factor_huber_distance),
            )?;
        }
        Ok(())
    }

    /// Between-frame reset applied to the whole chain: widen every node's
    /// belief by the transition noise and drop the previous frame's factor
    /// set so it can be regenerated against new measurements.
    pub fn reset_for_new_frame(&self, graph: &mut FactorGraph, chain: &[VariableId]) {
        for &id in chain {
            if let Some(variable) = graph.variable_mut(id) {
                variable.reset(self.config.transition_noise);
            }
        }
        graph.clear_factors();
    }

    /// Recompute the chain's topology at the end of a fit pass and
    /// regenerate the factor set for the surviving/new chain. Returns the
    /// new chain and the number of nodes that changed.
    pub fn update_topology(
        &self,
        graph: &mut FactorGraph,
        chain: &[VariableId],
        measurements: &[Vector<Float>],
    ) -> Result<(Vec<VariableId>, usize)> {
        if chain.len() == 1 {
            let (next_chain, changed) = self.split_single_node(graph, chain[0])?;
            tracing::debug!(node = ?chain[0], into = ?next_chain, "split the degenerate single-node chain");
            graph.clear_factors();
            self.regenerate_factors(graph, &next_chain, measurements)?;
            return Ok((next_chain, changed));
        }

        let segments = self.segment_stats(graph, chain, measurements)?;
        let mut survivors = Vec::with_capacity(chain.len());
        let mut changed = 0usize;
        for (index, &id) in chain.iter().enumerate() {
            if self.should_kill(graph, chain, &segments, index)? {
                tracing::debug!(node = ?id, index, "killing node");
                graph.remove_variable(id);
                changed += 1;
            } else {
                survivors.push(id);
            }
        }

        let birth_segments = self.segment_stats(graph, &survivors, measurements)?;
        let mut next_chain = Vec::with_capacity(survivors.len());
        for (index, &id) in survivors.iter().enumerate() {
            next_chain.push(id);
            if index + 1 < survivors.len() && birth_segments[index].variance() > self.config.birth_line_variance {
                let born = self.birth_between(graph, id, survivors[index + 1])?;
                tracing::debug!(
                    between = ?(id, survivors[index + 1]),
                    born = ?born,
                    variance = birth_segments[index].variance(),
                    "birthed nodes along a high-variance segment"
                );
                changed += born.len();
                next_chain.extend(born);
            }
        }

        tracing::trace!(chain_len = next_chain.len(), changed, "topology pass complete");
        graph.clear_factors();
        self.regenerate_factors(graph, &next_chain, measurements)?;
        Ok((next_chain, changed))
    }

    /// Fits one measurement frame to convergence: resets and attaches
    /// factors for `chain`, then alternates `FactorGraph::fit` with
    /// [`Self::update_topology`] until a pass changes nothing or
    /// `max_iterations_per_measurement` passes have run, at which point the
    /// cap is logged rather than returned as an error.
    pub fn process_frame(
        &self,
        graph: &mut FactorGraph,
        chain: Vec<VariableId>,
        measurements: &[Vector<Float>],
    ) -> Result<FrameResult> {
        self.reset_for_new_frame(graph, &chain);
        self.regenerate_factors(graph, &chain, measurements)?;

        let mut chain = chain;
        let mut gbp_iterations = 0usize;
        for pass in 1..=self.config.max_iterations_per_measurement {
            gbp_iterations += graph.fit(FIT_ROUNDS_PER_PASS, FIT_TOLERANCE)?;
            let (next_chain, changed) = self.update_topology(graph, &chain, measurements)?;
            chain = next_chain;
            if changed == 0 {
                return Ok(FrameResult { nodes: chain, gbp_iterations, topology_passes: pass });
            }
        }

        tracing::warn!(
            max_iterations = self.config.max_iterations_per_measurement,
            "contour topology did not settle before the per-frame cap"
        );
        Ok(FrameResult {
            nodes: chain,
            gbp_iterations,
            topology_passes: self.config.max_iterations_per_measurement,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use ndarray::array;

    use super::*;

    fn points_on_line(n: usize, y: Float) -> Vec<Vector<Float>> {
        (0..n)
            .map(|i| array![i as Float / (n - 1).max(1) as Float, y])
            .collect()
    }

    #[test]
    fn seed_places_nodes_linearly_between_endpoints() {
        let mut graph = FactorGraph::new();
        let manager = ContourManager::new(ContourConfig {
            num_initial_nodes: 3,
            ..ContourConfig::default()
        });
        let chain = manager.seed(&mut graph, array![0.0, 0.0], array![1.0, 0.0]);
        assert_eq!(chain.len(), 3);
        let mean = graph.variable(chain[1]).unwrap().mean();
        assert!((mean[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn straight_line_frame_keeps_every_node_near_y() {
        let mut graph = FactorGraph::new();
        let manager = ContourManager::new(ContourConfig {
            num_initial_nodes: 10,
            use_huber: true,
            ..ContourConfig::default()
        });
        let chain = manager.seed(&mut graph, array![0.0, 0.5], array![1.0, 0.5]);
        let measurements = points_on_line(40, 0.5);

        let result = manager.process_frame(&mut graph, chain, &measurements).unwrap();
        for &id in &result.nodes {
            let mean = graph.variable(id).unwrap().mean();
            assert!((mean[1] - 0.5).abs() < 0.05, "mean={mean:?}");
        }
    }

    #[test]
    fn single_node_split_produces_two_variables() {
        let mut graph = FactorGraph::new();
        let manager = ContourManager::new(ContourConfig::default());
        let prior = GaussianState::from_mean_and_covariance(array![0.5, 0.5], Matrix::eye(2) * 0.01).unwrap();
        let id = graph.add_variable(2, Some(prior));
        graph
            .variable_mut(id)
            .unwrap()
            .set_belief(GaussianState::from_mean_and_covariance(array![0.6, 0.4], Matrix::eye(2) * 0.01).unwrap());

        let (chain, changed) = manager.split_single_node(&mut graph, id).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(changed, 2);
    }

    #[test]
    fn dead_endpoint_with_no_support_is_removed() {
        let mut graph = FactorGraph::new();
        let manager = ContourManager::new(ContourConfig::default());
        let chain = manager.seed(&mut graph, array![0.0, 0.0], array![1.0, 0.0]);
        // no measurements at all -- both segments have zero support.
        let (next_chain, changed) = manager.update_topology(&mut graph, &chain, &[]).unwrap();
        assert!(changed > 0);
        assert!(next_chain.len() <= chain.len());
    }
}
