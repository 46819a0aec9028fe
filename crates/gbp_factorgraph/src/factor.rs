//! A factor: a (possibly nonlinear) measurement constraint on a block of
//! adjacent variables, linearized and robustified into a local canonical-form
//! Gaussian potential each round, and marginalized down to one outgoing
//! message per adjacent variable.

use gbp_gaussian::GaussianState;
use gbp_linalg::{Float, Matrix, Vector};
use ndarray::Axis;

use crate::{
    id::VariableId,
    message::{FactorInbox, FactorOutbox, Message},
};

/// Default Huber Mahalanobis threshold, per-factor unless overridden.
pub const DEFAULT_HUBER_EPSILON: Float = 0.1;

pub type MeasurementFn = Box<dyn Fn(&[Vector<Float>]) -> Vector<Float> + Send + Sync>;
pub type JacobianFn = Box<dyn Fn(&[Vector<Float>]) -> Matrix<Float> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum FactorError {
    #[error("factor has no adjacent variables")]
    NoAdjacentVariables,
    #[error("{0} adjacent variables but {1} block dimensions were supplied")]
    VariableDimensionCountMismatch(usize, usize),
    #[error("measurement covariance has shape {0}x{1}, expected a square matrix of size {2}")]
    CovarianceShapeMismatch(usize, usize, usize),
    #[error(
        "jacobian has shape {rows}x{cols}, expected {expected_rows}x{expected_cols}"
    )]
    JacobianShapeMismatch {
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },
    #[error(transparent)]
    Gaussian(#[from] gbp_gaussian::GaussianError),
}

type Result<T> = std::result::Result<T, FactorError>;

fn block_offsets(dims: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(dims.len());
    let mut acc = 0;
    for &d in dims {
        offsets.push(acc);
        acc += d;
    }
    offsets
}

pub struct Factor {
    variables: Vec<VariableId>,
    dims: Vec<usize>,
    measurement_fn: MeasurementFn,
    jacobian_fn: JacobianFn,
    measurement: Vector<Float>,
    /// R^-1, computed once at construction since R is fixed for the
    /// lifetime of the factor.
    measurement_precision: Matrix<Float>,
    huber_enabled: bool,
    huber_epsilon: Float,
    linearization_point: Vec<Vector<Float>>,
    /// Local canonical-form potential (eta_f, Lambda_f) over the stacked
    /// block of this factor's own adjacent variables, in adjacency order.
    local: GaussianState,
    inbox: FactorInbox,
    outbox: FactorOutbox,
}

impl std::fmt::Debug for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factor")
            .field("variables", &self.variables)
            .field("dims", &self.dims)
            .field("huber_enabled", &self.huber_enabled)
            .field("huber_epsilon", &self.huber_epsilon)
            .finish_non_exhaustive()
    }
}

impl Factor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        variables: Vec<VariableId>,
        dims: Vec<usize>,
        measurement_fn: MeasurementFn,
        jacobian_fn: JacobianFn,
        measurement: Vector<Float>,
        measurement_covariance: Matrix<Float>,
        huber_enabled: bool,
        huber_epsilon: Option<Float>,
    ) -> Result<Self> {
        if variables.is_empty() {
            return Err(FactorError::NoAdjacentVariables);
        }
        if variables.len() != dims.len() {
            return Err(FactorError::VariableDimensionCountMismatch(
                variables.len(),
                dims.len(),
            ));
        }
        let dim_z = measurement.len();
        if measurement_covariance.nrows() != dim_z || measurement_covariance.ncols() != dim_z {
            return Err(FactorError::CovarianceShapeMismatch(
                measurement_covariance.nrows(),
                measurement_covariance.ncols(),
                dim_z,
            ));
        }
        let measurement_precision = gbp_gaussian::invert_precision(&measurement_covariance)?;
        let total_dim: usize = dims.iter().sum();
        let linearization_point = dims.iter().map(|&d| Vector::zeros(d)).collect();

        Ok(Self {
            variables,
            dims,
            measurement_fn,
            jacobian_fn,
            measurement,
            measurement_precision,
            huber_enabled,
            huber_epsilon: huber_epsilon.unwrap_or(DEFAULT_HUBER_EPSILON),
            linearization_point,
            local: GaussianState::new(total_dim),
            inbox: FactorInbox::new(),
            outbox: FactorOutbox::new(),
        })
    }

    #[must_use]
    pub fn variables(&self) -> &[VariableId] {
        &self.variables
    }

    #[must_use]
    pub fn outbox(&self) -> &FactorOutbox {
        &self.outbox
    }

    pub(crate) fn receive_message(&mut self, from: VariableId, message: Message) {
        self.inbox.insert(from, message);
    }

    /// Pick x0 from the current inbox: the mean of the message most recently
    /// received from each adjacent variable, or zero if none has arrived
    /// yet. Using the inbox mean rather than the variable's own belief mean
    /// avoids a factor relinearizing against information it itself
    /// contributed, which would double-count in a loopy graph.
    pub fn relinearize(&mut self) {
        self.linearization_point = self
            .variables
            .iter()
            .zip(&self.dims)
            .map(|(v, &d)| {
                self.inbox
                    .get(v)
                    .and_then(Message::mean)
                    .unwrap_or_else(|| Vector::zeros(d))
            })
            .collect();
        tracing::trace!(variables = ?self.variables, point = ?self.linearization_point, "relinearized factor");
    }

    fn stacked_linearization_point(&self) -> Vector<Float> {
        let total_dim: usize = self.dims.iter().sum();
        let mut stacked = Vector::zeros(total_dim);
        let offsets = block_offsets(&self.dims);
        for (chunk, &start) in self.linearization_point.iter().zip(&offsets) {
            stacked.slice_mut(ndarray::s![start..start + chunk.len()]).assign(chunk);
        }
        stacked
    }

    /// Recompute the local canonical-form potential at the current
    /// linearization point, applying Huber reweighting to the measurement
    /// precision first.
    pub fn compute_factor(&mut self) -> Result<()> {
        let predicted = (self.measurement_fn)(&self.linearization_point);
        let jacobian = (self.jacobian_fn)(&self.linearization_point);

        let total_dim: usize = self.dims.iter().sum();
        let dim_z = self.measurement.len();
        if jacobian.nrows() != dim_z || jacobian.ncols() != total_dim {
            return Err(FactorError::JacobianShapeMismatch {
                rows: jacobian.nrows(),
                cols: jacobian.ncols(),
                expected_rows: dim_z,
                expected_cols: total_dim,
            });
        }

        let residual = &self.measurement - &predicted;
        let measurement_lambda = self.huber_weighted_precision(&residual);
        tracing::debug!(
            variables = ?self.variables,
            residual_norm = residual.dot(&residual).sqrt(),
            "recomputed local factor potential"
        );

        let x0 = self.stacked_linearization_point();
        let jt = jacobian.t();
        let jt_lambda = jt.dot(&measurement_lambda);
        let precision = jt_lambda.dot(&jacobian);
        let information = jt_lambda.dot(&(&residual + &jacobian.dot(&x0)));

        let mut local = GaussianState::from_information_and_precision(information, precision)?;
        local.symmetrize();
        local.inflate_precision(gbp_gaussian::RIDGE);
        self.local = local;
        Ok(())
    }

    /// m <= eps_h: unchanged R^-1. m > eps_h: R^-1 scaled down so that the
    /// Huber cost's linear tail outside the band replaces the quadratic cost
    /// that a plain Gaussian would charge.
    fn huber_weighted_precision(&self, residual: &Vector<Float>) -> Matrix<Float> {
        if !self.huber_enabled {
            return self.measurement_precision.clone();
        }
        let m_squared = residual.dot(&self.measurement_precision.dot(residual));
        let m = m_squared.sqrt();
        if m <= self.huber_epsilon || m == 0.0 {
            return self.measurement_precision.clone();
        }
        let eps = self.huber_epsilon;
        let alpha = 2.0 * (eps * m - eps * eps / 2.0) / m_squared;
        &self.measurement_precision * alpha
    }

    /// Marginalize out every variable but `target` from the local potential
    /// (after folding in the other variables' latest inbox contributions),
    /// producing the message bound for `target`.
    fn marginalize_onto(&self, target_idx: usize) -> Result<GaussianState> {
        let offsets = block_offsets(&self.dims);
        let total_dim: usize = self.dims.iter().sum();

        let mut eta_aug = self.local.information_vector().clone();
        let mut lambda_aug = self.local.precision_matrix().clone();
        for (other_idx, other_var) in self.variables.iter().enumerate() {
            if other_idx == target_idx {
                continue;
            }
            let Some(payload) = self.inbox.get(other_var).and_then(Message::payload) else {
                continue;
            };
            let start = offsets[other_idx];
            let d = self.dims[other_idx];
            let mut eta_slice = eta_aug.slice_mut(ndarray::s![start..start + d]);
            eta_slice += payload.information_vector();
            let mut lambda_slice =
                lambda_aug.slice_mut(ndarray::s![start..start + d, start..start + d]);
            lambda_slice += payload.precision_matrix();
        }

        if self.variables.len() == 1 {
            return Ok(GaussianState::from_information_and_precision(
                eta_aug, lambda_aug,
            )?);
        }

        let start = offsets[target_idx];
        let d_a = self.dims[target_idx];
        let a_indices: Vec<usize> = (start..start + d_a).collect();
        let b_indices: Vec<usize> = (0..start).chain(start + d_a..total_dim).collect();

        let eta_a = eta_aug.select(Axis(0), &a_indices);
        let eta_b = eta_aug.select(Axis(0), &b_indices);
        let lambda_aa = lambda_aug.select(Axis(0), &a_indices).select(Axis(1), &a_indices);
        let lambda_ab = lambda_aug.select(Axis(0), &a_indices).select(Axis(1), &b_indices);
        let lambda_ba = lambda_aug.select(Axis(0), &b_indices).select(Axis(1), &a_indices);
        let lambda_bb = lambda_aug.select(Axis(0), &b_indices).select(Axis(1), &b_indices);

        let lambda_bb_inv = gbp_gaussian::invert_precision(&lambda_bb)?;
        let gain = lambda_ab.dot(&lambda_bb_inv);

        let eta_msg = &eta_a - &gain.dot(&eta_b);
        let lambda_msg = &lambda_aa - &gain.dot(&lambda_ba);

        let mut state = GaussianState::from_information_and_precision(eta_msg, lambda_msg)?;
        state.symmetrize();
        state.inflate_precision(gbp_gaussian::RIDGE);
        Ok(state)
    }

    /// Recompute the outbox. A variable whose marginalization fails (a
    /// singular `Lambda_bb` even after the ridge) keeps whatever message it
    /// was last sent, matching the "recovered locally" policy for numerical
    /// singularities encountered mid-round.
    pub fn compute_outgoing_messages(&mut self) {
        for target_idx in 0..self.variables.len() {
            let target = self.variables[target_idx];
            match self.marginalize_onto(target_idx) {
                Ok(state) => {
                    self.outbox.insert(target, Message::new(state));
                }
                Err(error) => {
                    tracing::warn!(?target, %error, "keeping previous outgoing message");
                    self.outbox.entry(target).or_insert_with(Message::empty);
                }
            }
        }
    }
}
