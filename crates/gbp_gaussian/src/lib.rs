//! Canonical-form (information-form) Gaussian state.
//!
//! A Gaussian over a d-dimensional vector is represented by its information
//! vector η and precision matrix Λ, related to the moment form by
//! Λ = Σ⁻¹, η = Λμ. Products of independent Gaussians become sums in
//! canonical form, which is the reason Gaussian belief propagation messages
//! are stored this way rather than as (mean, covariance) pairs.

use gbp_linalg::{Float, Matrix, Vector};
use ndarray_inverse::Inverse;

/// ε added to the diagonal of a precision matrix before inversion, so that a
/// precision matrix that is merely ill-conditioned (rather than genuinely
/// singular) still inverts.
pub const RIDGE: Float = 1e-6;

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum GaussianError {
    #[error("precision matrix has shape {0}x{1}, expected a square matrix")]
    NonSquarePrecision(usize, usize),
    #[error(
        "information vector has length {0}, but the precision matrix is {1}x{1}"
    )]
    DimensionMismatch(usize, usize),
    #[error("the precision matrix is not invertible, so the moment form (μ, Σ) cannot be read out")]
    SingularPrecision,
    #[error("the supplied covariance matrix is not invertible, so it cannot be used to build a canonical-form state")]
    SingularCovariance,
}

pub type Result<T> = std::result::Result<T, GaussianError>;

/// Symmetrize `m` in place: `m <- (m + mᵀ) / 2`.
fn symmetrize(m: &mut Matrix<Float>) {
    let transposed = m.t().to_owned();
    *m += &transposed;
    *m *= 0.5;
}

/// Symmetrize and ridge-regularize a copy of `lambda`, then invert it.
///
/// Returns `SingularPrecision` only if the matrix remains non-invertible
/// after the ridge is added, which should only happen for non-finite input.
pub fn invert_precision(lambda: &Matrix<Float>) -> Result<Matrix<Float>> {
    let mut regularized = lambda.clone();
    symmetrize(&mut regularized);
    for i in 0..regularized.nrows() {
        regularized[(i, i)] += RIDGE;
    }
    regularized.inv().ok_or(GaussianError::SingularPrecision)
}

/// A multivariate Gaussian in canonical (information) form: (η, Λ).
#[derive(Debug, Clone)]
pub struct GaussianState {
    information: Vector<Float>,
    precision: Matrix<Float>,
}

impl GaussianState {
    /// An uninformative unit-precision state: η = 0, Λ = I.
    ///
    /// Used as the default prior so that a freshly created variable never
    /// forces a singular inversion before it has received any messages.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            information: Vector::zeros(dim),
            precision: Matrix::eye(dim),
        }
    }

    /// Build a state directly from an information vector and precision
    /// matrix, checking only that the dimensions agree. The precision is
    /// *not* required to be invertible here — that is only enforced when the
    /// moment form is actually read out via [`Self::to_moments`].
    pub fn from_information_and_precision(
        information: Vector<Float>,
        precision: Matrix<Float>,
    ) -> Result<Self> {
        if !precision.is_square() {
            return Err(GaussianError::NonSquarePrecision(
                precision.nrows(),
                precision.ncols(),
            ));
        }
        if information.len() != precision.nrows() {
            return Err(GaussianError::DimensionMismatch(
                information.len(),
                precision.nrows(),
            ));
        }
        Ok(Self {
            information,
            precision,
        })
    }

    /// Build a state from a mean and covariance, i.e. Λ = Σ⁻¹, η = Λμ.
    pub fn from_mean_and_covariance(mean: Vector<Float>, covariance: Matrix<Float>) -> Result<Self> {
        let mut state = Self::new(mean.len());
        state.set_from_moments(&mean, &covariance)?;
        Ok(state)
    }

    /// Dimension of the state.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.information.len()
    }

    #[must_use]
    pub fn information_vector(&self) -> &Vector<Float> {
        &self.information
    }

    #[must_use]
    pub fn precision_matrix(&self) -> &Matrix<Float> {
        &self.precision
    }

    /// Replace (η, Λ) with the canonical form of `N(mean, covariance)`.
    /// Fails with [`GaussianError::SingularCovariance`] if `covariance` is
    /// not invertible.
    pub fn set_from_moments(&mut self, mean: &Vector<Float>, covariance: &Matrix<Float>) -> Result<()> {
        if !covariance.is_square() {
            return Err(GaussianError::NonSquarePrecision(
                covariance.nrows(),
                covariance.ncols(),
            ));
        }
        if mean.len() != covariance.nrows() {
            return Err(GaussianError::DimensionMismatch(mean.len(), covariance.nrows()));
        }
        let mut precision = covariance
            .inv()
            .ok_or(GaussianError::SingularCovariance)?;
        symmetrize(&mut precision);
        let information = precision.dot(mean);
        self.information = information;
        self.precision = precision;
        Ok(())
    }

    /// Read out (μ, Σ) = (Λ⁻¹η, Λ⁻¹). Fails with
    /// [`GaussianError::SingularPrecision`] if Λ is not invertible, even
    /// after the ε-ridge regularization.
    pub fn to_moments(&self) -> Result<(Vector<Float>, Matrix<Float>)> {
        let covariance = invert_precision(&self.precision)?;
        let mean = covariance.dot(&self.information);
        Ok((mean, covariance))
    }

    /// Symmetrize Λ in place: Λ ← (Λ + Λᵀ) / 2. Idempotent.
    pub fn symmetrize(&mut self) {
        symmetrize(&mut self.precision);
    }

    /// Add `tau * I` to the precision, modelling a random-walk transition
    /// noise between frames. The information vector is left unchanged, so
    /// the mean is unaffected but the belief widens.
    pub fn inflate_precision(&mut self, tau: Float) {
        for i in 0..self.precision.nrows() {
            self.precision[(i, i)] += tau;
        }
    }
}

impl std::ops::Add<&GaussianState> for &GaussianState {
    type Output = GaussianState;

    /// Canonical-form product of two independent Gaussians: sum the
    /// information vectors and precision matrices, then symmetrize.
    fn add(self, rhs: &GaussianState) -> GaussianState {
        let mut precision = &self.precision + &rhs.precision;
        symmetrize(&mut precision);
        GaussianState {
            information: &self.information + &rhs.information,
            precision,
        }
    }
}

impl std::ops::AddAssign<&GaussianState> for GaussianState {
    fn add_assign(&mut self, rhs: &GaussianState) {
        self.information += &rhs.information;
        self.precision += &rhs.precision;
        self.symmetrize();
    }
}

impl std::ops::Sub<&GaussianState> for &GaussianState {
    type Output = GaussianState;

    /// Remove one Gaussian's contribution from another: subtract
    /// information vectors and precision matrices, then symmetrize. Used to
    /// compute a variable-to-factor message (belief minus one factor's own
    /// contribution).
    fn sub(self, rhs: &GaussianState) -> GaussianState {
        let mut precision = &self.precision - &rhs.precision;
        symmetrize(&mut precision);
        GaussianState {
            information: &self.information - &rhs.information,
            precision,
        }
    }
}

impl std::ops::SubAssign<&GaussianState> for GaussianState {
    fn sub_assign(&mut self, rhs: &GaussianState) {
        self.information -= &rhs.information;
        self.precision -= &rhs.precision;
        self.symmetrize();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use paste::paste;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn new_is_uninformative() {
        let state = GaussianState::new(3);
        assert_eq!(state.information_vector(), &Vector::<Float>::zeros(3));
        assert_eq!(state.precision_matrix(), &Matrix::<Float>::eye(3));
    }

    #[test]
    fn set_from_moments_round_trips_to_moments() {
        let mean = array![1.0, -2.0, 0.5];
        let covariance = array![[2.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.5]];
        let mut state = GaussianState::new(3);
        state.set_from_moments(&mean, &covariance).unwrap();

        let (mean_out, covariance_out) = state.to_moments().unwrap();
        assert_abs_diff_eq!(mean_out, mean, epsilon = 1e-8);
        assert_abs_diff_eq!(covariance_out, covariance, epsilon = 1e-8);
    }

    #[test]
    fn singular_covariance_is_rejected() {
        let mean = array![0.0, 0.0];
        let covariance = array![[1.0, 0.0], [0.0, 0.0]];
        let mut state = GaussianState::new(2);
        let err = state.set_from_moments(&mean, &covariance).unwrap_err();
        assert_eq!(err, GaussianError::SingularCovariance);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let err = GaussianState::from_information_and_precision(array![1.0, 2.0], Matrix::eye(3))
            .unwrap_err();
        assert_eq!(err, GaussianError::DimensionMismatch(2, 3));
    }

    #[test]
    fn precision_stays_symmetric_after_add_assign() {
        let mut a = GaussianState::from_information_and_precision(
            array![1.0, 0.0],
            array![[2.0, 0.1], [0.0, 2.0]],
        )
        .unwrap();
        let b = GaussianState::from_information_and_precision(
            array![0.0, 1.0],
            array![[1.0, 0.0], [0.3, 1.0]],
        )
        .unwrap();
        a += &b;
        let lambda = a.precision_matrix();
        assert_abs_diff_eq!(lambda[(0, 1)], lambda[(1, 0)], epsilon = 1e-10);
    }

    #[test]
    fn add_then_sub_is_identity() {
        let a = GaussianState::from_information_and_precision(array![1.0], array![[2.0]]).unwrap();
        let b = GaussianState::from_information_and_precision(array![0.5], array![[1.0]]).unwrap();
        let summed = &a + &b;
        let back = &summed - &b;
        assert_abs_diff_eq!(back.information_vector(), a.information_vector(), epsilon = 1e-10);
        assert_abs_diff_eq!(back.precision_matrix(), a.precision_matrix(), epsilon = 1e-10);
    }

    macro_rules! test_round_trip_dim {
        ($name:ident: $dim:expr) => {
            paste! {
                #[test]
                fn [<round_trip_dim_ $name>]() {
                    let mean = Vector::<Float>::from_elem($dim, 0.25);
                    let covariance = Matrix::<Float>::eye($dim) * 0.75;
                    let mut state = GaussianState::new($dim);
                    state.set_from_moments(&mean, &covariance).unwrap();
                    let (mean_out, covariance_out) = state.to_moments().unwrap();
                    assert_abs_diff_eq!(mean_out, mean, epsilon = 1e-8);
                    assert_abs_diff_eq!(covariance_out, covariance, epsilon = 1e-8);
                }
            }
        };
    }

    test_round_trip_dim!(1: 1);
    test_round_trip_dim!(2: 2);
    test_round_trip_dim!(4: 4);
}
