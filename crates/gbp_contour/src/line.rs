//! The infinite line through two points, and the orthogonal-projection
//! distance used to assign measurements to contour segments.

use gbp_linalg::{Float, Vector, VectorNorm};

#[derive(Debug, Clone)]
pub struct Line {
    support: Vector<Float>,
    direction: Vector<Float>,
}

impl Line {
    #[must_use]
    pub fn through(a: &Vector<Float>, b: &Vector<Float>) -> Self {
        Self {
            support: a.clone(),
            direction: b - a,
        }
    }

    /// Orthogonal projection of `point` onto the line. Falls back to the
    /// support point when the two endpoints coincide (zero direction).
    #[must_use]
    pub fn project(&self, point: &Vector<Float>) -> Vector<Float> {
        let dd = self.direction.dot(&self.direction);
        if dd <= Float::EPSILON {
            return self.support.clone();
        }
        let m = point - &self.support;
        let t = self.direction.dot(&m) / dd;
        &self.support + &(&self.direction * t)
    }

    #[must_use]
    pub fn distance_to_point(&self, point: &Vector<Float>) -> Float {
        let projection = self.project(point);
        (&projection - point).euclidean_norm()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use ndarray::array;

    use super::*;

    #[test]
    fn distance_to_point_on_the_line_is_zero() {
        let line = Line::through(&array![0.0, 0.0], &array![1.0, 0.0]);
        assert!(line.distance_to_point(&array![0.5, 0.0]) < 1e-12);
    }

    #[test]
    fn distance_to_offset_point_is_perpendicular_distance() {
        let line = Line::through(&array![0.0, 0.0], &array![1.0, 0.0]);
        let distance = line.distance_to_point(&array![0.5, 2.0]);
        assert!((distance - 2.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_line_falls_back_to_support_point() {
        let line = Line::through(&array![1.0, 1.0], &array![1.0, 1.0]);
        let distance = line.distance_to_point(&array![4.0, 5.0]);
        assert!((distance - 5.0).abs() < 1e-12);
    }
}
