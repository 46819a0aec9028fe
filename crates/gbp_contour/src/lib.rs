//! 2-D contour fitting on top of `gbp_factorgraph`: line/smoothing
//! measurement factors and the dynamic topology manager that grows, prunes,
//! and merges the variable chain as measurements arrive.

pub mod factors;
pub mod line;
pub mod manager;

pub use factors::{
    first_order_jacobian, line_measurement, line_measurement_factor_closures, smoothing_factor_closures,
    smoothing_jacobian, smoothing_measurement,
};
pub use line::Line;
pub use manager::{ContourConfig, ContourError, ContourManager, FrameResult};
