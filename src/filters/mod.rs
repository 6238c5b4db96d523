pub mod adaptive;
pub mod ekf_6d;
pub mod madgwick;

use crate::types::{Orientation, SensorSample};

pub use adaptive::AdaptiveEstimator;
pub use ekf_6d::{accel_trust_factor, Ekf6d, Ekf6dState};
pub use madgwick::{MadgwickFilter, MadgwickStats};

/// Common surface of the selectable orientation filters.
pub trait OrientationFilter {
    fn update(&mut self, sample: &SensorSample) -> Orientation;

    /// Back to the initial state, as if freshly constructed
    fn reset(&mut self);
}
