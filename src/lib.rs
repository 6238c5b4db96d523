//! IMU attitude estimation: an adaptive 6-state EKF and a Madgwick filter
//! behind one selectable estimator.

pub mod angles;
pub mod config;
pub mod error;
pub mod estimator;
pub mod filters;
pub mod motion;
pub mod quaternion;
pub mod sensors;
pub mod types;

pub use config::{EstimatorConfig, FilterKind};
pub use error::{AttitudeError, AttitudeResult};
pub use estimator::{AttitudeEstimator, EstimatorDiagnostics};
pub use filters::{AdaptiveEstimator, Ekf6d, MadgwickFilter, OrientationFilter};
pub use quaternion::Quaternion;
pub use types::{AccelData, EulerAngles, GyroData, Orientation, SensorSample};
