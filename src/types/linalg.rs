//! Linear algebra type system for the attitude filters
//!
//! Fixed-size nalgebra aliases so every predict/update runs on stack
//! matrices with compile-time dimension checking.

use nalgebra::{Matrix4, SMatrix, SVector};

// ===== State Dimensions =====
pub const STATE_DIM_6: usize = 6; // roll, pitch, yaw, bias_x, bias_y, bias_z

// ===== Measurement Dimensions =====
pub const MEASURE_DIM_ACCEL: usize = 3; // roll, pitch, (structurally zero) yaw
pub const MEASURE_DIM_HEADING: usize = 1; // yaw

// ===== 6-State Filter Types =====
pub type StateVec6 = SVector<f64, STATE_DIM_6>;
pub type StateMat6 = SMatrix<f64, STATE_DIM_6, STATE_DIM_6>;

// Measurement types for the 6-state filter
pub type AccelMeasVec = SVector<f64, MEASURE_DIM_ACCEL>;
pub type AccelNoise = SMatrix<f64, MEASURE_DIM_ACCEL, MEASURE_DIM_ACCEL>;
pub type HeadingMeasVec = SVector<f64, MEASURE_DIM_HEADING>;
pub type HeadingNoise = SMatrix<f64, MEASURE_DIM_HEADING, MEASURE_DIM_HEADING>;

// Jacobian types
pub type JacobianAccel = SMatrix<f64, MEASURE_DIM_ACCEL, STATE_DIM_6>; // 3×6
pub type JacobianHeading = SMatrix<f64, MEASURE_DIM_HEADING, STATE_DIM_6>; // 1×6

// Kalman gain for a D-dimensional measurement
pub type KalmanGain<const D: usize> = SMatrix<f64, STATE_DIM_6, D>;

// ===== Rendering =====
pub type RotationMat4 = Matrix4<f64>;
