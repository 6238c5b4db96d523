//! Selectable attitude estimator: adaptive EKF or Madgwick behind one handle.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{heading_trust_from_percent, EstimatorConfig, FilterKind};
use crate::filters::{AdaptiveEstimator, MadgwickFilter, OrientationFilter};
use crate::motion::MotionLevel;
use crate::types::{Orientation, SensorSample};

/// Confidence figures only the EKF path can produce.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimatorDiagnostics {
    /// 1-sigma roll/pitch/yaw [deg]
    pub uncertainty: (f64, f64, f64),
    /// [deg/s]
    pub gyro_bias: (f64, f64, f64),
    pub accel_trust: f64,
    pub heading_trust: f64,
    pub motion_level: Option<MotionLevel>,
}

pub enum AttitudeEstimator {
    Ekf(AdaptiveEstimator),
    Madgwick(MadgwickFilter),
}

impl AttitudeEstimator {
    pub fn from_config(config: &EstimatorConfig) -> Self {
        Self::build(config.filter, config)
    }

    fn build(kind: FilterKind, config: &EstimatorConfig) -> Self {
        match kind {
            FilterKind::Ekf => AttitudeEstimator::Ekf(AdaptiveEstimator::from_config(config)),
            FilterKind::Madgwick => {
                AttitudeEstimator::Madgwick(MadgwickFilter::from_config(&config.madgwick))
            }
        }
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            AttitudeEstimator::Ekf(_) => FilterKind::Ekf,
            AttitudeEstimator::Madgwick(_) => FilterKind::Madgwick,
        }
    }

    /// Switch algorithm. The new filter always starts from its initial state.
    pub fn select(&mut self, kind: FilterKind, config: &EstimatorConfig) {
        info!("estimator: switching {:?} -> {:?}", self.kind(), kind);
        *self = Self::build(kind, config);
    }

    pub fn update(&mut self, sample: &SensorSample) -> Orientation {
        self.filter_mut().update(sample)
    }

    pub fn reset(&mut self) {
        self.filter_mut().reset();
    }

    fn filter_mut(&mut self) -> &mut dyn OrientationFilter {
        match self {
            AttitudeEstimator::Ekf(ekf) => ekf,
            AttitudeEstimator::Madgwick(madgwick) => madgwick,
        }
    }

    pub fn diagnostics(&self) -> Option<EstimatorDiagnostics> {
        match self {
            AttitudeEstimator::Ekf(adaptive) => {
                let uncertainty = adaptive.uncertainty();
                let bias = adaptive.gyro_bias();
                Some(EstimatorDiagnostics {
                    uncertainty: (uncertainty.x, uncertainty.y, uncertainty.z),
                    gyro_bias: (bias.x, bias.y, bias.z),
                    accel_trust: adaptive.ekf().accel_trust(),
                    heading_trust: adaptive.ekf().heading_trust(),
                    motion_level: adaptive.motion_level(),
                })
            }
            AttitudeEstimator::Madgwick(_) => None,
        }
    }

    pub fn set_heading_trust(&mut self, trust_factor: f64) {
        match self {
            AttitudeEstimator::Ekf(adaptive) => adaptive.set_heading_trust(trust_factor),
            AttitudeEstimator::Madgwick(_) => {
                debug!("estimator: madgwick has no heading input, trust ignored")
            }
        }
    }

    /// Slider form of `set_heading_trust`, 0..=100.
    pub fn set_heading_trust_percent(&mut self, percent: f64) {
        self.set_heading_trust(heading_trust_from_percent(percent));
    }

    pub fn set_beta(&mut self, beta: f64) {
        match self {
            AttitudeEstimator::Madgwick(madgwick) => madgwick.set_beta(beta),
            AttitudeEstimator::Ekf(_) => debug!("estimator: ekf has no beta, ignored"),
        }
    }
}

impl Default for AttitudeEstimator {
    fn default() -> Self {
        Self::from_config(&EstimatorConfig::default())
    }
}
