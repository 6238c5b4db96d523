//! EKF driver that retunes process noise from how hard the device is moving.
//!
//! Each sample runs predict → accel correction → optional heading correction,
//! then the spread of the last few |a| values picks the process noise used by
//! the next prediction.

use log::debug;
use nalgebra::Vector3;

use super::ekf_6d::Ekf6d;
use super::OrientationFilter;
use crate::config::{EkfNoiseConfig, EstimatorConfig};
use crate::motion::{AccelMagnitudeWindow, MotionLevel};
use crate::quaternion::euler_to_quaternion;
use crate::types::{EulerAngles, Orientation, SensorSample};

pub struct AdaptiveEstimator {
    ekf: Ekf6d,
    motion: AccelMagnitudeWindow,
    motion_level: Option<MotionLevel>,
    update_count: u64,
}

impl AdaptiveEstimator {
    pub fn new(noise: &EkfNoiseConfig, window_len: usize) -> Self {
        Self {
            ekf: Ekf6d::new(noise),
            motion: AccelMagnitudeWindow::new(window_len),
            motion_level: None,
            update_count: 0,
        }
    }

    pub fn from_config(config: &EstimatorConfig) -> Self {
        let mut estimator = Self::new(&config.ekf, config.motion_window);
        estimator.set_heading_trust(config.heading_trust());
        estimator
    }

    /// Run one full filter cycle and return roll/pitch/yaw in degrees.
    pub fn update(&mut self, sample: &SensorSample) -> EulerAngles {
        let accel = sample.accel.to_vector();

        self.ekf.predict(sample.gyro.to_vector(), sample.dt);
        self.ekf.update_accel(accel);
        if let Some(heading) = sample.usable_heading() {
            self.ekf.update_heading(heading);
        }

        self.motion.push(accel.norm());
        if let Some(level) = self.motion.motion_level() {
            if self.motion_level != Some(level) {
                debug!("adaptive: motion level {:?} -> {:?}", self.motion_level, level);
            }
            self.ekf.set_process_noise(level.process_noise());
            self.motion_level = Some(level);
        }

        self.update_count += 1;
        self.ekf.euler_angles_deg()
    }

    /// 1-sigma roll/pitch/yaw uncertainty [deg]
    pub fn uncertainty(&self) -> Vector3<f64> {
        self.ekf.uncertainty_deg()
    }

    /// Gyro bias estimate [deg/s]
    pub fn gyro_bias(&self) -> Vector3<f64> {
        self.ekf.gyro_bias_dps()
    }

    pub fn set_heading_trust(&mut self, trust_factor: f64) {
        self.ekf.set_heading_trust(trust_factor);
    }

    pub fn euler_angles(&self) -> EulerAngles {
        self.ekf.euler_angles_deg()
    }

    /// Last band chosen, `None` until the window holds enough samples
    pub fn motion_level(&self) -> Option<MotionLevel> {
        self.motion_level
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn ekf(&self) -> &Ekf6d {
        &self.ekf
    }

    /// Resets the EKF and forgets the motion history. Heading trust survives.
    pub fn reset(&mut self) {
        let heading_trust = self.ekf.heading_trust();
        self.ekf.reset();
        self.ekf.set_heading_trust(heading_trust);
        self.motion.clear();
        self.motion_level = None;
        self.update_count = 0;
    }
}

impl Default for AdaptiveEstimator {
    fn default() -> Self {
        Self::from_config(&EstimatorConfig::default())
    }
}

impl OrientationFilter for AdaptiveEstimator {
    fn update(&mut self, sample: &SensorSample) -> Orientation {
        let euler = AdaptiveEstimator::update(self, sample);
        Orientation {
            euler,
            quaternion: euler_to_quaternion(euler.roll, euler.pitch, euler.yaw),
        }
    }

    fn reset(&mut self) {
        AdaptiveEstimator::reset(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccelData, GyroData};
    use approx::assert_abs_diff_eq;

    fn still(dt: f64) -> SensorSample {
        SensorSample::new(AccelData::new(0.0, 0.0, 1.0), GyroData::default(), dt)
    }

    #[test]
    fn test_static_sample_stays_level() {
        let mut estimator = AdaptiveEstimator::default();
        for _ in 0..20 {
            estimator.update(&still(0.1));
        }
        let euler = estimator.euler_angles();
        assert_abs_diff_eq!(euler.roll, 0.0, epsilon = 0.01);
        assert_abs_diff_eq!(euler.pitch, 0.0, epsilon = 0.01);
        assert_abs_diff_eq!(euler.yaw, 0.0, epsilon = 0.01);
        assert_eq!(estimator.update_count(), 20);
    }

    #[test]
    fn test_motion_level_needs_three_samples() {
        let mut estimator = AdaptiveEstimator::default();
        estimator.update(&still(0.1));
        estimator.update(&still(0.1));
        assert_eq!(estimator.motion_level(), None);
        assert_eq!(estimator.ekf().process_noise_level(), 0.01);
        estimator.update(&still(0.1));
        assert_eq!(estimator.motion_level(), Some(MotionLevel::Quiet));
    }

    #[test]
    fn test_shaking_raises_process_noise() {
        let mut estimator = AdaptiveEstimator::default();
        for i in 0..10 {
            let z = if i % 2 == 0 { 0.4 } else { 1.6 };
            let sample = SensorSample::new(AccelData::new(0.0, 0.0, z), GyroData::default(), 0.1);
            estimator.update(&sample);
        }
        assert_eq!(estimator.motion_level(), Some(MotionLevel::Agitated));
        assert_eq!(estimator.ekf().process_noise_level(), 0.05);

        // calm readings push the shaking out of the window
        for _ in 0..10 {
            estimator.update(&still(0.1));
        }
        assert_eq!(estimator.motion_level(), Some(MotionLevel::Quiet));
        assert_eq!(estimator.ekf().process_noise_level(), 0.01);
    }

    #[test]
    fn test_moderate_band() {
        let mut estimator = AdaptiveEstimator::default();
        for i in 0..10 {
            let z = if i % 2 == 0 { 0.8 } else { 1.2 };
            let sample = SensorSample::new(AccelData::new(0.0, 0.0, z), GyroData::default(), 0.1);
            estimator.update(&sample);
        }
        assert_eq!(estimator.motion_level(), Some(MotionLevel::Moderate));
        assert_eq!(estimator.ekf().process_noise_level(), 0.02);
    }

    #[test]
    fn test_bias_converges_with_heading() {
        let mut estimator = AdaptiveEstimator::default();
        let sample = SensorSample::new(AccelData::new(0.0, 0.0, 1.0), GyroData::new(2.0, 0.0, 0.0), 0.1)
            .with_heading(0.0, true);
        for _ in 0..50 {
            estimator.update(&sample);
        }
        let bias = estimator.gyro_bias();
        assert!((bias.x - 2.0).abs() < 0.2, "bias.x = {}", bias.x);
    }

    #[test]
    fn test_heading_bounds_drift() {
        let mut estimator = AdaptiveEstimator::default();
        let sample = SensorSample::new(AccelData::new(0.0, 0.0, 1.0), GyroData::new(0.0, 0.0, 0.5), 0.1)
            .with_heading(45.0, true);
        for _ in 0..200 {
            estimator.update(&sample);
        }
        assert_abs_diff_eq!(estimator.euler_angles().yaw, 45.0, epsilon = 0.05);
    }

    #[test]
    fn test_invalid_heading_ignored() {
        let mut estimator = AdaptiveEstimator::default();
        let sample = still(0.1).with_heading(90.0, false);
        for _ in 0..20 {
            estimator.update(&sample);
        }
        assert_eq!(estimator.ekf().get_state().heading_updates, 0);
        assert_abs_diff_eq!(estimator.euler_angles().yaw, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uncertainty_non_increasing_with_heading() {
        let mut estimator = AdaptiveEstimator::default();
        let sample = still(0.1).with_heading(0.0, true);
        let mut previous = estimator.uncertainty();
        for _ in 0..30 {
            estimator.update(&sample);
            let current = estimator.uncertainty();
            for i in 0..3 {
                assert!(current[i] <= previous[i] + 1e-9);
            }
            previous = current;
        }
    }

    #[test]
    fn test_reset_clears_history_and_keeps_trust() {
        let mut estimator = AdaptiveEstimator::default();
        estimator.set_heading_trust(0.4);
        for _ in 0..5 {
            estimator.update(&SensorSample::new(
                AccelData::new(0.3, 0.0, 1.0),
                GyroData::new(4.0, 1.0, 9.0),
                0.1,
            ));
        }
        estimator.reset();
        assert_eq!(estimator.motion_level(), None);
        assert_eq!(estimator.update_count(), 0);
        assert_eq!(estimator.euler_angles(), EulerAngles::default());
        assert_eq!(estimator.ekf().heading_trust(), 0.4);
    }

    #[test]
    fn test_trait_output_quaternion_matches_euler() {
        let mut estimator = AdaptiveEstimator::default();
        let angle = 20.0_f64.to_radians();
        let sample = SensorSample::new(
            AccelData::new(0.0, angle.sin(), angle.cos()),
            GyroData::default(),
            0.1,
        );
        for _ in 0..30 {
            OrientationFilter::update(&mut estimator, &sample);
        }
        let out = OrientationFilter::update(&mut estimator, &sample);
        assert_abs_diff_eq!(out.quaternion.norm(), 1.0, epsilon = 1e-12);
        let back = out.quaternion.to_euler();
        assert_abs_diff_eq!(back.roll, out.euler.roll, epsilon = 1e-9);
        assert_abs_diff_eq!(out.euler.roll, 20.0, epsilon = 0.5);
    }
}
