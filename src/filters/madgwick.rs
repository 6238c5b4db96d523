//! Madgwick gradient-descent orientation filter (6-axis IMU)
//!
//! Integrates the gyroscope rate as a quaternion derivative and pulls the
//! estimate toward the measured gravity direction with a normalized
//! gradient step scaled by `beta`:
//!   - small beta: trusts the gyro, slow but steady
//!   - large beta: trusts the accelerometer, fast but jittery
//!
//! No magnetometer input; yaw is gyro-only on this path.

use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::OrientationFilter;
use crate::config::{MadgwickConfig, DEFAULT_BETA, DEFAULT_SAMPLE_FREQ_HZ, MAX_BETA, MIN_BETA};
use crate::quaternion::{quaternion_to_euler, quaternion_to_rotation_matrix, Quaternion};
use crate::types::{EulerAngles, Orientation, RotationMat4, SensorSample};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MadgwickStats {
    pub updates: u64,
    pub quaternion: (f64, f64, f64, f64),
    pub beta: f64,
    pub sample_freq: f64,
}

pub struct MadgwickFilter {
    /// Attitude quaternion, always unit length
    q: Quaternion,

    /// Gradient step gain
    beta: f64,

    /// Nominal sample rate [Hz] and its period [s]
    sample_freq: f64,
    sample_period: f64,

    update_count: u64,
}

impl MadgwickFilter {
    pub fn new(beta: f64, sample_freq: f64) -> Self {
        let sample_freq = if sample_freq.is_finite() && sample_freq > 0.0 {
            sample_freq
        } else {
            DEFAULT_SAMPLE_FREQ_HZ
        };
        Self {
            q: Quaternion::IDENTITY,
            beta: clamp_beta(beta),
            sample_freq,
            sample_period: 1.0 / sample_freq,
            update_count: 0,
        }
    }

    pub fn from_config(config: &MadgwickConfig) -> Self {
        Self::new(config.beta, config.sample_freq_hz)
    }

    /// Build from a legacy complementary-filter coefficient.
    ///
    /// Larger alpha trusts the gyro more, i.e. a smaller beta.
    pub fn from_complementary_alpha(alpha: f64) -> Self {
        let beta = ((1.0 - alpha) * 2.0).clamp(0.033, 0.3);
        Self::new(beta, DEFAULT_SAMPLE_FREQ_HZ)
    }

    /// One filter step.
    ///
    /// `accel` in g, `gyro_dps` in degrees/second, `dt` in seconds.
    pub fn update(&mut self, accel: Vector3<f64>, gyro_dps: Vector3<f64>, dt: f64) -> EulerAngles {
        if !dt.is_finite() || dt <= 0.0 {
            debug!("madgwick: skipping step with dt={}", dt);
            return self.euler_angles();
        }
        if !gyro_dps.iter().all(|v| v.is_finite()) {
            debug!("madgwick: skipping step with non-finite gyro");
            return self.euler_angles();
        }

        let gx = gyro_dps.x.to_radians();
        let gy = gyro_dps.y.to_radians();
        let gz = gyro_dps.z.to_radians();

        let Quaternion {
            w: q0,
            x: q1,
            y: q2,
            z: q3,
        } = self.q;

        // Rate of change of quaternion from gyroscope
        let mut q_dot = [
            0.5 * (-q1 * gx - q2 * gy - q3 * gz),
            0.5 * (q0 * gx + q2 * gz - q3 * gy),
            0.5 * (q0 * gy - q1 * gz + q3 * gx),
            0.5 * (q0 * gz + q1 * gy - q2 * gx),
        ];

        let norm = accel.norm();
        if norm > 0.0 && norm.is_finite() {
            let a = accel / norm;
            let s = gravity_gradient(&self.q, &a);
            for (qd, si) in q_dot.iter_mut().zip(s.iter()) {
                *qd -= self.beta * si;
            }
        } else {
            debug!("madgwick: accel unusable (|a|={}), gyro-only step", norm);
        }

        let candidate = Quaternion::new(
            q0 + q_dot[0] * dt,
            q1 + q_dot[1] * dt,
            q2 + q_dot[2] * dt,
            q3 + q_dot[3] * dt,
        );

        // Fails safe: a degenerate result leaves the previous attitude in place
        match candidate.normalized() {
            Some(q) => self.q = q,
            None => debug!("madgwick: quaternion norm collapsed, keeping previous state"),
        }

        self.update_count += 1;
        self.euler_angles()
    }

    /// Step using the nominal sample period instead of a measured dt.
    pub fn update_nominal(&mut self, accel: Vector3<f64>, gyro_dps: Vector3<f64>) -> EulerAngles {
        self.update(accel, gyro_dps, self.sample_period)
    }

    pub fn euler_angles(&self) -> EulerAngles {
        quaternion_to_euler(&self.q)
    }

    pub fn quaternion(&self) -> Quaternion {
        self.q
    }

    pub fn rotation_matrix(&self) -> RotationMat4 {
        quaternion_to_rotation_matrix(&self.q)
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn set_beta(&mut self, beta: f64) {
        self.beta = clamp_beta(beta);
    }

    pub fn sample_period(&self) -> f64 {
        self.sample_period
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn reset(&mut self) {
        self.q = Quaternion::IDENTITY;
        self.update_count = 0;
    }

    pub fn stats(&self) -> MadgwickStats {
        MadgwickStats {
            updates: self.update_count,
            quaternion: self.q.as_tuple(),
            beta: self.beta,
            sample_freq: self.sample_freq,
        }
    }
}

impl Default for MadgwickFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BETA, DEFAULT_SAMPLE_FREQ_HZ)
    }
}

impl OrientationFilter for MadgwickFilter {
    fn update(&mut self, sample: &SensorSample) -> Orientation {
        let euler = MadgwickFilter::update(
            self,
            sample.accel.to_vector(),
            sample.gyro.to_vector(),
            sample.dt,
        );
        Orientation {
            euler,
            quaternion: self.q,
        }
    }

    fn reset(&mut self) {
        MadgwickFilter::reset(self);
    }
}

fn clamp_beta(beta: f64) -> f64 {
    if beta.is_finite() {
        beta.clamp(MIN_BETA, MAX_BETA)
    } else {
        DEFAULT_BETA
    }
}

/// Normalized gradient of the gravity objective function.
///
/// Measures the misalignment between the gravity direction predicted by `q`
/// and the unit accelerometer vector `a`. Zero when they already agree.
fn gravity_gradient(q: &Quaternion, a: &Vector3<f64>) -> [f64; 4] {
    let Quaternion {
        w: q0,
        x: q1,
        y: q2,
        z: q3,
    } = *q;
    let (ax, ay, az) = (a.x, a.y, a.z);

    let q0_2 = 2.0 * q0;
    let q1_2 = 2.0 * q1;
    let q2_2 = 2.0 * q2;
    let q3_2 = 2.0 * q3;
    let q0_4 = 4.0 * q0;
    let q1_4 = 4.0 * q1;
    let q2_4 = 4.0 * q2;
    let q1_8 = 8.0 * q1;
    let q2_8 = 8.0 * q2;
    let q0q0 = q0 * q0;
    let q1q1 = q1 * q1;
    let q2q2 = q2 * q2;
    let q3q3 = q3 * q3;

    let s0 = q0_4 * q2q2 + q2_2 * ax + q0_4 * q1q1 - q1_2 * ay;
    let s1 = q1_4 * q3q3 - q3_2 * ax + 4.0 * q0q0 * q1 - q0_2 * ay - q1_4
        + q1_8 * q1q1
        + q1_8 * q2q2
        + q1_4 * az;
    let s2 = 4.0 * q0q0 * q2 + q0_2 * ax + q2_4 * q3q3 - q3_2 * ay - q2_4
        + q2_8 * q1q1
        + q2_8 * q2q2
        + q2_4 * az;
    let s3 = 4.0 * q1q1 * q3 - q1_2 * ax + 4.0 * q2q2 * q3 - q2_2 * ay;

    let norm = (s0 * s0 + s1 * s1 + s2 * s2 + s3 * s3).sqrt();
    if norm > 0.0 && norm.is_finite() {
        [s0 / norm, s1 / norm, s2 / norm, s3 / norm]
    } else {
        [0.0; 4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn level() -> Vector3<f64> {
        Vector3::new(0.0, 0.0, 1.0)
    }

    #[test]
    fn test_static_level_stays_identity() {
        let mut filter = MadgwickFilter::default();
        for _ in 0..10 {
            let e = filter.update(level(), Vector3::zeros(), 0.1);
            assert_abs_diff_eq!(e.roll, 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(e.pitch, 0.0, epsilon = 1e-9);
            assert_abs_diff_eq!(e.yaw, 0.0, epsilon = 1e-9);
        }
        assert_eq!(filter.update_count(), 10);
    }

    #[test]
    fn test_yaw_integrates_gyro() {
        let mut filter = MadgwickFilter::default();
        let mut e = EulerAngles::default();
        for _ in 0..10 {
            e = filter.update(level(), Vector3::new(0.0, 0.0, 10.0), 0.1);
        }
        // 10 deg/s for 1 s
        assert_abs_diff_eq!(e.yaw, 10.0, epsilon = 0.01);
        assert_abs_diff_eq!(e.roll, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_zero_accel_is_gyro_only() {
        let mut with_accel = MadgwickFilter::default();
        let mut gyro_only = MadgwickFilter::default();
        for _ in 0..10 {
            with_accel.update(level(), Vector3::new(0.0, 0.0, 10.0), 0.1);
            gyro_only.update(Vector3::zeros(), Vector3::new(0.0, 0.0, 10.0), 0.1);
        }
        // level accel contributes no gradient, so both paths agree
        let a = with_accel.quaternion();
        let b = gyro_only.quaternion();
        assert_abs_diff_eq!(a.w, b.w, epsilon = 1e-12);
        assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-12);
        assert_abs_diff_eq!(b.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_converges_to_tilt() {
        let mut filter = MadgwickFilter::default();
        let angle = 30.0_f64.to_radians();
        let accel = Vector3::new(0.0, angle.sin(), angle.cos());
        let mut e = EulerAngles::default();
        for _ in 0..100 {
            e = filter.update(accel, Vector3::zeros(), 0.1);
        }
        assert_abs_diff_eq!(e.roll, 30.0, epsilon = 1.0);
        assert_abs_diff_eq!(e.pitch, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pitch_sign_matches_accel_convention() {
        let mut filter = MadgwickFilter::default();
        let angle = 20.0_f64.to_radians();
        let accel = Vector3::new(-angle.sin(), 0.0, angle.cos());
        let mut e = EulerAngles::default();
        for _ in 0..100 {
            e = filter.update(accel, Vector3::zeros(), 0.1);
        }
        assert_abs_diff_eq!(e.pitch, 20.0, epsilon = 1.0);
    }

    #[test]
    fn test_norm_stays_unit() {
        let mut filter = MadgwickFilter::default();
        for i in 0..5000 {
            let t = i as f64 * 0.01;
            let accel = Vector3::new(0.3 * t.sin(), 0.2 * (1.3 * t).cos(), 1.0 + 0.5 * (0.7 * t).sin());
            let gyro = Vector3::new(120.0 * (0.5 * t).sin(), -80.0, 45.0 * (2.0 * t).cos());
            filter.update(accel, gyro, 0.01);
            assert_abs_diff_eq!(filter.quaternion().norm(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let mut filter = MadgwickFilter::default();
        filter.update(level(), Vector3::new(0.0, 0.0, 30.0), 0.1);
        let before = filter.quaternion();
        filter.update(level(), Vector3::new(500.0, 0.0, 0.0), 0.0);
        filter.update(level(), Vector3::new(500.0, 0.0, 0.0), -1.0);
        filter.update(level(), Vector3::new(f64::NAN, 0.0, 0.0), 0.1);
        assert_eq!(filter.quaternion(), before);
    }

    #[test]
    fn test_nominal_period() {
        let mut filter = MadgwickFilter::new(0.1, 20.0);
        assert_abs_diff_eq!(filter.sample_period(), 0.05, epsilon = 1e-15);
        let e = filter.update_nominal(level(), Vector3::new(0.0, 0.0, 20.0));
        assert_abs_diff_eq!(e.yaw, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_beta_clamped() {
        let mut filter = MadgwickFilter::new(5.0, 10.0);
        assert_eq!(filter.beta(), MAX_BETA);
        filter.set_beta(0.0);
        assert_eq!(filter.beta(), MIN_BETA);
        filter.set_beta(f64::NAN);
        assert_eq!(filter.beta(), DEFAULT_BETA);
    }

    #[test]
    fn test_complementary_alpha_mapping() {
        assert_abs_diff_eq!(MadgwickFilter::from_complementary_alpha(0.98).beta(), 0.04, epsilon = 1e-12);
        assert_eq!(MadgwickFilter::from_complementary_alpha(0.999).beta(), 0.033);
        assert_eq!(MadgwickFilter::from_complementary_alpha(0.5).beta(), 0.3);
    }

    #[test]
    fn test_reset_and_stats() {
        let mut filter = MadgwickFilter::default();
        filter.update(level(), Vector3::new(10.0, 20.0, 30.0), 0.1);
        filter.reset();
        let stats = filter.stats();
        assert_eq!(stats.updates, 0);
        assert_eq!(stats.quaternion, (1.0, 0.0, 0.0, 0.0));
        assert_eq!(stats.sample_freq, 10.0);
        assert_eq!(filter.rotation_matrix(), RotationMat4::identity());
    }
}
