//! 6-Dimensional Extended Kalman Filter for attitude
//!
//! State Vector (6D):
//! [0-2]: Euler angles (roll, pitch, yaw) [rad], each wrapped into (-π, π]
//! [3-5]: Gyro bias (bx, by, bz) in body frame [rad/s]
//!
//! Prediction integrates bias-corrected gyro rates through the Euler-rate
//! kinematics. Two independent corrections:
//!   - accelerometer gravity direction → roll/pitch
//!   - external heading sensor → yaw
//!
//! Near pitch = ±90° the kinematics divide by cos(pitch); that term is
//! clamped to ±0.01, which is an approximation of the gimbal singularity
//! rather than a failure.

use log::{debug, warn};
use nalgebra::{SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::angles::{angle_difference, normalize_angle, normalize_degrees};
use crate::config::{clamp_or, positive_or, EkfNoiseConfig, MAX_PROCESS_NOISE, MIN_PROCESS_NOISE};
use crate::types::{
    AccelMeasVec, AccelNoise, EulerAngles, HeadingMeasVec, HeadingNoise, JacobianAccel,
    JacobianHeading, KalmanGain, StateMat6, StateVec6, STATE_DIM_6,
};

/// Below this the accelerometer carries no usable gravity direction [g]
const MIN_ACCEL_NORM: f64 = 0.1;
const MIN_COS_PITCH: f64 = 0.01;
/// Bias random walk relative to the attitude process noise
const BIAS_NOISE_RATIO: f64 = 0.001;
/// Trust floor used when inflating measurement noise
const MIN_TRUST: f64 = 0.1;

/// Accelerometer trust from how far |a| strays from 1 g.
pub fn accel_trust_factor(magnitude: f64) -> f64 {
    let error = (magnitude - 1.0).abs();
    if error > 0.5 {
        0.3
    } else if error > 0.2 {
        0.7
    } else {
        1.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ekf6dState {
    /// Roll, pitch, yaw [deg]
    pub euler_deg: (f64, f64, f64),

    /// Gyro bias estimate [deg/s]
    pub gyro_bias_dps: (f64, f64, f64),

    /// 1-sigma attitude uncertainty [deg]
    pub uncertainty_deg: (f64, f64, f64),

    pub accel_trust: f64,
    pub heading_trust: f64,

    /// Covariance trace for uncertainty
    pub covariance_trace: f64,

    /// Update counters
    pub predict_count: u64,
    pub accel_updates: u64,
    pub heading_updates: u64,
    pub skipped_updates: u64,
}

/// Sin/cos of the current roll and pitch with the cos(pitch) guard applied.
#[derive(Clone, Copy)]
struct AttitudeTrig {
    sin_roll: f64,
    cos_roll: f64,
    sin_pitch: f64,
    cos_pitch: f64,
    tan_pitch: f64,
}

impl AttitudeTrig {
    fn new(roll: f64, pitch: f64) -> Self {
        let (sin_roll, cos_roll) = roll.sin_cos();
        let (sin_pitch, mut cos_pitch) = pitch.sin_cos();
        if cos_pitch.abs() < MIN_COS_PITCH {
            cos_pitch = if cos_pitch >= 0.0 {
                MIN_COS_PITCH
            } else {
                -MIN_COS_PITCH
            };
        }
        Self {
            sin_roll,
            cos_roll,
            sin_pitch,
            cos_pitch,
            tan_pitch: sin_pitch / cos_pitch,
        }
    }

    /// Body rates → Euler angle rates
    fn euler_rates(&self, w: &Vector3<f64>) -> Vector3<f64> {
        let droll = w.x + self.sin_roll * self.tan_pitch * w.y + self.cos_roll * self.tan_pitch * w.z;
        let dpitch = self.cos_roll * w.y - self.sin_roll * w.z;
        let dyaw = (self.sin_roll / self.cos_pitch) * w.y + (self.cos_roll / self.cos_pitch) * w.z;
        Vector3::new(droll, dpitch, dyaw)
    }
}

pub struct Ekf6d {
    /// State vector [6D]
    state: StateVec6,

    /// Covariance matrix [6x6]
    covariance: StateMat6,

    /// Process noise matrix [6x6]
    process_noise: StateMat6,

    /// Configured attitude process noise, restored on reset
    base_process_noise: f64,

    /// Accelerometer measurement noise [rad²]
    r_accel: AccelNoise,

    /// Heading measurement noise [rad²]
    r_heading: HeadingNoise,

    accel_trust: f64,
    heading_trust: f64,

    /// Update counters
    predict_count: u64,
    accel_updates: u64,
    heading_updates: u64,
    skipped_updates: u64,
}

impl Ekf6d {
    /// Noise values out of range are clamped to usable ones, never rejected.
    pub fn new(config: &EkfNoiseConfig) -> Self {
        let defaults = EkfNoiseConfig::default();
        let base_process_noise = clamp_or(
            config.process_noise,
            MIN_PROCESS_NOISE,
            MAX_PROCESS_NOISE,
            defaults.process_noise,
            "ekf.process_noise",
        );
        let accel_noise = positive_or(config.accel_noise, defaults.accel_noise, "ekf.accel_noise");
        let mag_noise = positive_or(config.mag_noise, defaults.mag_noise, "ekf.mag_noise");

        Self {
            state: StateVec6::zeros(),
            covariance: Self::default_covariance(),
            process_noise: Self::build_process_noise(base_process_noise),
            base_process_noise,
            r_accel: AccelNoise::identity() * accel_noise.powi(2),
            r_heading: HeadingNoise::new(mag_noise.powi(2)),
            accel_trust: 1.0,
            heading_trust: 1.0,
            predict_count: 0,
            accel_updates: 0,
            heading_updates: 0,
            skipped_updates: 0,
        }
    }

    fn default_covariance() -> StateMat6 {
        StateMat6::identity()
    }

    fn build_process_noise(level: f64) -> StateMat6 {
        let mut q = StateMat6::zeros();

        // Attitude random walk
        for i in 0..3 {
            q[(i, i)] = level;
        }

        // Gyro bias drifts far slower than attitude
        for i in 3..6 {
            q[(i, i)] = level * BIAS_NOISE_RATIO;
        }

        q
    }

    /// Prediction step from raw gyro rates [deg/s] over `dt` seconds.
    pub fn predict(&mut self, gyro_dps: Vector3<f64>, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            debug!("ekf: predict skipped, dt={}", dt);
            return;
        }
        if !gyro_dps.iter().all(|v| v.is_finite()) {
            debug!("ekf: predict skipped, non-finite gyro");
            return;
        }

        let bias = self.state.fixed_rows::<3>(3).into_owned();
        let rates = gyro_dps.map(f64::to_radians) - bias;

        let trig = AttitudeTrig::new(self.state[0], self.state[1]);
        let euler_dot = trig.euler_rates(&rates);

        // Biases are held constant; only Q lets them move
        for i in 0..3 {
            self.state[i] = normalize_angle(self.state[i] + euler_dot[i] * dt);
        }

        // Linearized about the propagated attitude
        let f = Self::state_jacobian(&AttitudeTrig::new(self.state[0], self.state[1]), &rates, dt);
        let propagated = f * self.covariance * f.transpose() + self.process_noise;
        self.covariance = symmetrize(&propagated);

        self.predict_count += 1;
    }

    /// Partial derivatives of the Euler-rate kinematics w.r.t. the state.
    fn state_jacobian(trig: &AttitudeTrig, rates: &Vector3<f64>, dt: f64) -> StateMat6 {
        let AttitudeTrig {
            sin_roll: sr,
            cos_roll: cr,
            sin_pitch: sp,
            cos_pitch: cp,
            tan_pitch: tp,
        } = *trig;
        let (gy, gz) = (rates.y, rates.z);
        let cp2 = cp * cp;

        let mut f = StateMat6::identity();

        // d(roll)/d(roll, pitch)
        f[(0, 0)] = 1.0 + dt * (cr * tp * gy - sr * tp * gz);
        f[(0, 1)] = dt * (sr / cp2 * gy + cr / cp2 * gz);

        // d(pitch)/d(roll)
        f[(1, 0)] = dt * (-sr * gy - cr * gz);

        // d(yaw)/d(roll, pitch)
        f[(2, 0)] = dt * ((cr / cp) * gy - (sr / cp) * gz);
        f[(2, 1)] = dt * (sr * sp / cp2 * gy + cr * sp / cp2 * gz);

        // d(angles)/d(bias)
        f[(0, 3)] = -dt;
        f[(0, 4)] = -dt * sr * tp;
        f[(0, 5)] = -dt * cr * tp;
        f[(1, 4)] = -dt * cr;
        f[(1, 5)] = dt * sr;
        f[(2, 4)] = -dt * sr / cp;
        f[(2, 5)] = -dt * cr / cp;

        f
    }

    /// Accelerometer update (gravity direction → roll/pitch), `accel` in g.
    ///
    /// Returns `false` when the reading was rejected or the update skipped.
    pub fn update_accel(&mut self, accel: Vector3<f64>) -> bool {
        let norm = accel.norm();
        if !norm.is_finite() || norm < MIN_ACCEL_NORM {
            debug!("ekf: accel update skipped, |a|={:.3}", norm);
            return false;
        }

        let trust = accel_trust_factor(norm);

        let a = accel / norm;
        let measured_roll = a.y.atan2(a.z);
        let measured_pitch = (-a.x).atan2((a.y * a.y + a.z * a.z).sqrt());

        // Yaw row present but structurally zero: gravity says nothing about heading
        let innovation = AccelMeasVec::new(
            angle_difference(measured_roll, self.state[0]),
            angle_difference(measured_pitch, self.state[1]),
            0.0,
        );

        let mut h = JacobianAccel::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;

        let r = self.r_accel * (1.0 / trust.max(MIN_TRUST));

        let applied = self.apply_correction(&h, &innovation, &r);
        if applied {
            self.accel_trust = trust;
            self.accel_updates += 1;
        }
        applied
    }

    /// Heading update (yaw), `heading_deg` in degrees, any range.
    pub fn update_heading(&mut self, heading_deg: f64) -> bool {
        if !heading_deg.is_finite() {
            debug!("ekf: heading update skipped, heading={}", heading_deg);
            return false;
        }

        let measured_yaw = normalize_angle(normalize_degrees(heading_deg).to_radians());
        let innovation = HeadingMeasVec::new(angle_difference(measured_yaw, self.state[2]));

        let mut h = JacobianHeading::zeros();
        h[(0, 2)] = 1.0;

        let r = self.r_heading * (1.0 / self.heading_trust.max(MIN_TRUST));

        let applied = self.apply_correction(&h, &innovation, &r);
        if applied {
            self.heading_updates += 1;
        }
        applied
    }

    /// Standard EKF correction with a Joseph-form covariance update.
    ///
    /// State and covariance are only written once the whole correction is
    /// known to be finite.
    fn apply_correction<const D: usize>(
        &mut self,
        h: &SMatrix<f64, D, STATE_DIM_6>,
        innovation: &SVector<f64, D>,
        r: &SMatrix<f64, D, D>,
    ) -> bool {
        let ph_t = self.covariance * h.transpose();
        let s = h * ph_t + r;

        let s_inv = match s.try_inverse() {
            Some(inv) => inv,
            None => {
                warn!("ekf: innovation covariance is singular, update skipped");
                self.skipped_updates += 1;
                return false;
            }
        };

        let k: KalmanGain<D> = ph_t * s_inv;
        let dx = k * innovation;

        let i_kh = StateMat6::identity() - k * h;
        let new_p = i_kh * self.covariance * i_kh.transpose() + k * r * k.transpose();

        if !dx.iter().all(|v| v.is_finite()) || !new_p.iter().all(|v| v.is_finite()) {
            warn!("ekf: non-finite correction, update skipped");
            self.skipped_updates += 1;
            return false;
        }

        self.state += dx;
        for i in 0..3 {
            self.state[i] = normalize_angle(self.state[i]);
        }
        self.covariance = symmetrize(&new_p);
        true
    }

    /// Heading sensor trust in [0, 1]; lower trust inflates its noise.
    pub fn set_heading_trust(&mut self, trust_factor: f64) {
        self.heading_trust = if trust_factor.is_finite() {
            trust_factor.clamp(0.0, 1.0)
        } else {
            1.0
        };
    }

    /// Rewrite the attitude (and proportional bias) process noise.
    pub fn set_process_noise(&mut self, level: f64) {
        let clamped = if level.is_finite() {
            level.clamp(MIN_PROCESS_NOISE, MAX_PROCESS_NOISE)
        } else {
            self.base_process_noise
        };
        if clamped != level {
            debug!("ekf: process noise {} clamped to {}", level, clamped);
        }
        self.process_noise = Self::build_process_noise(clamped);
    }

    pub fn process_noise_level(&self) -> f64 {
        self.process_noise[(0, 0)]
    }

    pub fn euler_angles_deg(&self) -> EulerAngles {
        EulerAngles::new(
            self.state[0].to_degrees(),
            self.state[1].to_degrees(),
            self.state[2].to_degrees(),
        )
    }

    /// Gyro bias estimate [deg/s]
    pub fn gyro_bias_dps(&self) -> Vector3<f64> {
        self.state.fixed_rows::<3>(3).map(f64::to_degrees)
    }

    /// 1-sigma roll/pitch/yaw uncertainty [deg]
    pub fn uncertainty_deg(&self) -> Vector3<f64> {
        Vector3::new(
            self.covariance[(0, 0)].max(0.0).sqrt().to_degrees(),
            self.covariance[(1, 1)].max(0.0).sqrt().to_degrees(),
            self.covariance[(2, 2)].max(0.0).sqrt().to_degrees(),
        )
    }

    pub fn accel_trust(&self) -> f64 {
        self.accel_trust
    }

    pub fn heading_trust(&self) -> f64 {
        self.heading_trust
    }

    pub fn covariance(&self) -> &StateMat6 {
        &self.covariance
    }

    pub fn state_vector(&self) -> &StateVec6 {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = StateVec6::zeros();
        self.covariance = Self::default_covariance();
        self.process_noise = Self::build_process_noise(self.base_process_noise);
        self.accel_trust = 1.0;
        self.heading_trust = 1.0;
        self.predict_count = 0;
        self.accel_updates = 0;
        self.heading_updates = 0;
        self.skipped_updates = 0;
    }

    /// Get current state snapshot
    pub fn get_state(&self) -> Ekf6dState {
        let euler = self.euler_angles_deg();
        let bias = self.gyro_bias_dps();
        let sigma = self.uncertainty_deg();
        Ekf6dState {
            euler_deg: euler.as_tuple(),
            gyro_bias_dps: (bias.x, bias.y, bias.z),
            uncertainty_deg: (sigma.x, sigma.y, sigma.z),
            accel_trust: self.accel_trust,
            heading_trust: self.heading_trust,
            covariance_trace: self.covariance.trace(),
            predict_count: self.predict_count,
            accel_updates: self.accel_updates,
            heading_updates: self.heading_updates,
            skipped_updates: self.skipped_updates,
        }
    }
}

impl Default for Ekf6d {
    fn default() -> Self {
        Self::new(&EkfNoiseConfig::default())
    }
}

fn symmetrize(p: &StateMat6) -> StateMat6 {
    (p + p.transpose()) * 0.5
}
