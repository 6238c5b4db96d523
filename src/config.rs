//! Estimator configuration surface.
//!
//! Loaded from JSON (every field optional) and/or set from CLI flags.
//! Out-of-range values are clamped, never rejected.

use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::AttitudeResult;
use crate::motion::{DEFAULT_WINDOW_LEN, MIN_SAMPLES};

pub const MIN_BETA: f64 = 0.01;
pub const MAX_BETA: f64 = 0.5;
pub const DEFAULT_BETA: f64 = 0.1;
pub const DEFAULT_SAMPLE_FREQ_HZ: f64 = 10.0;

pub const MIN_PROCESS_NOISE: f64 = 0.001;
pub const MAX_PROCESS_NOISE: f64 = 1.0;

/// Which orientation filter drives the output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    Ekf,
    Madgwick,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EkfNoiseConfig {
    /// Attitude-block process noise (bias block uses 1e-3 of it)
    pub process_noise: f64,
    /// Accelerometer measurement noise std [rad]
    pub accel_noise: f64,
    /// Heading sensor measurement noise std [rad]
    pub mag_noise: f64,
}

impl Default for EkfNoiseConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.01,
            accel_noise: 0.1,
            mag_noise: 0.05,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MadgwickConfig {
    pub beta: f64,
    pub sample_freq_hz: f64,
}

impl Default for MadgwickConfig {
    fn default() -> Self {
        Self {
            beta: DEFAULT_BETA,
            sample_freq_hz: DEFAULT_SAMPLE_FREQ_HZ,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub filter: FilterKind,
    pub ekf: EkfNoiseConfig,
    pub madgwick: MadgwickConfig,
    /// Heading-trust slider position, 0..=100
    pub heading_trust_percent: f64,
    /// Accel magnitudes kept for motion detection
    pub motion_window: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            filter: FilterKind::Ekf,
            ekf: EkfNoiseConfig::default(),
            madgwick: MadgwickConfig::default(),
            heading_trust_percent: 100.0,
            motion_window: DEFAULT_WINDOW_LEN,
        }
    }
}

impl EstimatorConfig {
    pub fn from_json_str(json: &str) -> AttitudeResult<Self> {
        let config: EstimatorConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn from_json_file(path: &Path) -> AttitudeResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Copy with every field clamped into its documented range.
    pub fn sanitized(&self) -> Self {
        let defaults = EstimatorConfig::default();
        let mut out = self.clone();

        out.madgwick.beta = clamp_or(self.madgwick.beta, MIN_BETA, MAX_BETA, DEFAULT_BETA, "madgwick.beta");
        if !(self.madgwick.sample_freq_hz.is_finite() && self.madgwick.sample_freq_hz > 0.0) {
            warn!(
                "madgwick.sample_freq_hz {} is not positive, using {}",
                self.madgwick.sample_freq_hz, DEFAULT_SAMPLE_FREQ_HZ
            );
            out.madgwick.sample_freq_hz = DEFAULT_SAMPLE_FREQ_HZ;
        }

        out.ekf.process_noise = clamp_or(
            self.ekf.process_noise,
            MIN_PROCESS_NOISE,
            MAX_PROCESS_NOISE,
            defaults.ekf.process_noise,
            "ekf.process_noise",
        );
        out.ekf.accel_noise = positive_or(self.ekf.accel_noise, defaults.ekf.accel_noise, "ekf.accel_noise");
        out.ekf.mag_noise = positive_or(self.ekf.mag_noise, defaults.ekf.mag_noise, "ekf.mag_noise");

        out.heading_trust_percent = clamp_or(
            self.heading_trust_percent,
            0.0,
            100.0,
            defaults.heading_trust_percent,
            "heading_trust_percent",
        );

        if self.motion_window < MIN_SAMPLES {
            warn!(
                "motion_window {} is below {}, clamping",
                self.motion_window, MIN_SAMPLES
            );
            out.motion_window = MIN_SAMPLES;
        }

        out
    }

    pub fn heading_trust(&self) -> f64 {
        heading_trust_from_percent(self.heading_trust_percent)
    }

    /// Sample interval implied by the configured rate [s]
    pub fn nominal_dt(&self) -> f64 {
        let freq = self.madgwick.sample_freq_hz;
        if freq.is_finite() && freq > 0.0 {
            1.0 / freq
        } else {
            1.0 / DEFAULT_SAMPLE_FREQ_HZ
        }
    }
}

/// Map the 0-100 trust slider onto a [0, 1] trust factor.
pub fn heading_trust_from_percent(percent: f64) -> f64 {
    if !percent.is_finite() {
        return 1.0;
    }
    (percent / 100.0).clamp(0.0, 1.0)
}

pub(crate) fn clamp_or(value: f64, min: f64, max: f64, fallback: f64, name: &str) -> f64 {
    if !value.is_finite() {
        warn!("{} is not finite, using {}", name, fallback);
        return fallback;
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        warn!("{} {} outside [{}, {}], clamped to {}", name, value, min, max, clamped);
    }
    clamped
}

pub(crate) fn positive_or(value: f64, fallback: f64, name: &str) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!("{} {} must be positive, using {}", name, value, fallback);
        fallback
    }
}
