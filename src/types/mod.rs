pub mod linalg;

pub use linalg::*;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::angles::wrap_degrees_360;
use crate::error::{AttitudeError, AttitudeResult};
use crate::quaternion::Quaternion;

/// Accelerometer reading in g.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccelData {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelData {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Gyroscope reading in degrees/second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GyroData {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl GyroData {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// One raw IMU sample as handed over by the sensor-polling side.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub accel: AccelData,
    pub gyro: GyroData,
    /// External heading in degrees [0, 360)
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub heading_valid: bool,
    /// Seconds since the previous sample
    pub dt: f64,
}

impl SensorSample {
    pub fn new(accel: AccelData, gyro: GyroData, dt: f64) -> Self {
        Self {
            accel,
            gyro,
            heading: None,
            heading_valid: false,
            dt,
        }
    }

    pub fn with_heading(mut self, heading_deg: f64, valid: bool) -> Self {
        self.heading = Some(heading_deg);
        self.heading_valid = valid;
        self
    }

    /// Heading that may be fed to a correction step, if any.
    pub fn usable_heading(&self) -> Option<f64> {
        match self.heading {
            Some(h) if self.heading_valid && h.is_finite() => Some(h),
            _ => None,
        }
    }

    pub fn validate(&self) -> AttitudeResult<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(AttitudeError::InvalidSample(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if !self.accel.is_finite() {
            return Err(AttitudeError::InvalidSample(
                "accelerometer reading is not finite".to_string(),
            ));
        }
        if !self.gyro.is_finite() {
            return Err(AttitudeError::InvalidSample(
                "gyroscope reading is not finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Roll, pitch, yaw in degrees, each in (-180, 180].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    pub fn as_tuple(&self) -> (f64, f64, f64) {
        (self.roll, self.pitch, self.yaw)
    }

    pub fn is_finite(&self) -> bool {
        self.roll.is_finite() && self.pitch.is_finite() && self.yaw.is_finite()
    }

    /// Yaw on the compass scale the heading sensor reports, [0, 360)
    pub fn heading_360(&self) -> f64 {
        wrap_degrees_360(self.yaw)
    }
}

/// Estimator output handed to rendering/plotting consumers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub euler: EulerAngles,
    pub quaternion: Quaternion,
}
