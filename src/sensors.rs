//! Device-side sensor records and the clock that turns their timestamps into dt.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AttitudeError, AttitudeResult};
use crate::types::{AccelData, GyroData, SensorSample};

/// Polling interval the device is read at [s]
pub const NOMINAL_DT: f64 = 0.1;
/// Gaps longer than this are treated as a restart, not integrated [s]
pub const MAX_DT: f64 = 1.0;

/// One JSON record as served by the sensor board.
///
/// Accel in g, gyro in deg/s, `angle` is the heading sensor reading in degrees.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReading {
    pub accel_x: Option<f64>,
    pub accel_y: Option<f64>,
    pub accel_z: Option<f64>,
    pub gyro_x: Option<f64>,
    pub gyro_y: Option<f64>,
    pub gyro_z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    #[serde(default)]
    pub angle_valid: bool,
    /// 14-bit encoder count behind `angle`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle_raw: Option<u32>,
    /// Seconds, any epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingStatus {
    Valid,
    /// Sensor present but reading flagged bad
    Invalid,
    /// Firmware without a heading sensor
    Absent,
}

impl DeviceReading {
    pub fn from_json(line: &str) -> AttitudeResult<Self> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn heading_status(&self) -> HeadingStatus {
        match self.angle {
            None => HeadingStatus::Absent,
            Some(angle) if self.angle_valid && angle.is_finite() => HeadingStatus::Valid,
            Some(_) => HeadingStatus::Invalid,
        }
    }

    /// Build a filter sample; every IMU axis must be present.
    pub fn to_sample(&self, dt: f64) -> AttitudeResult<SensorSample> {
        let accel = AccelData::new(
            required(self.accel_x, "accelX")?,
            required(self.accel_y, "accelY")?,
            required(self.accel_z, "accelZ")?,
        );
        let gyro = GyroData::new(
            required(self.gyro_x, "gyroX")?,
            required(self.gyro_y, "gyroY")?,
            required(self.gyro_z, "gyroZ")?,
        );

        let mut sample = SensorSample::new(accel, gyro, dt);
        if let Some(angle) = self.angle {
            sample = sample.with_heading(angle, self.heading_status() == HeadingStatus::Valid);
        }
        sample.validate()?;
        Ok(sample)
    }
}

fn required(value: Option<f64>, name: &'static str) -> AttitudeResult<f64> {
    value.ok_or(AttitudeError::MissingField(name))
}

/// Derives per-sample dt from record timestamps.
///
/// Falls back to the nominal interval whenever the delta is unknown,
/// non-positive or longer than `max_dt`.
pub struct SampleClock {
    nominal_dt: f64,
    max_dt: f64,
    last_timestamp: Option<f64>,
}

impl SampleClock {
    pub fn new(nominal_dt: f64, max_dt: f64) -> Self {
        let nominal_dt = if nominal_dt.is_finite() && nominal_dt > 0.0 {
            nominal_dt
        } else {
            NOMINAL_DT
        };
        Self {
            nominal_dt,
            max_dt: max_dt.max(nominal_dt),
            last_timestamp: None,
        }
    }

    pub fn next_dt(&mut self, timestamp: Option<f64>) -> f64 {
        let timestamp = match timestamp {
            Some(t) if t.is_finite() => t,
            _ => return self.nominal_dt,
        };

        let dt = match self.last_timestamp {
            Some(last) => timestamp - last,
            None => self.nominal_dt,
        };
        self.last_timestamp = Some(timestamp);

        if dt > 0.0 && dt <= self.max_dt {
            dt
        } else {
            debug!("clock: dt {:.3}s out of range, using {}", dt, self.nominal_dt);
            self.nominal_dt
        }
    }

    pub fn nominal_dt(&self) -> f64 {
        self.nominal_dt
    }

    pub fn reset(&mut self) {
        self.last_timestamp = None;
    }
}

impl Default for SampleClock {
    fn default() -> Self {
        Self::new(NOMINAL_DT, MAX_DT)
    }
}
