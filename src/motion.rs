use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_LEN: usize = 10;
/// Fewer samples than this give no usable spread estimate
pub const MIN_SAMPLES: usize = 3;

const AGITATED_STD: f64 = 0.3; // g
const MODERATE_STD: f64 = 0.1; // g

/// Motion band derived from the spread of recent accel magnitudes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionLevel {
    Quiet,
    Moderate,
    Agitated,
}

impl MotionLevel {
    pub fn from_std_dev(std_dev: f64) -> Self {
        if std_dev > AGITATED_STD {
            MotionLevel::Agitated
        } else if std_dev > MODERATE_STD {
            MotionLevel::Moderate
        } else {
            MotionLevel::Quiet
        }
    }

    /// Attitude-block process noise for this band
    pub fn process_noise(&self) -> f64 {
        match self {
            MotionLevel::Quiet => 0.01,
            MotionLevel::Moderate => 0.02,
            MotionLevel::Agitated => 0.05,
        }
    }
}

/// Bounded trailing window of accelerometer magnitudes (g).
///
/// Capacity is reserved up front, so pushing never allocates.
pub struct AccelMagnitudeWindow {
    window: VecDeque<f64>,
    window_size: usize,
}

impl AccelMagnitudeWindow {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(MIN_SAMPLES);
        AccelMagnitudeWindow {
            window: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    pub fn push(&mut self, magnitude: f64) {
        if !magnitude.is_finite() {
            return;
        }
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(magnitude);
    }

    /// Population standard deviation, `None` until `MIN_SAMPLES` are buffered
    pub fn std_dev(&self) -> Option<f64> {
        let n = self.window.len();
        if n < MIN_SAMPLES {
            return None;
        }
        let mean = self.window.iter().sum::<f64>() / n as f64;
        let var = self
            .window
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / n as f64;
        Some(var.sqrt())
    }

    pub fn motion_level(&self) -> Option<MotionLevel> {
        self.std_dev().map(MotionLevel::from_std_dev)
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.window_size
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}

impl Default for AccelMagnitudeWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_LEN)
    }
}
