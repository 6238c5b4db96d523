use thiserror::Error;

/// Attitude tracker error types
///
/// Only the input and configuration boundary can fail; the filters
/// themselves absorb degenerate data and never return errors.
#[derive(Error, Debug)]
pub enum AttitudeError {
    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    #[error("Missing field in sensor record: {0}")]
    MissingField(&'static str),

    #[error("Config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type AttitudeResult<T> = Result<T, AttitudeError>;
