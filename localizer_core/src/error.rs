//! Error type shared by every stage of the localizer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// Sensor → world transform could not be obtained. The cycle is dropped
    /// with the filter bank untouched.
    #[error("transform from '{source_frame}' to '{target_frame}' unavailable: {reason}")]
    TransformUnavailable {
        target_frame: String,
        source_frame: String,
        reason: String,
    },

    #[error("missing required configuration parameter '{0}'")]
    MissingConfiguration(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to read configuration: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("malformed configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("negative or non-finite time step {0}")]
    NegativeTimeStep(f64),

    /// A covariance became singular, indefinite or non-finite.
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(&'static str),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
