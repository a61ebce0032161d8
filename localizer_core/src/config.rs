//! Localizer configuration, loaded once at startup from TOML.
//!
//! Every tuning scalar is compulsory: a file that omits one is rejected with
//! [`TrackerError::MissingConfiguration`] before any core object exists.
//!
//! ```toml
//! world_frame = "local_origin"      # optional
//! xy_covariance_coeff = 0.1
//! z_covariance_coeff = 0.2
//! process_noise = 0.01
//! init_vel_cov = 1.0
//! predict_period = 0.05             # seconds
//! max_update_divergence = 2.0
//! max_uncertainty = 0.5
//! transform_timeout_ms = 10         # optional
//! claim_policy = "shared"           # optional: "shared" | "exclusive"
//! ```

use crate::{
    association::ClaimPolicy,
    error::{Result, TrackerError},
};
use serde::Deserialize;
use std::{path::Path, time::Duration};

pub const DEFAULT_WORLD_FRAME: &str = "local_origin";
pub const DEFAULT_TRANSFORM_TIMEOUT: Duration = Duration::from_millis(10);

/// Validated configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalizerConfig {
    /// Frame all estimates are expressed in
    pub world_frame: String,
    /// Lateral detection variance
    pub xy_covariance_coeff: f64,
    /// Depth detection variance coefficient
    pub z_covariance_coeff: f64,
    /// Diagonal process noise added per predict step
    pub process_noise: f64,
    /// Initial velocity variance of spawned tracks
    pub init_vel_cov: f64,
    /// Predictor tick period
    pub predict_period: Duration,
    /// Divergence gate
    pub max_update_divergence: f64,
    /// Prune threshold on √det(position covariance)
    pub max_uncertainty: f64,
    pub transform_timeout: Duration,
    pub claim_policy: ClaimPolicy,
}

/// On-disk form: everything optional so absence can be reported by name.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    world_frame: Option<String>,
    xy_covariance_coeff: Option<f64>,
    z_covariance_coeff: Option<f64>,
    process_noise: Option<f64>,
    init_vel_cov: Option<f64>,
    predict_period: Option<f64>,
    max_update_divergence: Option<f64>,
    max_uncertainty: Option<f64>,
    transform_timeout_ms: Option<u64>,
    claim_policy: Option<ClaimPolicy>,
}

fn required(value: Option<f64>, key: &str) -> Result<f64> {
    value.ok_or_else(|| TrackerError::MissingConfiguration(key.to_owned()))
}

impl LocalizerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(s)?;
        let predict_period = required(raw.predict_period, "predict_period")?;
        if !(predict_period > 0.0) || !predict_period.is_finite() {
            return Err(TrackerError::InvalidConfiguration(format!(
                "predict_period must be positive, got {predict_period}"
            )));
        }
        let config = Self {
            world_frame: raw.world_frame.unwrap_or_else(|| DEFAULT_WORLD_FRAME.to_owned()),
            xy_covariance_coeff: required(raw.xy_covariance_coeff, "xy_covariance_coeff")?,
            z_covariance_coeff: required(raw.z_covariance_coeff, "z_covariance_coeff")?,
            process_noise: required(raw.process_noise, "process_noise")?,
            init_vel_cov: required(raw.init_vel_cov, "init_vel_cov")?,
            predict_period: Duration::from_secs_f64(predict_period),
            max_update_divergence: required(raw.max_update_divergence, "max_update_divergence")?,
            max_uncertainty: required(raw.max_uncertainty, "max_uncertainty")?,
            transform_timeout: raw
                .transform_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TRANSFORM_TIMEOUT),
            claim_policy: raw.claim_policy.unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Reject values the core cannot operate with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(TrackerError::InvalidConfiguration(msg)) };
        if self.predict_period.is_zero() {
            return invalid("predict_period must be positive".into());
        }
        let non_negative = [
            ("xy_covariance_coeff", self.xy_covariance_coeff),
            ("z_covariance_coeff", self.z_covariance_coeff),
            ("process_noise", self.process_noise),
            ("init_vel_cov", self.init_vel_cov),
        ];
        for (key, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                return invalid(format!("{key} must be finite and non-negative, got {value}"));
            }
        }
        let positive = [
            ("max_update_divergence", self.max_update_divergence),
            ("max_uncertainty", self.max_uncertainty),
        ];
        for (key, value) in positive {
            if !(value > 0.0) {
                return invalid(format!("{key} must be positive, got {value}"));
            }
        }
        if self.world_frame.is_empty() {
            return invalid("world_frame must not be empty".into());
        }
        Ok(())
    }
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            world_frame: DEFAULT_WORLD_FRAME.to_owned(),
            xy_covariance_coeff: 0.1,
            z_covariance_coeff: 0.2,
            process_noise: 0.01,
            init_vel_cov: 1.0,
            predict_period: Duration::from_millis(50),
            max_update_divergence: 2.0,
            max_uncertainty: 0.5,
            transform_timeout: DEFAULT_TRANSFORM_TIMEOUT,
            claim_policy: ClaimPolicy::Shared,
        }
    }
}
