//! `localizer_core`: Kalman filter-bank localization of a single target
//! from noisy 3-D detections.
//!
//! # Module layout
//! - [`types`]         IDs, state vectors, measurements, estimates
//! - [`config`]        TOML configuration and validation
//! - [`error`]         Shared error type
//! - [`preprocess`]    Detections → world-frame measurements
//! - [`kf`]            Constant-velocity Kalman filter (predict / update)
//! - [`track`]         Track struct and status management
//! - [`filter_bank`]   Arena of live tracks with stable ids
//! - [`gating`]        KL-divergence gating
//! - [`association`]   Greedy nearest-measurement association
//! - [`track_manager`] Spawn / uncertainty pruning
//! - [`selector`]      Most-certain-track selection
//! - [`pipeline`]      Measurement cycle and predict pass orchestrator
//! - [`service`]       Predictor timer and measurement consumer tasks
//! - [`metrics`]       RMSE, estimate availability, track churn

pub mod association;
pub mod config;
pub mod error;
pub mod filter_bank;
pub mod gating;
pub mod kf;
pub mod metrics;
pub mod pipeline;
pub mod preprocess;
pub mod selector;
pub mod service;
pub mod track;
pub mod track_manager;
pub mod types;

pub use association::ClaimPolicy;
pub use config::LocalizerConfig;
pub use error::{Result, TrackerError};
pub use filter_bank::FilterBank;
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput};
pub use preprocess::{MeasurementPreprocessor, StaticTransformSource, TransformSource};
pub use service::{LocalizerService, SharedPipeline};
pub use track::{Track, TrackStatus};
pub use types::{
    DetectionBatch, Estimate, Measurement, MeasurementBatch, PosCov, PosVec, StateCov, StateVec, TrackId,
};
