//! Pipeline orchestrator: owns the filter bank and runs both passes that
//! mutate it.
//!
//! # Measurement cycle (one batch)
//! 1. Associate: every track picks its minimum-divergence measurement
//! 2. Correct the tracks whose pick passed the gate
//! 3. Prune tracks over the uncertainty threshold (snapshot, mark, compact)
//! 4. Select the most certain surviving track → estimate
//! 5. Spawn tracks for measurements that corrected nothing
//!
//! Tracks spawned in step 5 only carry one measurement's evidence and are
//! not candidates for the estimate of the cycle that created them.
//!
//! # Predict pass
//! Time update of every track by the measured tick interval, no correction.

use crate::{
    association::{Association, ClaimPolicy, GreedyAssociator},
    config::LocalizerConfig,
    error::{Result, TrackerError},
    filter_bank::FilterBank,
    kf::{CvKalmanFilter, CvKfConfig},
    selector,
    track_manager::{TrackManager, TrackManagerConfig},
    types::{Estimate, MeasurementBatch, TrackId},
};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the tracking pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Divergence gate: correct only if the closest divergence is below this.
    pub gate_threshold: f64,
    /// Whether accepted measurements stay available to later tracks
    pub claim_policy: ClaimPolicy,
    /// KF motion model config
    pub kf_config: CvKfConfig,
    /// Track management config
    pub track_manager_config: TrackManagerConfig,
    /// Frame id stamped on every estimate
    pub world_frame: String,
    /// Keep the per-track association decisions in the output
    pub collect_debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&LocalizerConfig::default())
    }
}

impl From<&LocalizerConfig> for PipelineConfig {
    fn from(cfg: &LocalizerConfig) -> Self {
        Self {
            gate_threshold: cfg.max_update_divergence,
            claim_policy: cfg.claim_policy,
            kf_config: CvKfConfig {
                process_noise: cfg.process_noise,
            },
            track_manager_config: TrackManagerConfig {
                init_vel_cov: cfg.init_vel_cov,
                max_uncertainty: cfg.max_uncertainty,
            },
            world_frame: cfg.world_frame.clone(),
            collect_debug: true,
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<()> {
        if !(self.gate_threshold > 0.0) {
            return Err(TrackerError::InvalidConfiguration(format!(
                "gate threshold must be positive, got {}",
                self.gate_threshold
            )));
        }
        if !(self.track_manager_config.max_uncertainty > 0.0) {
            return Err(TrackerError::InvalidConfiguration(format!(
                "uncertainty threshold must be positive, got {}",
                self.track_manager_config.max_uncertainty
            )));
        }
        if !(self.kf_config.process_noise >= 0.0) || !(self.track_manager_config.init_vel_cov >= 0.0) {
            return Err(TrackerError::InvalidConfiguration(
                "process noise and initial velocity covariance must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Outputs of one measurement cycle.
#[derive(Clone, Debug, Default)]
pub struct PipelineOutput {
    /// Most certain track after correction and pruning, if any
    pub estimate: Option<Estimate>,
    /// Closest-match decision per track (populated when `collect_debug`)
    pub associations: Vec<Association>,
    /// Number of tracks corrected this cycle
    pub corrections: usize,
    /// Corrections rejected for numeric degeneracy
    pub failed_corrections: usize,
    /// Number of tracks spawned this cycle
    pub births: usize,
    /// Ids of tracks pruned this cycle
    pub pruned: Vec<TrackId>,
    /// Live tracks after the cycle
    pub track_count: usize,
    /// Wall-clock time of processing
    pub total_time_us: u64,
}

impl PipelineOutput {
    pub fn deletions(&self) -> usize {
        self.pruned.len()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The tracking pipeline. Holds the filter bank and the models acting on it.
pub struct Pipeline {
    pub config: PipelineConfig,
    bank: FilterBank,
    pub kf: CvKalmanFilter,
    pub track_manager: TrackManager,
    pub associator: GreedyAssociator,
    cycles: u64,
    predict_passes: u64,
}

impl Pipeline {
    /// Create a new pipeline. Refuses configurations it cannot run with.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let kf = CvKalmanFilter::new(config.kf_config.clone());
        let track_manager = TrackManager::new(config.track_manager_config.clone());
        let associator = GreedyAssociator::new(config.gate_threshold, config.claim_policy);
        Ok(Self {
            config,
            bank: FilterBank::new(),
            kf,
            track_manager,
            associator,
            cycles: 0,
            predict_passes: 0,
        })
    }

    pub fn bank(&self) -> &FilterBank {
        &self.bank
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Completed predict passes since construction or the last reset.
    pub fn predict_passes(&self) -> u64 {
        self.predict_passes
    }

    /// Predict pass: advance every track by `dt` with no correction.
    ///
    /// A track whose covariance degrades is dropped rather than kept with a
    /// corrupted state. Returns the number of tracks dropped that way.
    pub fn predict_all(&mut self, dt: f64) -> Result<usize> {
        if !(dt >= 0.0) || !dt.is_finite() {
            return Err(TrackerError::NegativeTimeStep(dt));
        }
        let kf = &self.kf;
        let failed: Vec<TrackId> = self
            .bank
            .par_iter_mut()
            .filter_map(|track| match track.predict(kf, dt) {
                Ok(()) => None,
                Err(err) => {
                    warn!(track = %track.id, %err, "prediction degenerated, dropping track");
                    Some(track.id)
                }
            })
            .collect();
        for &id in &failed {
            self.bank.mark_pruned(id);
        }
        self.bank.compact();
        self.predict_passes += 1;
        Ok(failed.len())
    }

    /// Run one measurement cycle.
    pub fn process_measurements(&mut self, batch: &MeasurementBatch) -> PipelineOutput {
        let start_total = Instant::now();
        self.cycles += 1;
        let measurements = &batch.measurements;
        let mut out = PipelineOutput::default();

        // ----------------------------------------------------------------
        // Step 1: Associate (pure, over the bank as it is now)
        // ----------------------------------------------------------------
        let association = self.associator.associate(self.bank.as_slice(), measurements);
        if association.degenerate_pairs > 0 {
            warn!(
                pairs = association.degenerate_pairs,
                "skipped track/measurement pairs with undefined divergence"
            );
        }

        // ----------------------------------------------------------------
        // Step 2: Correct accepted pairs
        // ----------------------------------------------------------------
        let mut meas_used = vec![0u32; measurements.len()];
        for assoc in association.accepted() {
            let meas = &measurements[assoc.meas_idx];
            let Some(track) = self.bank.get_mut(assoc.track_id) else {
                continue;
            };
            match track.correct(&self.kf, meas) {
                Ok(_) => {
                    meas_used[assoc.meas_idx] += 1;
                    out.corrections += 1;
                }
                Err(err) => {
                    warn!(track = %assoc.track_id, %err, "correction rejected");
                    out.failed_corrections += 1;
                }
            }
        }

        // ----------------------------------------------------------------
        // Step 3: Prune over-uncertain tracks
        // ----------------------------------------------------------------
        out.pruned = self.track_manager.prune(&mut self.bank);

        // ----------------------------------------------------------------
        // Step 4: Select the most certain survivor
        // ----------------------------------------------------------------
        out.estimate = selector::most_certain(&self.bank)
            .map(|t| selector::to_estimate(t, batch.timestamp, &self.config.world_frame));

        // ----------------------------------------------------------------
        // Step 5: Spawn tracks for unused measurements
        // ----------------------------------------------------------------
        for (meas, &used) in measurements.iter().zip(&meas_used) {
            if used == 0 {
                self.track_manager.spawn(&mut self.bank, meas);
                out.births += 1;
            }
        }

        if self.config.collect_debug {
            out.associations = association.decisions;
        }
        out.track_count = self.bank.len();
        out.total_time_us = start_total.elapsed().as_micros() as u64;

        debug!(
            cycle = self.cycles,
            measurements = measurements.len(),
            corrections = out.corrections,
            births = out.births,
            pruned = out.pruned.len(),
            tracks = out.track_count,
            estimate = ?out.estimate.as_ref().map(|e| e.track_id),
            "measurement cycle"
        );
        out
    }

    /// Reset: clear all tracks.
    pub fn reset(&mut self) {
        self.bank.clear();
        self.cycles = 0;
        self.predict_passes = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
