//! Track lifecycle management: spawn and uncertainty-driven pruning.
//!
//! # Track Management Policy
//! - **Spawn**: each measurement that did not correct any track seeds a new
//!   track at its position, zero velocity, `init_vel_cov` velocity variance.
//! - **Prune**: a track whose `uncertainty()` exceeds `max_uncertainty` is
//!   removed in the same cycle. There is no hysteresis; a pruned target may
//!   respawn from the very next measurement.
//!
//! Uncertainties are evaluated over the whole bank first and only then are
//! the offending tracks marked, so no track is skipped by a removal.

use crate::{
    filter_bank::FilterBank,
    track::Track,
    types::{Measurement, TrackId},
};

/// Configuration for track management policy.
#[derive(Clone, Debug)]
pub struct TrackManagerConfig {
    /// Initial velocity variance (m²/s²) on each axis
    pub init_vel_cov: f64,
    /// Tracks with √det(position covariance) above this are pruned
    pub max_uncertainty: f64,
}

impl Default for TrackManagerConfig {
    fn default() -> Self {
        Self {
            init_vel_cov: 1.0,
            max_uncertainty: 1.0,
        }
    }
}

/// Spawns and prunes tracks in a [`FilterBank`].
#[derive(Clone, Debug)]
pub struct TrackManager {
    pub config: TrackManagerConfig,
}

impl TrackManager {
    pub fn new(config: TrackManagerConfig) -> Self {
        Self { config }
    }

    /// Create a new track from an unmatched measurement.
    pub fn spawn(&self, bank: &mut FilterBank, meas: &Measurement) -> TrackId {
        let init_vel_cov = self.config.init_vel_cov;
        bank.insert_with(|id| Track::from_measurement(id, meas, init_vel_cov))
    }

    /// Ids of every track over the uncertainty threshold, in bank order.
    pub fn over_uncertain(&self, bank: &FilterBank) -> Vec<TrackId> {
        bank.iter()
            .filter(|t| !t.is_pruned() && t.uncertainty() > self.config.max_uncertainty)
            .map(|t| t.id)
            .collect()
    }

    /// Mark and compact over-uncertain tracks. Returns the removed ids.
    pub fn prune(&self, bank: &mut FilterBank) -> Vec<TrackId> {
        let doomed = self.over_uncertain(bank);
        for &id in &doomed {
            bank.mark_pruned(id);
        }
        let removed = bank.compact();
        debug_assert!(removed >= doomed.len());
        doomed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
