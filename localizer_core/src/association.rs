//! Data association: greedy per-track nearest-measurement matching.
//!
//! # Algorithm
//! 1. For each track (bank order), compute the divergence of every candidate
//!    measurement from the track's positional marginal.
//! 2. The track picks the candidate with the smallest divergence (first one
//!    wins on ties). Pairs whose divergence is undefined are skipped.
//! 3. The pick is accepted for correction only if it passes the gate.
//!
//! This is not a global assignment. Under [`ClaimPolicy::Shared`] every track
//! sees every measurement, so two tracks may both correct from the same one.
//! Under [`ClaimPolicy::Exclusive`] an accepted measurement is withdrawn from
//! the candidates of the tracks that follow in bank order.

use crate::{
    gating::divergence_gate,
    track::Track,
    types::{Measurement, TrackId},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether an accepted measurement stays available to later tracks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPolicy {
    #[default]
    Shared,
    Exclusive,
}

/// Minimum-divergence candidate for one track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosestMatch {
    pub meas_idx: usize,
    pub divergence: f64,
    /// True if divergence < gate threshold
    pub passes: bool,
}

/// Outcome of the search over all candidates for one track.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClosestSearch {
    pub best: Option<ClosestMatch>,
    /// Candidates skipped because their divergence was undefined
    pub degenerate: usize,
}

/// Find the measurement with the smallest divergence from `track`.
/// `available[i] == false` excludes measurement `i`; `None` means all are candidates.
pub fn find_closest_measurement(
    track: &Track,
    measurements: &[Measurement],
    available: Option<&[bool]>,
    gate_threshold: f64,
) -> ClosestSearch {
    let pos = track.position();
    let pos_cov = track.position_cov();
    let mut search = ClosestSearch::default();

    for (mi, meas) in measurements.iter().enumerate() {
        if available.is_some_and(|mask| !mask[mi]) {
            continue;
        }
        match divergence_gate(&meas.position, &meas.covariance, &pos, &pos_cov, gate_threshold) {
            Ok(gate) => {
                let better = search
                    .best
                    .map_or(true, |b| gate.divergence < b.divergence);
                if better {
                    search.best = Some(ClosestMatch {
                        meas_idx: mi,
                        divergence: gate.divergence,
                        passes: gate.passes,
                    });
                }
            }
            Err(err) => {
                tracing::trace!(track = %track.id, meas = mi, %err, "skipping degenerate pair");
                search.degenerate += 1;
            }
        }
    }
    search
}

/// Association decision for one track.
#[derive(Clone, Debug, PartialEq)]
pub struct Association {
    pub track_id: TrackId,
    pub meas_idx: usize,
    pub divergence: f64,
    /// Passed the gate; the track will be corrected from `meas_idx`
    pub accepted: bool,
}

/// Result of associating a whole batch against the bank.
#[derive(Clone, Debug, Default)]
pub struct AssociationOutcome {
    /// Closest-match decision for every track that had a valid candidate
    pub decisions: Vec<Association>,
    /// Tracks that receive no correction this cycle
    pub unmatched_tracks: Vec<TrackId>,
    /// Number of (track, measurement) pairs with undefined divergence
    pub degenerate_pairs: usize,
}

impl AssociationOutcome {
    pub fn accepted(&self) -> impl Iterator<Item = &Association> {
        self.decisions.iter().filter(|a| a.accepted)
    }
}

/// Greedy nearest-neighbour associator with a divergence gate.
#[derive(Clone, Debug)]
pub struct GreedyAssociator {
    pub gate_threshold: f64,
    pub policy: ClaimPolicy,
}

impl GreedyAssociator {
    pub fn new(gate_threshold: f64, policy: ClaimPolicy) -> Self {
        Self {
            gate_threshold,
            policy,
        }
    }

    /// Associate `measurements` against `tracks` (bank order). Pruned tracks
    /// are ignored. Pure: no track is modified.
    pub fn associate(&self, tracks: &[Track], measurements: &[Measurement]) -> AssociationOutcome {
        let live: Vec<&Track> = tracks.iter().filter(|t| !t.is_pruned()).collect();
        let gate = self.gate_threshold;

        let searches: Vec<ClosestSearch> = match self.policy {
            // Independent per track: search in parallel, keep bank order
            ClaimPolicy::Shared => live
                .par_iter()
                .map(|t| find_closest_measurement(t, measurements, None, gate))
                .collect(),
            ClaimPolicy::Exclusive => {
                let mut available = vec![true; measurements.len()];
                live.iter()
                    .map(|t| {
                        let search = find_closest_measurement(t, measurements, Some(&available), gate);
                        if let Some(best) = search.best.filter(|b| b.passes) {
                            available[best.meas_idx] = false;
                        }
                        search
                    })
                    .collect()
            }
        };

        let mut outcome = AssociationOutcome::default();
        for (track, search) in live.iter().zip(searches) {
            outcome.degenerate_pairs += search.degenerate;
            match search.best {
                Some(best) => {
                    if !best.passes {
                        outcome.unmatched_tracks.push(track.id);
                    }
                    outcome.decisions.push(Association {
                        track_id: track.id,
                        meas_idx: best.meas_idx,
                        divergence: best.divergence,
                        accepted: best.passes,
                    });
                }
                None => outcome.unmatched_tracks.push(track.id),
            }
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
