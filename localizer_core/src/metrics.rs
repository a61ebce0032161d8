//! Localization metrics: estimate RMSE against ground truth, estimate
//! availability, and track churn.

use crate::{pipeline::PipelineOutput, types::TrackId};
use serde::{Deserialize, Serialize};

/// Ground-truth state of one target at a given time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroundTruth {
    /// True target ID (from simulator)
    pub target_id: u64,
    pub time: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

/// Accumulated metric statistics.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LocalizationMetrics {
    /// Measurement cycles evaluated
    pub cycles: u64,
    /// Cycles that published an estimate
    pub cycles_with_estimate: u64,
    /// Estimates scored against a truth
    pub n_scored: u64,
    /// Sum of squared 3-D position errors (for RMSE)
    pub sum_sq_pos_err: f64,
    /// Worst single position error seen
    pub max_pos_err: f64,
    pub births: u64,
    pub deletions: u64,
    /// Times the published estimate changed to a different track
    pub estimate_switches: u64,
    #[serde(skip)]
    last_track: Option<TrackId>,
}

impl LocalizationMetrics {
    /// Root-mean-square position error (meters, 3D).
    pub fn rmse_position(&self) -> f64 {
        if self.n_scored == 0 {
            return 0.0;
        }
        (self.sum_sq_pos_err / self.n_scored as f64).sqrt()
    }

    /// Fraction of cycles that published an estimate.
    pub fn estimate_rate(&self) -> f64 {
        if self.cycles == 0 {
            return 0.0;
        }
        self.cycles_with_estimate as f64 / self.cycles as f64
    }

    /// Accumulate one cycle. The estimate is scored against the nearest
    /// ground-truth target, since a single estimate is published per cycle.
    pub fn record_cycle(&mut self, output: &PipelineOutput, truths: &[GroundTruth]) {
        self.cycles += 1;
        self.births += output.births as u64;
        self.deletions += output.deletions() as u64;

        let Some(est) = &output.estimate else {
            return;
        };
        self.cycles_with_estimate += 1;
        if self.last_track.is_some_and(|prev| prev != est.track_id) {
            self.estimate_switches += 1;
        }
        self.last_track = Some(est.track_id);

        let nearest = truths
            .iter()
            .map(|gt| {
                (0..3)
                    .map(|i| (est.position[i] - gt.position[i]).powi(2))
                    .sum::<f64>()
            })
            .min_by(|a, b| a.total_cmp(b));
        if let Some(sq) = nearest {
            self.sum_sq_pos_err += sq;
            self.max_pos_err = self.max_pos_err.max(sq.sqrt());
            self.n_scored += 1;
        }
    }
}
