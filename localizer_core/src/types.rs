//! Fundamental types used across the entire workspace.

use nalgebra::{Matrix3, Matrix6, Vector3, Vector6};
use sensor_models::Detection;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Scalar type: f64 throughout for numerical precision in the Kalman filter.
// ---------------------------------------------------------------------------

/// 6-DOF state vector: [px, py, pz, vx, vy, vz]
pub type StateVec = Vector6<f64>;

/// 6×6 state covariance matrix
pub type StateCov = Matrix6<f64>;

/// 3-D position
pub type PosVec = Vector3<f64>;

/// 3×3 position covariance
pub type PosCov = Matrix3<f64>;

/// Value written on the unestimated diagonal entries of an [`Estimate`]
/// covariance (orientation block).
pub const UNESTIMATED_VARIANCE: f64 = 666.0;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable track identity. Allocated monotonically by the filter bank, never reused.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Detections (input, already decoded)
// ---------------------------------------------------------------------------

/// All detections from one camera frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionBatch {
    /// Sensor (camera optical) frame the detections are expressed in
    pub frame_id: String,
    /// Capture time of the frame (seconds)
    pub timestamp: f64,
    pub detections: Vec<Detection>,
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// A 3-D position measurement in the world frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub position: PosVec,
    /// Observation noise (symmetric positive-semidefinite)
    pub covariance: PosCov,
    pub timestamp: f64,
}

impl Measurement {
    pub fn new(position: PosVec, covariance: PosCov, timestamp: f64) -> Self {
        Self {
            position,
            covariance,
            timestamp,
        }
    }
}

/// Measurements of one processing cycle.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MeasurementBatch {
    pub timestamp: f64,
    pub measurements: Vec<Measurement>,
}

impl MeasurementBatch {
    pub fn new(timestamp: f64, measurements: Vec<Measurement>) -> Self {
        Self {
            timestamp,
            measurements,
        }
    }

    pub fn empty(timestamp: f64) -> Self {
        Self::new(timestamp, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Estimate (output)
// ---------------------------------------------------------------------------

/// Snapshot of the most certain track, published once per successful cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Estimate {
    pub track_id: TrackId,
    /// World-frame position (meters)
    pub position: [f64; 3],
    /// Orientation quaternion [x, y, z, w]; always identity
    pub orientation: [f64; 4],
    /// Row-major 6×6 pose covariance. Position block is the track's position
    /// covariance; remaining diagonal entries are [`UNESTIMATED_VARIANCE`].
    pub covariance: [f64; 36],
    pub timestamp: f64,
    pub frame_id: String,
}

impl Estimate {
    pub fn new(track_id: TrackId, position: &PosVec, pos_cov: &PosCov, timestamp: f64, frame_id: &str) -> Self {
        let mut covariance = [0.0; 36];
        for r in 0..6 {
            for c in 0..6 {
                if r < 3 && c < 3 {
                    covariance[r * 6 + c] = pos_cov[(r, c)];
                } else if r == c {
                    covariance[r * 6 + c] = UNESTIMATED_VARIANCE;
                }
            }
        }
        Self {
            track_id,
            position: [position.x, position.y, position.z],
            orientation: [0.0, 0.0, 0.0, 1.0],
            covariance,
            timestamp,
            frame_id: frame_id.to_owned(),
        }
    }

    pub fn position_vec(&self) -> PosVec {
        PosVec::new(self.position[0], self.position[1], self.position[2])
    }

    pub fn covariance_matrix(&self) -> Matrix6<f64> {
        Matrix6::from_row_slice(&self.covariance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_covariance_layout() {
        let cov = PosCov::new(1.0, 0.1, 0.2, 0.1, 2.0, 0.3, 0.2, 0.3, 3.0);
        let est = Estimate::new(TrackId(4), &PosVec::new(1.0, 2.0, 3.0), &cov, 12.5, "local_origin");
        let m = est.covariance_matrix();
        assert_eq!(m.fixed_view::<3, 3>(0, 0).into_owned(), cov);
        for i in 3..6 {
            assert_eq!(m[(i, i)], UNESTIMATED_VARIANCE);
        }
        assert_eq!(m[(0, 4)], 0.0);
        assert_eq!(m[(5, 3)], 0.0);
        assert_eq!(est.orientation, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(est.frame_id, "local_origin");
    }
}
