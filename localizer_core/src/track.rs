//! Track: one constant-velocity Kalman filter instance and its lifecycle status.

use crate::{
    error::Result,
    kf::{KalmanFilter, KfUpdateResult},
    types::{Measurement, PosCov, PosVec, StateCov, StateVec, TrackId},
};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackStatus {
    /// Spawned from an unmatched measurement, not yet touched by a pass
    Created,
    /// Last touched by a predict-only step
    Predicted,
    /// Last touched by a correction
    Corrected,
    /// Marked for removal; compacted out of the bank at the end of the pass
    Pruned,
}

/// A single target hypothesis.
#[derive(Clone, Debug)]
pub struct Track {
    /// Unique identifier
    pub id: TrackId,
    /// Estimated state vector [px,py,pz,vx,vy,vz]
    pub state: StateVec,
    /// State estimation covariance
    pub cov: StateCov,
    /// Lifecycle status
    pub status: TrackStatus,
    /// Total number of corrections (including the spawning measurement)
    pub total_hits: u32,
    /// Timestamp of the last correction
    pub last_corrected: f64,
    /// Timestamp of birth
    pub born_at: f64,
}

impl Track {
    pub fn new(id: TrackId, state: StateVec, cov: StateCov, birth_time: f64) -> Self {
        Self {
            id,
            state,
            cov,
            status: TrackStatus::Created,
            total_hits: 1,
            last_corrected: birth_time,
            born_at: birth_time,
        }
    }

    /// Seed a track from a measurement: position and its covariance in the
    /// position block, zero velocity with `init_vel_cov · I₃` uncertainty.
    pub fn from_measurement(id: TrackId, meas: &Measurement, init_vel_cov: f64) -> Self {
        let mut state = StateVec::zeros();
        state.fixed_rows_mut::<3>(0).copy_from(&meas.position);

        let mut cov = StateCov::zeros();
        cov.fixed_view_mut::<3, 3>(0, 0).copy_from(&meas.covariance);
        cov.fixed_view_mut::<3, 3>(3, 3)
            .copy_from(&(Matrix3::<f64>::identity() * init_vel_cov));

        Self::new(id, state, cov, meas.timestamp)
    }

    pub fn position(&self) -> PosVec {
        self.state.fixed_rows::<3>(0).into_owned()
    }

    pub fn velocity(&self) -> PosVec {
        self.state.fixed_rows::<3>(3).into_owned()
    }

    /// Positional marginal of the covariance.
    pub fn position_cov(&self) -> PosCov {
        self.cov.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// √det(position covariance). Non-finite or negative determinants count
    /// as infinite uncertainty so that a degraded track is pruned rather than
    /// selected.
    pub fn uncertainty(&self) -> f64 {
        let det = self.position_cov().determinant();
        if det.is_finite() && det >= 0.0 {
            det.sqrt()
        } else {
            f64::INFINITY
        }
    }

    pub fn is_pruned(&self) -> bool {
        self.status == TrackStatus::Pruned
    }

    /// Time update without correction. On error the track is left unchanged.
    pub fn predict<K: KalmanFilter>(&mut self, kf: &K, dt: f64) -> Result<()> {
        let (state, cov) = kf.predict(&self.state, &self.cov, dt)?;
        self.state = state;
        self.cov = cov;
        if self.status != TrackStatus::Pruned {
            self.status = TrackStatus::Predicted;
        }
        Ok(())
    }

    /// Fuse an associated measurement. On error the track is left unchanged.
    pub fn correct<K: KalmanFilter>(&mut self, kf: &K, meas: &Measurement) -> Result<KfUpdateResult> {
        let res = kf.update(&self.state, &self.cov, &meas.position, &meas.covariance)?;
        self.state = res.state;
        self.cov = res.cov;
        self.status = TrackStatus::Corrected;
        self.total_hits += 1;
        self.last_corrected = meas.timestamp;
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kf::{CvKalmanFilter, CvKfConfig};
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;

    fn meas(x: f64, y: f64, z: f64, var: [f64; 3]) -> Measurement {
        Measurement::new(
            PosVec::new(x, y, z),
            PosCov::from_diagonal(&Vector3::new(var[0], var[1], var[2])),
            0.0,
        )
    }

    #[test]
    fn seeded_from_measurement() {
        let m = meas(0.0, 0.0, 5.0, [0.1, 0.1, 0.2]);
        let track = Track::from_measurement(TrackId(0), &m, 2.0);
        assert_eq!(track.position(), m.position);
        assert_eq!(track.velocity(), PosVec::zeros());
        assert_eq!(track.position_cov(), m.covariance);
        assert_abs_diff_eq!(track.cov[(4, 4)], 2.0);
        assert_abs_diff_eq!(track.cov[(0, 3)], 0.0);
        assert_eq!(track.status, TrackStatus::Created);
        assert_abs_diff_eq!(track.uncertainty(), (0.1f64 * 0.1 * 0.2).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn uncertainty_never_decreases_without_correction() {
        let kf = CvKalmanFilter::new(CvKfConfig { process_noise: 0.001 });
        let mut track = Track::from_measurement(TrackId(0), &meas(1.0, 2.0, 3.0, [0.2, 0.2, 0.4]), 1.0);
        let mut prev = track.uncertainty();
        for _ in 0..50 {
            track.predict(&kf, 0.02).unwrap();
            assert!(track.uncertainty() >= prev);
            prev = track.uncertainty();
        }
        assert_eq!(track.status, TrackStatus::Predicted);
    }

    #[test]
    fn correction_with_tighter_measurement_reduces_uncertainty() {
        let kf = CvKalmanFilter::new(CvKfConfig { process_noise: 0.01 });
        let mut track = Track::from_measurement(TrackId(0), &meas(0.0, 0.0, 5.0, [0.5, 0.5, 1.0]), 1.0);
        track.predict(&kf, 0.1).unwrap();
        let before = track.uncertainty();
        let m = meas(0.1, 0.0, 5.0, [0.1, 0.1, 0.2]);
        track.correct(&kf, &m).unwrap();
        assert!(track.uncertainty() <= before);
        assert!(track.position().x > 0.0 && track.position().x < 0.1);
        assert_eq!(track.status, TrackStatus::Corrected);
        assert_eq!(track.total_hits, 2);
    }

    #[test]
    fn failed_predict_leaves_track_untouched() {
        let kf = CvKalmanFilter::new(CvKfConfig::default());
        let mut track = Track::from_measurement(TrackId(0), &meas(1.0, 1.0, 1.0, [0.1, 0.1, 0.1]), 1.0);
        let snapshot = (track.state, track.cov, track.status);
        assert!(track.predict(&kf, -1.0).is_err());
        assert_eq!((track.state, track.cov, track.status), snapshot);
    }

    #[test]
    fn non_finite_covariance_reads_as_infinite_uncertainty() {
        let mut track = Track::from_measurement(TrackId(0), &meas(0.0, 0.0, 0.0, [1.0, 1.0, 1.0]), 1.0);
        track.cov[(1, 1)] = f64::NAN;
        assert_eq!(track.uncertainty(), f64::INFINITY);
    }

    #[test]
    fn indefinite_position_block_reads_as_infinite_uncertainty() {
        let mut track = Track::from_measurement(TrackId(0), &meas(0.0, 0.0, 0.0, [1.0, 1.0, 1.0]), 1.0);
        for i in 0..3 {
            for j in 0..3 {
                if i != j {
                    track.cov[(i, j)] = -0.9;
                }
            }
        }
        assert!(track.position_cov().determinant() < 0.0);
        assert_eq!(track.uncertainty(), f64::INFINITY);
    }
}
