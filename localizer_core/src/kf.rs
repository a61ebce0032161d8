//! Kalman filter: predict and update steps.
//!
//! # Design choices
//! - **Linear KF** with a constant-velocity (CV) motion model.
//! - All math in `f64` via `nalgebra` fixed-size matrices.
//! - Measurements observe position only.
//!
//! ## State vector
//! x = [px, py, pz, vx, vy, vz]ᵀ  (6-dimensional)
//!
//! ## CV Transition model
//! A(dt) = I₆ + dt * [[0₃ I₃]; [0₃ 0₃]]
//!
//! ## Process noise
//! R = q · I₆, added once per predict step independent of dt.
//!
//! ## Observation model
//! H = [I₃ 0₃], noise Q = measurement covariance.

use crate::{
    error::{Result, TrackerError},
    types::{PosCov, PosVec, StateCov, StateVec},
};
use nalgebra::{Matrix3x6, Matrix6, Matrix6x3};

/// Relative slack (against the largest variance) allowed on a negative
/// eigenvalue before a covariance is declared indefinite.
const EIGENVALUE_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Trait for a Kalman filter model (predict + update).
pub trait KalmanFilter {
    /// Predict state and covariance forward by `dt` seconds.
    fn predict(&self, state: &StateVec, cov: &StateCov, dt: f64) -> Result<(StateVec, StateCov)>;

    /// Fuse a position observation `z` with noise covariance `r`.
    fn update(&self, state: &StateVec, cov: &StateCov, z: &PosVec, r: &PosCov) -> Result<KfUpdateResult>;
}

/// Result of a KF update step, exposed for inspection.
#[derive(Clone, Debug)]
pub struct KfUpdateResult {
    pub state: StateVec,
    pub cov: StateCov,
    /// Innovation ν = z − H·x
    pub innovation: PosVec,
    /// Innovation covariance S = H·P·Hᵀ + Q
    pub innovation_cov: PosCov,
    /// Kalman gain K
    pub kalman_gain: Matrix6x3<f64>,
}

// ---------------------------------------------------------------------------
// Constant Velocity model
// ---------------------------------------------------------------------------

/// Configuration for the CV Kalman filter.
#[derive(Clone, Debug)]
pub struct CvKfConfig {
    /// Diagonal process noise added on every predict step.
    pub process_noise: f64,
}

impl Default for CvKfConfig {
    fn default() -> Self {
        Self { process_noise: 0.01 }
    }
}

/// Constant-Velocity Kalman filter (6-state, linear).
#[derive(Clone, Debug)]
pub struct CvKalmanFilter {
    pub config: CvKfConfig,
}

impl CvKalmanFilter {
    pub fn new(config: CvKfConfig) -> Self {
        Self { config }
    }

    /// Build state transition matrix A for timestep dt.
    pub fn transition_matrix(dt: f64) -> Matrix6<f64> {
        let mut a = Matrix6::<f64>::identity();
        // position += velocity * dt
        a[(0, 3)] = dt;
        a[(1, 4)] = dt;
        a[(2, 5)] = dt;
        a
    }

    /// Observation matrix H extracting the position block.
    pub fn observation_matrix() -> Matrix3x6<f64> {
        let mut h = Matrix3x6::<f64>::zeros();
        h[(0, 0)] = 1.0;
        h[(1, 1)] = 1.0;
        h[(2, 2)] = 1.0;
        h
    }

    fn process_noise(&self) -> Matrix6<f64> {
        Matrix6::<f64>::identity() * self.config.process_noise
    }
}

impl KalmanFilter for CvKalmanFilter {
    fn predict(&self, state: &StateVec, cov: &StateCov, dt: f64) -> Result<(StateVec, StateCov)> {
        if !(dt >= 0.0) || !dt.is_finite() {
            return Err(TrackerError::NegativeTimeStep(dt));
        }
        let a = Self::transition_matrix(dt);
        let predicted_state = a * state;
        let predicted_cov = a * cov * a.transpose() + self.process_noise();
        let predicted_cov = checked_covariance(predicted_cov)?;
        if !predicted_state.iter().all(|v| v.is_finite()) {
            return Err(TrackerError::NumericDegeneracy("non-finite predicted state"));
        }
        Ok((predicted_state, predicted_cov))
    }

    fn update(&self, state: &StateVec, cov: &StateCov, z: &PosVec, r: &PosCov) -> Result<KfUpdateResult> {
        let h = Self::observation_matrix();

        // Innovation: ν = z − H·x
        let innovation = z - h * state;

        // Innovation covariance: S = H·P·Hᵀ + Q
        let s = h * cov * h.transpose() + r;

        // Kalman gain: K = P·Hᵀ·S⁻¹ (Cholesky: S must be positive definite)
        let s_inv = s
            .cholesky()
            .ok_or(TrackerError::NumericDegeneracy("innovation covariance not positive definite"))?
            .inverse();
        let k = cov * h.transpose() * s_inv;

        // Updated state: x' = x + K·ν
        let new_state = state + k * innovation;

        // Updated covariance: Joseph form P' = (I−KH)·P·(I−KH)ᵀ + K·Q·Kᵀ
        let i_kh = Matrix6::<f64>::identity() - k * h;
        let new_cov = i_kh * cov * i_kh.transpose() + k * r * k.transpose();
        let new_cov = checked_covariance(new_cov)?;
        if !new_state.iter().all(|v| v.is_finite()) {
            return Err(TrackerError::NumericDegeneracy("non-finite corrected state"));
        }

        Ok(KfUpdateResult {
            state: new_state,
            cov: new_cov,
            innovation,
            innovation_cov: s,
            kalman_gain: k,
        })
    }
}

/// Symmetrize `cov` and verify it is still a plausible covariance:
/// finite, non-negative variances, no eigenvalue meaningfully below zero.
pub fn checked_covariance(cov: StateCov) -> Result<StateCov> {
    let sym = (cov + cov.transpose()) * 0.5;
    if !sym.iter().all(|v| v.is_finite()) {
        return Err(TrackerError::NumericDegeneracy("non-finite covariance"));
    }
    let variances = sym.diagonal();
    if variances.min() < 0.0 {
        return Err(TrackerError::NumericDegeneracy("negative variance"));
    }
    let slack = EIGENVALUE_TOLERANCE * variances.amax();
    if !(sym.symmetric_eigenvalues().min() >= -slack) {
        return Err(TrackerError::NumericDegeneracy("covariance not positive semidefinite"));
    }
    Ok(sym)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
