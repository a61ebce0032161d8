//! Detection position covariance for a depth camera.
//!
//! Lateral error is roughly constant in the image plane while depth error
//! grows with distance (stereo/ToF quantisation ~ d^1.5). The covariance is
//! built axis-aligned with the optical axis and then rotated so its depth
//! axis points along the ray from the camera to the detected point:
//!
//! Σ₀ = diag(c_xy, c_xy, max(d·√d·c_z, 0.33·c_z))
//! Σ  = R·Σ₀·Rᵀ,  R rotates +Z onto p/‖p‖

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Floor of the depth variance as a fraction of `z_coeff`.
pub const MIN_DEPTH_VARIANCE_FACTOR: f64 = 0.33;

/// Range-dependent covariance model for camera-frame detections.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionCovariance {
    /// Lateral (x, y) variance (m²)
    pub xy_coeff: f64,
    /// Depth variance coefficient (m² per m^1.5)
    pub z_coeff: f64,
}

impl DetectionCovariance {
    pub fn new(xy_coeff: f64, z_coeff: f64) -> Self {
        Self { xy_coeff, z_coeff }
    }

    /// Covariance of a detection at `point` (camera frame).
    pub fn covariance_at(&self, point: &Vector3<f64>) -> Matrix3<f64> {
        let d = point.z;
        let floor = MIN_DEPTH_VARIANCE_FACTOR * self.z_coeff;
        let z_var = (d * d.abs().sqrt() * self.z_coeff).max(floor);
        let axis_aligned = Matrix3::from_diagonal(&Vector3::new(self.xy_coeff, self.xy_coeff, z_var));
        let rot = ray_alignment(point);
        rot * axis_aligned * rot.transpose()
    }
}

/// Rotation taking the optical axis (+Z) onto the direction of `point`.
///
/// Exactly opposite directions have no unique shortest rotation; a half turn
/// about Z is used there, matching the sensor's image-plane flip.
pub fn ray_alignment(point: &Vector3<f64>) -> Matrix3<f64> {
    match Rotation3::rotation_between(&Vector3::z(), point) {
        Some(rot) => rot.into_inner(),
        None => Matrix3::from_diagonal(&Vector3::new(-1.0, -1.0, 1.0)),
    }
}
