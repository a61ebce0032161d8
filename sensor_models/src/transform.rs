//! Rigid sensor-to-world transforms.

use nalgebra::{Isometry3, Matrix3, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A rigid transform `p_target = R·p_source + t`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub isometry: Isometry3<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        Self {
            isometry: Isometry3::identity(),
        }
    }

    /// Build from a translation and roll/pitch/yaw (radians).
    pub fn from_translation_rpy(translation: [f64; 3], roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            isometry: Isometry3::from_parts(
                Translation3::new(translation[0], translation[1], translation[2]),
                UnitQuaternion::from_euler_angles(roll, pitch, yaw),
            ),
        }
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.isometry.rotation.to_rotation_matrix().into_inner()
    }

    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.isometry.transform_point(&Point3::from(*p)).coords
    }

    pub fn inverse_transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.isometry.inverse_transform_point(&Point3::from(*p)).coords
    }

    /// Σ' = R·Σ·Rᵀ
    pub fn rotate_covariance(&self, cov: &Matrix3<f64>) -> Matrix3<f64> {
        let r = self.rotation_matrix();
        r * cov * r.transpose()
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn yaw_quarter_turn_rotates_x_onto_y() {
        let tf = RigidTransform::from_translation_rpy([1.0, 2.0, 3.0], 0.0, 0.0, FRAC_PI_2);
        let p = tf.transform_point(&Vector3::new(1.0, 0.0, 0.0));
        assert_abs_diff_eq!(p, Vector3::new(1.0, 3.0, 3.0), epsilon = 1e-12);
        let back = tf.inverse_transform_point(&p);
        assert_abs_diff_eq!(back, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn rotated_covariance_keeps_determinant() {
        let tf = RigidTransform::from_translation_rpy([0.0; 3], 0.3, -0.2, 1.1);
        let cov = Matrix3::from_diagonal(&Vector3::new(0.1, 0.2, 0.5));
        let rotated = tf.rotate_covariance(&cov);
        assert_abs_diff_eq!(rotated.determinant(), cov.determinant(), epsilon = 1e-12);
        assert_abs_diff_eq!(rotated, rotated.transpose(), epsilon = 1e-12);
    }
}
