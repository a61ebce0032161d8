//! Depth-camera detection simulator.
//!
//! Generates detection batches at a fixed frame rate with:
//! - Uniform pixel and depth noise of the configured standard deviation
//! - Miss probability (1 - P_D)
//! - Field-of-view and depth-range culling

use crate::target::Target;
use localizer_core::{types::DetectionBatch, StaticTransformSource};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sensor_models::{Detection, PinholeIntrinsics, RegionOfInterest, RigidTransform};
use serde::{Deserialize, Serialize};

/// Optical frame rotated so the camera looks along world +X with image-down
/// along world -Z.
pub fn forward_looking_pose(position: [f64; 3]) -> RigidTransform {
    RigidTransform::from_translation_rpy(
        position,
        -std::f64::consts::FRAC_PI_2,
        0.0,
        -std::f64::consts::FRAC_PI_2,
    )
}

/// One configured camera in the simulation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CameraParams {
    pub frame_id: String,
    pub intrinsics: PinholeIntrinsics,
    pub roi: RegionOfInterest,
    /// Camera → world transform
    pub pose: RigidTransform,
    /// Frames per second
    pub rate_hz: f64,
    pub p_detection: f64,
    /// Pixel noise standard deviation
    pub pixel_noise_std: f64,
    /// Depth noise standard deviation as a fraction of depth
    pub depth_noise_frac: f64,
    pub max_depth: f64,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            frame_id: "camera_optical".into(),
            intrinsics: PinholeIntrinsics::default(),
            roi: RegionOfInterest::full_frame(640, 480),
            pose: forward_looking_pose([0.0, 0.0, 1.0]),
            rate_hz: 15.0,
            p_detection: 0.95,
            pixel_noise_std: 2.0,
            depth_noise_frac: 0.02,
            max_depth: 12.0,
        }
    }
}

impl CameraParams {
    /// Transform source resolving this camera's frame into `world_frame`.
    pub fn transforms(&self, world_frame: &str) -> StaticTransformSource {
        StaticTransformSource::new().with(world_frame, &self.frame_id, self.pose)
    }
}

/// Generates detection batches from a set of targets.
pub struct CameraSimulator {
    pub camera: CameraParams,
    next_frame_time: f64,
    rng: ChaCha8Rng,
}

impl CameraSimulator {
    pub fn new(camera: CameraParams, seed: u64) -> Self {
        Self {
            camera,
            next_frame_time: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Zero-mean uniform sample with standard deviation `std`.
    fn noise(&mut self, std: f64) -> f64 {
        let half_width = std * 3f64.sqrt();
        (self.rng.gen::<f64>() * 2.0 - 1.0) * half_width
    }

    /// The batch due at or before `sim_time`, if a frame is due.
    pub fn generate(&mut self, targets: &[Target], sim_time: f64) -> Option<DetectionBatch> {
        if sim_time < self.next_frame_time {
            return None;
        }
        let frame_time = self.next_frame_time;
        self.next_frame_time += 1.0 / self.camera.rate_hz;

        let mut detections = Vec::new();
        for target in targets.iter().filter(|t| t.is_active(frame_time)) {
            // Miss detection?
            if self.rng.gen::<f64>() > self.camera.p_detection {
                continue;
            }
            let p_cam = self
                .camera
                .pose
                .inverse_transform_point(&target.position().into());
            if p_cam.z <= 0.0 || p_cam.z > self.camera.max_depth {
                continue;
            }
            let Some((u, v)) = self.camera.intrinsics.project(&p_cam) else {
                continue;
            };
            let pixel_std = self.camera.pixel_noise_std;
            let (u, v) = (u + self.noise(pixel_std), v + self.noise(pixel_std));
            if !self.camera.roi.contains_pixel(u, v) {
                continue;
            }
            let depth = p_cam.z + self.noise(p_cam.z * self.camera.depth_noise_frac);
            let (x, y) = self.camera.roi.to_normalized(u, v);
            detections.push(Detection {
                x,
                y,
                depth,
                roi: self.camera.roi,
            });
        }

        Some(DetectionBatch {
            frame_id: self.camera.frame_id.clone(),
            timestamp: frame_time,
            detections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::MotionSpec;

    fn hovering(x: f64, y: f64, z: f64) -> Target {
        Target::new(0, [x, y, z], [0.0; 3], MotionSpec::ConstantVelocity)
    }

    #[test]
    fn noiseless_detection_back_projects_onto_target() {
        let camera = CameraParams {
            p_detection: 1.0,
            pixel_noise_std: 0.0,
            depth_noise_frac: 0.0,
            ..Default::default()
        };
        let mut sim = CameraSimulator::new(camera.clone(), 7);
        let batch = sim.generate(&[hovering(5.0, 0.5, 1.3)], 0.0).unwrap();
        assert_eq!(batch.detections.len(), 1);
        let p_cam = batch.detections[0].to_camera_point(&camera.intrinsics);
        let p_world = camera.pose.transform_point(&p_cam);
        assert!((p_world - nalgebra::Vector3::new(5.0, 0.5, 1.3)).norm() < 1e-9);
    }

    #[test]
    fn frames_follow_rate_and_skip_targets_behind_camera() {
        let mut sim = CameraSimulator::new(CameraParams::default(), 1);
        let targets = [hovering(-3.0, 0.0, 1.0)];
        let batch = sim.generate(&targets, 0.0).unwrap();
        assert!(batch.detections.is_empty());
        assert!(sim.generate(&targets, 0.01).is_none());
        assert!(sim.generate(&targets, 1.0 / 15.0).is_some());
    }

    #[test]
    fn same_seed_same_batches() {
        let targets = [hovering(4.0, 0.0, 1.0)];
        let mut a = CameraSimulator::new(CameraParams::default(), 3);
        let mut b = CameraSimulator::new(CameraParams::default(), 3);
        for i in 0..10 {
            let t = i as f64 / 15.0;
            let (ba, bb) = (a.generate(&targets, t).unwrap(), b.generate(&targets, t).unwrap());
            assert_eq!(ba.detections, bb.detections);
        }
    }
}
