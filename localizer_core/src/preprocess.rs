//! Measurement preprocessing: decoded detections → world-frame measurements.
//!
//! All blocking work of a cycle (transform lookup) happens here, before the
//! filter bank is locked. A failed lookup fails the whole batch so the cycle
//! becomes a no-op.

use crate::{
    error::{Result, TrackerError},
    types::{DetectionBatch, Measurement, MeasurementBatch},
};
use sensor_models::{DetectionCovariance, PinholeIntrinsics, RigidTransform};
use std::{collections::HashMap, time::Duration};

/// Source of sensor → world transforms.
pub trait TransformSource: Send + Sync {
    /// Transform taking points in `source_frame` into `target_frame` at
    /// `timestamp`, waiting at most `timeout`.
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        timestamp: f64,
        timeout: Duration,
    ) -> Result<RigidTransform>;
}

/// Fixed frame pairs, e.g. a camera rigidly mounted in the world.
#[derive(Clone, Debug, Default)]
pub struct StaticTransformSource {
    transforms: HashMap<(String, String), RigidTransform>,
}

impl StaticTransformSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, target_frame: &str, source_frame: &str, tf: RigidTransform) -> Self {
        self.insert(target_frame, source_frame, tf);
        self
    }

    pub fn insert(&mut self, target_frame: &str, source_frame: &str, tf: RigidTransform) {
        self.transforms
            .insert((target_frame.to_owned(), source_frame.to_owned()), tf);
    }
}

impl TransformSource for StaticTransformSource {
    fn lookup_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        _timestamp: f64,
        _timeout: Duration,
    ) -> Result<RigidTransform> {
        if target_frame == source_frame {
            return Ok(RigidTransform::identity());
        }
        self.transforms
            .get(&(target_frame.to_owned(), source_frame.to_owned()))
            .copied()
            .ok_or_else(|| TrackerError::TransformUnavailable {
                target_frame: target_frame.to_owned(),
                source_frame: source_frame.to_owned(),
                reason: "no such frame pair".to_owned(),
            })
    }
}

/// Turns detections into world-frame position measurements.
#[derive(Clone, Debug)]
pub struct MeasurementPreprocessor {
    pub intrinsics: PinholeIntrinsics,
    pub covariance: DetectionCovariance,
    pub world_frame: String,
    pub timeout: Duration,
}

impl MeasurementPreprocessor {
    pub fn new(
        intrinsics: PinholeIntrinsics,
        covariance: DetectionCovariance,
        world_frame: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            intrinsics,
            covariance,
            world_frame: world_frame.into(),
            timeout,
        }
    }

    pub fn preprocess(&self, batch: &DetectionBatch, transforms: &dyn TransformSource) -> Result<MeasurementBatch> {
        let tf = transforms.lookup_transform(&self.world_frame, &batch.frame_id, batch.timestamp, self.timeout)?;
        let measurements = batch
            .detections
            .iter()
            .map(|det| {
                let p_sensor = det.to_camera_point(&self.intrinsics);
                let cov_sensor = self.covariance.covariance_at(&p_sensor);
                Measurement::new(
                    tf.transform_point(&p_sensor),
                    tf.rotate_covariance(&cov_sensor),
                    batch.timestamp,
                )
            })
            .collect();
        Ok(MeasurementBatch::new(batch.timestamp, measurements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PosCov, PosVec};
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector3;
    use sensor_models::{Detection, RegionOfInterest};

    fn preprocessor() -> MeasurementPreprocessor {
        MeasurementPreprocessor::new(
            PinholeIntrinsics::new(500.0, 500.0, 320.0, 240.0),
            DetectionCovariance::new(0.1, 0.2),
            "world",
            Duration::from_millis(10),
        )
    }

    fn centre_detection(depth: f64) -> Detection {
        Detection {
            x: 0.5,
            y: 0.5,
            depth,
            roi: RegionOfInterest::full_frame(640, 480),
        }
    }

    #[test]
    fn detection_is_moved_into_world_frame() {
        // Camera 1 m above the origin, looking along world +X (optical +Z → world +X)
        let tf = RigidTransform::from_translation_rpy(
            [0.0, 0.0, 1.0],
            -std::f64::consts::FRAC_PI_2,
            0.0,
            -std::f64::consts::FRAC_PI_2,
        );
        let source = StaticTransformSource::new().with("world", "camera", tf);
        let batch = DetectionBatch {
            frame_id: "camera".into(),
            timestamp: 3.0,
            detections: vec![centre_detection(4.0)],
        };
        let out = preprocessor().preprocess(&batch, &source).unwrap();
        assert_eq!(out.len(), 1);
        let m = &out.measurements[0];
        assert_abs_diff_eq!(m.position, PosVec::new(4.0, 0.0, 1.0), epsilon = 1e-9);
        // Depth variance now lies along world X
        let expected = PosCov::from_diagonal(&Vector3::new(4.0 * 2.0 * 0.2, 0.1, 0.1));
        assert_abs_diff_eq!(m.covariance, expected, epsilon = 1e-9);
        assert_eq!(m.timestamp, 3.0);
    }

    #[test]
    fn unknown_frame_fails_whole_batch() {
        let batch = DetectionBatch {
            frame_id: "camera".into(),
            timestamp: 0.0,
            detections: vec![centre_detection(2.0), centre_detection(3.0)],
        };
        let err = preprocessor()
            .preprocess(&batch, &StaticTransformSource::new())
            .unwrap_err();
        assert!(matches!(err, TrackerError::TransformUnavailable { .. }));
    }

    #[test]
    fn same_frame_needs_no_transform() {
        let batch = DetectionBatch {
            frame_id: "world".into(),
            timestamp: 0.0,
            detections: vec![centre_detection(2.0)],
        };
        let out = preprocessor()
            .preprocess(&batch, &StaticTransformSource::new())
            .unwrap();
        assert_abs_diff_eq!(out.measurements[0].position, PosVec::new(0.0, 0.0, 2.0), epsilon = 1e-12);
    }
}
