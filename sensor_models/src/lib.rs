//! `sensor_models`: Depth camera geometry, detection covariance, frame transforms.

pub mod camera;
pub mod covariance;
pub mod transform;

pub use camera::{Detection, PinholeIntrinsics, RegionOfInterest};
pub use covariance::DetectionCovariance;
pub use transform::RigidTransform;
