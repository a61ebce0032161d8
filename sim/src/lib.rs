//! `sim`: Scenario simulator: target trajectories, depth-camera detections,
//! replay logs and the offline driver.

pub mod camera_sim;
pub mod replay;
pub mod runner;
pub mod scenarios;
pub mod target;

pub use camera_sim::{CameraParams, CameraSimulator};
pub use replay::{load_replay, save_replay, ReplayFrame, ReplayLog};
pub use runner::{run_offline, RunReport};
pub use scenarios::{Scenario, ScenarioKind};
pub use target::{MotionSpec, Target};
