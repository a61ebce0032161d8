//! Scenario definitions.
//!
//! Each scenario is a named configuration of targets and one camera.
//! All scenarios are deterministic given the same seed.

use crate::{
    camera_sim::{CameraParams, CameraSimulator},
    replay::{ReplayFrame, ReplayLog},
    target::{MotionSpec, Target},
};
use serde::{Deserialize, Serialize};

/// Which pre-defined scenario to load.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum ScenarioKind {
    /// One drone flying a waypoint loop in front of the camera
    Single,
    /// Two drones crossing paths in depth
    Crossing,
    /// One accelerating drone that vanishes halfway through
    Dropout,
}

/// A fully configured simulation scenario.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub duration: f64, // seconds
    pub sim_dt: f64,   // target propagation step (s)
    pub targets: Vec<Target>,
    pub camera: CameraParams,
}

impl Scenario {
    /// Build the named scenario. Uses `seed` for repeatability.
    pub fn build(kind: ScenarioKind, seed: u64) -> Self {
        match kind {
            ScenarioKind::Single => Self::single(seed),
            ScenarioKind::Crossing => Self::crossing(seed),
            ScenarioKind::Dropout => Self::dropout(seed),
        }
    }

    fn single(seed: u64) -> Self {
        let motion = MotionSpec::Waypoints {
            waypoints: vec![[5.0, -1.0, 1.5], [6.0, 1.0, 2.0], [4.0, 1.0, 1.0], [5.0, 0.0, 1.5]],
            speed: 0.6,
        };
        Scenario {
            name: "single".into(),
            seed,
            duration: 15.0,
            sim_dt: 0.01,
            targets: vec![Target::new(0, [5.0, 0.0, 1.5], [0.0; 3], motion)],
            camera: CameraParams::default(),
        }
    }

    fn crossing(seed: u64) -> Self {
        Scenario {
            name: "crossing".into(),
            seed,
            duration: 8.0,
            sim_dt: 0.01,
            targets: vec![
                Target::new(0, [6.0, -2.0, 1.2], [0.0, 0.5, 0.0], MotionSpec::ConstantVelocity),
                Target::new(1, [4.0, 2.0, 1.8], [0.0, -0.5, 0.0], MotionSpec::ConstantVelocity),
            ],
            camera: CameraParams::default(),
        }
    }

    fn dropout(seed: u64) -> Self {
        let motion = MotionSpec::ConstantAccel { accel: [0.0, -0.05, 0.02] };
        Scenario {
            name: "dropout".into(),
            seed,
            duration: 8.0,
            sim_dt: 0.01,
            targets: vec![Target::new(0, [5.0, 0.0, 1.0], [0.0, 0.2, 0.0], motion).visible_between(None, Some(4.0))],
            camera: CameraParams::default(),
        }
    }

    /// Step the targets through the whole duration and record every camera
    /// frame with the ground truth of the targets visible at that time.
    pub fn record(&self) -> ReplayLog {
        let mut targets = self.targets.clone();
        let mut camera = CameraSimulator::new(self.camera.clone(), self.seed);
        let mut frames = Vec::new();
        let steps = (self.duration / self.sim_dt).round() as u64;

        for step in 0..=steps {
            let sim_time = step as f64 * self.sim_dt;
            if let Some(batch) = camera.generate(&targets, sim_time) {
                let truth = targets
                    .iter()
                    .filter(|t| t.is_active(batch.timestamp))
                    .map(|t| t.ground_truth(batch.timestamp))
                    .collect();
                frames.push(ReplayFrame { batch, truth });
            }
            for target in &mut targets {
                target.step(self.sim_dt);
            }
        }

        ReplayLog {
            scenario_name: self.name.clone(),
            seed: self.seed,
            camera: self.camera.clone(),
            frames,
        }
    }
}
