//! Target trajectory models and state propagation.
//!
//! Each target has a true state [px,py,pz,vx,vy,vz] in the world frame and a
//! `MotionSpec` describing how it moves.

use localizer_core::metrics::GroundTruth;
use serde::{Deserialize, Serialize};

/// Waypoints closer than this count as reached (meters).
const WAYPOINT_RADIUS: f64 = 0.05;

/// Describes target motion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MotionSpec {
    /// No acceleration. A zero velocity hovers.
    ConstantVelocity,
    /// Constant acceleration in m/s².
    ConstantAccel { accel: [f64; 3] },
    /// Fly through `waypoints` in order at `speed`, then hold the last one.
    Waypoints { waypoints: Vec<[f64; 3]>, speed: f64 },
}

/// A simulated target with ground-truth state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Target {
    /// Unique target ID (used for metrics)
    pub id: u64,
    /// True state [px, py, pz, vx, vy, vz]
    pub state: [f64; 6],
    pub motion: MotionSpec,
    /// Optional: target appears after this time (no detections before)
    pub appear_at: Option<f64>,
    /// Optional: target disappears after this time
    pub disappear_at: Option<f64>,
    /// Index of the waypoint currently headed for
    #[serde(default)]
    next_waypoint: usize,
}

impl Target {
    pub fn new(id: u64, pos: [f64; 3], vel: [f64; 3], motion: MotionSpec) -> Self {
        Self {
            id,
            state: [pos[0], pos[1], pos[2], vel[0], vel[1], vel[2]],
            motion,
            appear_at: None,
            disappear_at: None,
            next_waypoint: 0,
        }
    }

    pub fn visible_between(mut self, appear_at: Option<f64>, disappear_at: Option<f64>) -> Self {
        self.appear_at = appear_at;
        self.disappear_at = disappear_at;
        self
    }

    /// Propagate true state by `dt` seconds according to its `MotionSpec`.
    pub fn step(&mut self, dt: f64) {
        let s = &mut self.state;
        match &self.motion {
            MotionSpec::ConstantVelocity => {
                for i in 0..3 {
                    s[i] += s[i + 3] * dt;
                }
            }
            MotionSpec::ConstantAccel { accel } => {
                for i in 0..3 {
                    s[i] += s[i + 3] * dt + 0.5 * accel[i] * dt * dt;
                    s[i + 3] += accel[i] * dt;
                }
            }
            MotionSpec::Waypoints { waypoints, speed } => {
                while let Some(wp) = waypoints.get(self.next_waypoint) {
                    let d = [wp[0] - s[0], wp[1] - s[1], wp[2] - s[2]];
                    let dist = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
                    if dist <= WAYPOINT_RADIUS {
                        self.next_waypoint += 1;
                        continue;
                    }
                    // Don't overshoot the waypoint within one step
                    let v = speed.min(dist / dt.max(f64::EPSILON));
                    for i in 0..3 {
                        s[i + 3] = v * d[i] / dist;
                    }
                    break;
                }
                if self.next_waypoint >= waypoints.len() {
                    s[3..].fill(0.0);
                }
                for i in 0..3 {
                    s[i] += s[i + 3] * dt;
                }
            }
        }
    }

    /// True if target is active at time `t`.
    pub fn is_active(&self, t: f64) -> bool {
        self.appear_at.map_or(true, |appear| t >= appear) && self.disappear_at.map_or(true, |gone| t < gone)
    }

    pub fn position(&self) -> [f64; 3] {
        [self.state[0], self.state[1], self.state[2]]
    }

    pub fn ground_truth(&self, time: f64) -> GroundTruth {
        GroundTruth {
            target_id: self.id,
            time,
            position: self.position(),
            velocity: [self.state[3], self.state[4], self.state[5]],
        }
    }
}
