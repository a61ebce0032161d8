//! Replay: serialize/deserialize recorded detection logs for offline runs.

use crate::camera_sim::CameraParams;
use localizer_core::{metrics::GroundTruth, types::DetectionBatch, StaticTransformSource};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A full recorded simulation log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayLog {
    pub scenario_name: String,
    pub seed: u64,
    /// Camera the batches were taken with, including its world pose
    pub camera: CameraParams,
    /// Camera frames in chronological order
    pub frames: Vec<ReplayFrame>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub batch: DetectionBatch,
    /// Targets visible at the frame time
    pub truth: Vec<GroundTruth>,
}

impl ReplayLog {
    /// Transform source resolving the recorded camera frame into `world_frame`.
    pub fn transforms(&self, world_frame: &str) -> StaticTransformSource {
        self.camera.transforms(world_frame)
    }

    pub fn duration(&self) -> f64 {
        self.frames.last().map_or(0.0, |f| f.batch.timestamp)
    }
}

/// Save a replay log to a JSON file.
pub fn save_replay(log: &ReplayLog, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, log)?;
    Ok(())
}

/// Load a replay log from a JSON file.
pub fn load_replay(path: &Path) -> anyhow::Result<ReplayLog> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let log: ReplayLog = serde_json::from_reader(reader)?;
    Ok(log)
}
