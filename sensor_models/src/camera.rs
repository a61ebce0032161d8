//! Pinhole camera model and detection back-projection.
//!
//! # Conventions
//! - Camera optical frame: +Z forward (depth), +X right, +Y down.
//! - A detection is expressed in coordinates normalized to its region of
//!   interest, so `(0.5, 0.5)` is the ROI centre.
//!
//! Back-projection of a detection at depth `d`:
//! u = x·roi.width + roi.x_offset,  v = y·roi.height + roi.y_offset
//! p = d · [(u − cx)/fx, (v − cy)/fy, 1]ᵀ

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Intrinsic parameters of a rectified pinhole camera (pixels).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PinholeIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl PinholeIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Ray through pixel `(u, v)` scaled so that its z component equals `depth`.
    pub fn back_project(&self, u: f64, v: f64, depth: f64) -> Vector3<f64> {
        let x = (u - self.cx) / self.fx;
        let y = (v - self.cy) / self.fy;
        Vector3::new(x, y, 1.0) * depth
    }

    /// Pixel coordinates of a camera-frame point. `None` behind the camera.
    pub fn project(&self, point: &Vector3<f64>) -> Option<(f64, f64)> {
        if point.z <= 0.0 {
            return None;
        }
        let u = self.fx * point.x / point.z + self.cx;
        let v = self.fy * point.y / point.z + self.cy;
        Some((u, v))
    }
}

impl Default for PinholeIntrinsics {
    fn default() -> Self {
        // 640×480 sensor, ~70° horizontal field of view
        Self::new(457.0, 457.0, 320.0, 240.0)
    }
}

/// Pixel rectangle the detector ran on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub x_offset: u32,
    pub y_offset: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionOfInterest {
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self {
            x_offset: 0,
            y_offset: 0,
            width,
            height,
        }
    }

    /// Normalized ROI coordinates → image pixel coordinates.
    pub fn to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.width as f64 + self.x_offset as f64,
            y * self.height as f64 + self.y_offset as f64,
        )
    }

    /// Image pixel coordinates → normalized ROI coordinates.
    pub fn to_normalized(&self, u: f64, v: f64) -> (f64, f64) {
        (
            (u - self.x_offset as f64) / self.width as f64,
            (v - self.y_offset as f64) / self.height as f64,
        )
    }

    pub fn contains_pixel(&self, u: f64, v: f64) -> bool {
        let (x, y) = self.to_normalized(u, v);
        (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y)
    }
}

/// A single decoded detection from the depth detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Horizontal position normalized to the ROI
    pub x: f64,
    /// Vertical position normalized to the ROI
    pub y: f64,
    /// Estimated depth along the optical axis (meters)
    pub depth: f64,
    pub roi: RegionOfInterest,
}

impl Detection {
    /// 3-D position of the detection in the camera frame.
    pub fn to_camera_point(&self, intrinsics: &PinholeIntrinsics) -> Vector3<f64> {
        let (u, v) = self.roi.to_pixel(self.x, self.y);
        intrinsics.back_project(u, v, self.depth)
    }
}
