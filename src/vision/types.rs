//! Data types for the visual track.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A detected face region in pixel coordinates (right/bottom exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceBox {
    pub fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    /// Center point as (x, y).
    pub fn center(&self) -> (f64, f64) {
        (
            (f64::from(self.left) + f64::from(self.right)) / 2.0,
            (f64::from(self.top) + f64::from(self.bottom)) / 2.0,
        )
    }

    /// Clip the box to a `width` x `height` frame.
    pub fn clamped(&self, width: u32, height: u32) -> Self {
        let left = self.left.min(width);
        let top = self.top.min(height);
        Self {
            top,
            right: self.right.min(width).max(left),
            bottom: self.bottom.min(height).max(top),
            left,
        }
    }
}

/// The best face crop found so far in a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateCrop {
    /// Where the post-processed crop was written.
    pub image_path: PathBuf,
    /// Composite score of the box it was cut from.
    pub score: f64,
    /// Index of the source frame in the video.
    pub source_frame_index: usize,
}
