//! Detector and frame-capture adapters
//!
//! This module defines the boundaries to the external collaborators of the
//! sampling loop: the object detector that labels frames, and the player that
//! hands out frame snapshots. The model itself lives outside this crate.

mod detector;
mod replay;

pub use detector::DetectorAdapter;
pub use replay::{ReplayCapture, ReplayDetector};

use crate::error::{CaptureError, DetectorError};
use crate::types::Detection;

/// A still image grabbed from the player at a playback position
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    /// Playback position in seconds
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// Encoded still (e.g. JPEG); empty when the detector does not need pixels
    pub data: Vec<u8>,
}

impl FrameSnapshot {
    /// A snapshot that only carries its position and dimensions
    pub fn empty(timestamp: f64, width: u32, height: u32) -> Self {
        Self {
            timestamp,
            width,
            height,
            data: Vec::new(),
        }
    }
}

/// Trait for object-detection backends
pub trait ObjectDetector {
    /// Run inference on one frame
    fn detect(&mut self, frame: &FrameSnapshot) -> Result<Vec<Detection>, DetectorError>;
}

/// Trait for anything that can produce a frame snapshot at the current position
pub trait FrameCapture {
    fn capture(&mut self, timestamp: f64) -> Result<FrameSnapshot, CaptureError>;
}

impl<F> ObjectDetector for F
where
    F: FnMut(&FrameSnapshot) -> Result<Vec<Detection>, DetectorError>,
{
    fn detect(&mut self, frame: &FrameSnapshot) -> Result<Vec<Detection>, DetectorError> {
        self(frame)
    }
}
