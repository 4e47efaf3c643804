//! Marker synthesis and overlay visibility
//!
//! Turns contributing detections into timed, positioned markers, and selects
//! which markers an overlay should draw at a given playback position.

use crate::config::AnalysisConfig;
use crate::types::{Category, Detection, Marker};
use uuid::Uuid;

/// Builds markers from detections
#[derive(Debug, Clone)]
pub struct MarkerSynthesizer {
    reference_width: f64,
    reference_height: f64,
    duration: f64,
    min_size: f64,
}

impl Default for MarkerSynthesizer {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl MarkerSynthesizer {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            reference_width: config.reference_width,
            reference_height: config.reference_height,
            duration: config.marker_duration_sec,
            min_size: config.min_marker_size,
        }
    }

    /// Create a marker centered on `detection`, appearing at `timestamp`.
    ///
    /// Position is the box center as a percentage of the reference frame.
    /// Size is the smaller box side, never below the configured floor.
    pub fn synthesize(&self, detection: &Detection, category: Category, timestamp: f64) -> Marker {
        let bbox = &detection.bbox;
        let size = bbox.width().min(bbox.height()).max(self.min_size);
        let (cx, cy) = bbox.center();

        Marker {
            id: format!("{}-{}", category, Uuid::new_v4().simple()),
            category,
            x: cx / self.reference_width * 100.0,
            y: cy / self.reference_height * 100.0,
            size,
            timestamp,
            duration: self.duration,
        }
    }
}

/// Markers visible at `current_time`, in their original order
pub fn visible_markers(markers: &[Marker], current_time: f64) -> Vec<Marker> {
    markers
        .iter()
        .filter(|m| m.is_visible_at(current_time))
        .cloned()
        .collect()
}
