//! Core data types
//!
//! This module defines the detection, score, marker and report types that flow
//! through the analysis pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned bounding box in source-frame pixel units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Center point of the box as (x, y)
    pub fn center(&self) -> (f64, f64) {
        (
            self.xmin + self.width() / 2.0,
            self.ymin + self.height() / 2.0,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite() && self.ymin.is_finite() && self.xmax.is_finite() && self.ymax.is_finite()
    }
}

/// One labeled bounding box reported by the object detector for a single frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Semantic label (e.g. "person", "face")
    pub label: String,
    /// Detector confidence in [0, 1]
    pub score: f64,
    /// Box in frame pixel units
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, score: f64, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            score,
            bbox,
        }
    }

    /// Case-insensitive label comparison
    pub fn has_label(&self, label: &str) -> bool {
        self.label.eq_ignore_ascii_case(label)
    }

    pub fn is_finite(&self) -> bool {
        self.score.is_finite() && self.bbox.is_finite()
    }
}

/// Behavioral marker category measured by one heuristic scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    EyeContact,
    RepetitiveMovement,
    SocialReciprocity,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::EyeContact,
        Category::RepetitiveMovement,
        Category::SocialReciprocity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::EyeContact => "eye-contact",
            Category::RepetitiveMovement => "repetitive-movement",
            Category::SocialReciprocity => "social-reciprocity",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk tier derived from a score. Higher scores mean lower risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a single heuristic scorer for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    /// Score in [0, 100]
    pub score: f64,
    /// Detections that contributed to the score, in detector order
    pub contributing: Vec<Detection>,
}

impl ScoreOutcome {
    pub fn new(score: f64, contributing: Vec<Detection>) -> Self {
        Self {
            score: clamp_score(score),
            contributing,
        }
    }

    /// The fail-soft result: no score, nothing contributing
    pub fn zero() -> Self {
        Self {
            score: 0.0,
            contributing: Vec::new(),
        }
    }
}

/// One per-category score recorded for a sampled frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreSample {
    pub category: Category,
    /// Arrival order within the session
    pub frame_index: u64,
    /// Playback position (seconds) the frame was sampled at
    pub timestamp: f64,
    /// Score in [0, 100]
    pub score: f64,
}

/// A timed, positioned visual annotation derived from a detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: String,
    #[serde(rename = "type")]
    pub category: Category,
    /// Horizontal position as a percentage of the reference frame width
    pub x: f64,
    /// Vertical position as a percentage of the reference frame height
    pub y: f64,
    pub size: f64,
    /// Seconds into playback when the marker appears
    pub timestamp: f64,
    /// Seconds the marker stays visible
    pub duration: f64,
}

impl Marker {
    /// Whether the marker is on screen at `current_time`. Both ends inclusive.
    pub fn is_visible_at(&self, current_time: f64) -> bool {
        current_time >= self.timestamp && current_time <= self.timestamp + self.duration
    }
}

/// Score and risk tier for one category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub score: f64,
    pub risk: RiskTier,
}

/// Per-frame analysis produced by one completed sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    pub frame_index: u64,
    pub timestamp: f64,
    pub eye_contact: CategoryResult,
    pub repetitive_movements: CategoryResult,
    pub social_reciprocity: CategoryResult,
    pub markers: Vec<Marker>,
}

/// Final categorical report for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub eye_contact: CategoryResult,
    pub repetitive_movements: CategoryResult,
    pub social_reciprocity: CategoryResult,
    pub overall_risk: RiskTier,
    pub detected_markers: Vec<Marker>,
    /// Number of frames whose scores went into the means
    pub samples_analyzed: usize,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn category(&self, category: Category) -> &CategoryResult {
        match category {
            Category::EyeContact => &self.eye_contact,
            Category::RepetitiveMovement => &self.repetitive_movements,
            Category::SocialReciprocity => &self.social_reciprocity,
        }
    }
}

/// Clamp a raw score into [0, 100]; NaN collapses to 0
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_geometry() {
        let bbox = BoundingBox::new(100.0, 50.0, 200.0, 250.0);
        assert_eq!(bbox.width(), 100.0);
        assert_eq!(bbox.height(), 200.0);
        assert_eq!(bbox.center(), (150.0, 150.0));
    }

    #[test]
    fn test_detection_wire_format() {
        let json = r#"{"label":"Person","score":0.93,"box":{"xmin":1,"ymin":2,"xmax":3,"ymax":4}}"#;
        let det: Detection = serde_json::from_str(json).unwrap();

        assert!(det.has_label("person"));
        assert_eq!(det.bbox.xmax, 3.0);

        let back = serde_json::to_value(&det).unwrap();
        assert!(back["box"].is_object());
    }

    #[test]
    fn test_marker_visibility_window_inclusive() {
        let marker = Marker {
            id: "eye-contact-1".to_string(),
            category: Category::EyeContact,
            x: 50.0,
            y: 50.0,
            size: 40.0,
            timestamp: 5.0,
            duration: 3.0,
        };

        assert!(marker.is_visible_at(5.0));
        assert!(marker.is_visible_at(6.5));
        assert!(marker.is_visible_at(8.0));
        assert!(!marker.is_visible_at(4.999));
        assert!(!marker.is_visible_at(8.001));
    }

    #[test]
    fn test_marker_serializes_category_as_type() {
        let marker = Marker {
            id: "social-reciprocity-x".to_string(),
            category: Category::SocialReciprocity,
            x: 10.0,
            y: 20.0,
            size: 40.0,
            timestamp: 1.0,
            duration: 3.0,
        };
        let value = serde_json::to_value(&marker).unwrap();
        assert_eq!(value["type"], "social-reciprocity");
    }

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(150.0), 100.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(42.5), 42.5);
    }

    #[test]
    fn test_risk_tier_wire_names() {
        assert_eq!(serde_json::to_string(&RiskTier::Moderate).unwrap(), "\"moderate\"");
        assert_eq!(
            serde_json::to_string(&Category::RepetitiveMovement).unwrap(),
            "\"repetitive-movement\""
        );
    }
}
