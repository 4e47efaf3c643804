//! Analysis configuration
//!
//! Tunables for the sampling loop, scorers and marker synthesizer. The defaults
//! reproduce the reference behavior (1 s sampling, 0.7 confidence, 640x480
//! reference frame, completion at 90% of playback).

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SAMPLING_INTERVAL_SEC: u64 = 1;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
pub const DEFAULT_REFERENCE_WIDTH: f64 = 640.0;
pub const DEFAULT_REFERENCE_HEIGHT: f64 = 480.0;
pub const DEFAULT_COMPLETION_FRACTION: f64 = 0.9;
pub const DEFAULT_MARKER_DURATION_SEC: f64 = 3.0;
pub const DEFAULT_MIN_MARKER_SIZE: f64 = 40.0;
pub const DEFAULT_SOCIAL_DISTANCE_SCALE: f64 = 500.0;
pub const DEFAULT_MOTION_HISTORY_LEN: usize = 3;

/// Configuration for one analysis session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sample when `floor(current_time) % interval == 0`
    pub sampling_interval_sec: u64,
    /// Detections must score strictly above this to count
    pub confidence_threshold: f64,
    /// Frame width used for centering and marker normalization
    pub reference_width: f64,
    /// Frame height used for centering and marker normalization
    pub reference_height: f64,
    /// Fraction of the duration at which the report is generated
    pub completion_fraction: f64,
    pub marker_duration_sec: f64,
    /// Visual floor for marker size
    pub min_marker_size: f64,
    /// Center distance at which social reciprocity reaches 0
    pub social_distance_scale: f64,
    /// Frames of person boxes retained for repetitive-motion scoring
    pub motion_history_len: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampling_interval_sec: DEFAULT_SAMPLING_INTERVAL_SEC,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            reference_width: DEFAULT_REFERENCE_WIDTH,
            reference_height: DEFAULT_REFERENCE_HEIGHT,
            completion_fraction: DEFAULT_COMPLETION_FRACTION,
            marker_duration_sec: DEFAULT_MARKER_DURATION_SEC,
            min_marker_size: DEFAULT_MIN_MARKER_SIZE,
            social_distance_scale: DEFAULT_SOCIAL_DISTANCE_SCALE,
            motion_history_len: DEFAULT_MOTION_HISTORY_LEN,
        }
    }
}

impl AnalysisConfig {
    /// Override the reference frame with the real source resolution
    pub fn with_reference_frame(mut self, width: f64, height: f64) -> Self {
        self.reference_width = width;
        self.reference_height = height;
        self
    }

    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the sampling loop cannot work with
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.sampling_interval_sec == 0 {
            return Err(AnalysisError::ConfigError(
                "sampling_interval_sec must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AnalysisError::ConfigError(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(self.reference_width > 0.0 && self.reference_height > 0.0) {
            return Err(AnalysisError::ConfigError(format!(
                "reference frame must be positive, got {}x{}",
                self.reference_width, self.reference_height
            )));
        }
        if !(self.completion_fraction > 0.0 && self.completion_fraction <= 1.0) {
            return Err(AnalysisError::ConfigError(format!(
                "completion_fraction must be within (0, 1], got {}",
                self.completion_fraction
            )));
        }
        if self.marker_duration_sec < 0.0 || self.min_marker_size < 0.0 {
            return Err(AnalysisError::ConfigError(
                "marker duration and size must not be negative".to_string(),
            ));
        }
        if self.social_distance_scale <= 0.0 {
            return Err(AnalysisError::ConfigError(
                "social_distance_scale must be positive".to_string(),
            ));
        }
        if self.motion_history_len < 3 {
            return Err(AnalysisError::ConfigError(
                "motion_history_len must retain at least 3 frames".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reference_width, 640.0);
        assert_eq!(config.reference_height, 480.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = AnalysisConfig::from_json(r#"{"sampling_interval_sec": 2}"#).unwrap();
        assert_eq!(config.sampling_interval_sec, 2);
        assert_eq!(config.confidence_threshold, DEFAULT_CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let result = AnalysisConfig::from_json(r#"{"sampling_interval_sec": 0}"#);
        assert!(matches!(result, Err(AnalysisError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_short_history() {
        let config = AnalysisConfig {
            motion_history_len: 2,
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_round_trip_json() {
        let config = AnalysisConfig::default().with_reference_frame(1920.0, 1080.0);
        let json = config.to_json().unwrap();
        let loaded = AnalysisConfig::from_json(&json).unwrap();
        assert_eq!(config, loaded);
    }
}
