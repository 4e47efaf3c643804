//! Detection trace format
//!
//! A trace is a recording of playback-clock updates together with the
//! detections the object detector produced for the frame at each update. It
//! lets the sampling loop be replayed offline, one JSON object per line:
//!
//! ```text
//! {"time": 1.02, "duration": 12.0, "detections": [{"label": "person", "score": 0.91, "box": {...}}]}
//! {"time": 1.27, "duration": 12.0, "capture_failed": true}
//! {"time": 6.10, "duration": 12.0, "event": "pause"}
//! ```

use crate::error::AnalysisError;
use crate::types::Detection;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current trace format identifier
pub const TRACE_VERSION: &str = "markerscope.trace.v1";

/// Player signal attached to a clock update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEvent {
    Play,
    Pause,
    Ended,
}

/// One playback-clock update and the detections for the frame shown at it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFrame {
    /// Playback position in seconds
    pub time: f64,
    /// Total video duration in seconds
    pub duration: f64,
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// The player could not produce a snapshot at this position
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub capture_failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<PlaybackEvent>,
}

impl TraceFrame {
    pub fn new(time: f64, duration: f64, detections: Vec<Detection>) -> Self {
        Self {
            time,
            duration,
            detections,
            capture_failed: false,
            event: None,
        }
    }

    /// Validate a single frame in isolation
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.time.is_finite() || self.time < 0.0 {
            return Err(ValidationError::InvalidTime(self.time));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(ValidationError::InvalidDuration(self.duration));
        }
        for (index, det) in self.detections.iter().enumerate() {
            if !det.is_finite() {
                return Err(ValidationError::NonFiniteDetection { index });
            }
            if !(0.0..=1.0).contains(&det.score) {
                return Err(ValidationError::ConfidenceOutOfRange {
                    index,
                    score: det.score,
                });
            }
            if det.bbox.xmax < det.bbox.xmin || det.bbox.ymax < det.bbox.ymin {
                return Err(ValidationError::InvertedBox { index });
            }
        }
        Ok(())
    }
}

/// Trace validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid playback time: {0}")]
    InvalidTime(f64),

    #[error("Invalid duration: {0}")]
    InvalidDuration(f64),

    #[error("Detection {index} has a non-finite box or score")]
    NonFiniteDetection { index: usize },

    #[error("Detection {index} confidence {score} is outside [0, 1]")]
    ConfidenceOutOfRange { index: usize, score: f64 },

    #[error("Detection {index} has max < min")]
    InvertedBox { index: usize },

    #[error("Playback time went backwards: {previous} -> {current}")]
    NonMonotonicTime { previous: f64, current: f64 },
}

/// Result of validating one frame within a trace
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub error: ValidationError,
}

/// Parser and validator for traces
pub struct TraceReader;

impl TraceReader {
    /// Parse a JSON array of frames
    pub fn parse_array(json: &str) -> Result<Vec<TraceFrame>, AnalysisError> {
        let frames: Vec<TraceFrame> = serde_json::from_str(json)?;
        Ok(frames)
    }

    /// Parse NDJSON, one frame per line; blank lines are skipped
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<TraceFrame>, AnalysisError> {
        let mut frames = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<TraceFrame>(trimmed) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    return Err(AnalysisError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(frames)
    }

    /// Parse either format: a leading `[` means a JSON array
    pub fn parse(input: &str) -> Result<Vec<TraceFrame>, AnalysisError> {
        if input.trim_start().starts_with('[') {
            Self::parse_array(input)
        } else {
            Self::parse_ndjson(input)
        }
    }

    /// Validate every frame, plus time ordering across frames.
    /// Returns only the failures.
    pub fn validate_frames(frames: &[TraceFrame]) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut previous: Option<f64> = None;

        for (index, frame) in frames.iter().enumerate() {
            if let Err(error) = frame.validate() {
                results.push(ValidationResult { index, error });
                continue;
            }
            if let Some(prev) = previous {
                if frame.time < prev {
                    results.push(ValidationResult {
                        index,
                        error: ValidationError::NonMonotonicTime {
                            previous: prev,
                            current: frame.time,
                        },
                    });
                    continue;
                }
            }
            previous = Some(frame.time);
        }

        results
    }

    /// Fail on the first invalid frame
    pub fn ensure_valid(frames: &[TraceFrame]) -> Result<(), AnalysisError> {
        match Self::validate_frames(frames).into_iter().next() {
            Some(failure) => Err(AnalysisError::InvalidTrace(format!(
                "frame {}: {}",
                failure.index, failure.error
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    const SAMPLE: &str = r#"
{"time": 0.0, "duration": 10.0, "event": "play"}
{"time": 1.0, "duration": 10.0, "detections": [{"label": "person", "score": 0.9, "box": {"xmin": 10, "ymin": 10, "xmax": 110, "ymax": 210}}]}

{"time": 2.0, "duration": 10.0, "capture_failed": true}
"#;

    #[test]
    fn test_parse_ndjson() {
        let frames = TraceReader::parse_ndjson(SAMPLE).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].event, Some(PlaybackEvent::Play));
        assert_eq!(frames[1].detections.len(), 1);
        assert!(frames[2].capture_failed);
        assert!(TraceReader::validate_frames(&frames).is_empty());
    }

    #[test]
    fn test_parse_detects_array_format() {
        let json = r#"[{"time": 0.5, "duration": 4.0}]"#;
        let frames = TraceReader::parse(json).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].detections.is_empty());
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = TraceReader::parse_ndjson("{\"time\": 0, \"duration\": 1}\nnot json").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_validation_failures() {
        let mut bad_conf = TraceFrame::new(
            1.0,
            10.0,
            vec![Detection::new("person", 1.5, BoundingBox::new(0.0, 0.0, 1.0, 1.0))],
        );
        assert!(matches!(
            bad_conf.validate(),
            Err(ValidationError::ConfidenceOutOfRange { index: 0, .. })
        ));

        bad_conf.detections[0].score = 0.5;
        bad_conf.detections[0].bbox = BoundingBox::new(5.0, 0.0, 1.0, 1.0);
        assert_eq!(bad_conf.validate(), Err(ValidationError::InvertedBox { index: 0 }));

        let zero_duration = TraceFrame::new(1.0, 0.0, Vec::new());
        assert_eq!(zero_duration.validate(), Err(ValidationError::InvalidDuration(0.0)));
    }

    #[test]
    fn test_time_must_not_go_backwards() {
        let frames = vec![
            TraceFrame::new(2.0, 10.0, Vec::new()),
            TraceFrame::new(1.0, 10.0, Vec::new()),
            TraceFrame::new(3.0, 10.0, Vec::new()),
        ];
        let results = TraceReader::validate_frames(&frames);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 1);
        assert!(TraceReader::ensure_valid(&frames).is_err());
    }
}
