use super::{FrameCapture, FrameSnapshot, ObjectDetector};
use crate::error::{CaptureError, DetectorError};
use crate::trace::{PlaybackEvent, TraceFrame};
use crate::types::Detection;

/// Tolerance when matching a snapshot position to a recorded update
const TIME_EPSILON: f64 = 1e-6;

/// Detector that answers from a recorded trace.
///
/// Returns the detections of the latest recorded update at or before the
/// snapshot's position. `ended` markers carry no frame and are skipped.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    frames: Vec<(f64, Vec<Detection>)>,
}

impl ReplayDetector {
    pub fn from_trace(frames: &[TraceFrame]) -> Self {
        let mut recorded: Vec<(f64, Vec<Detection>)> = frames
            .iter()
            .filter(|f| !f.capture_failed && f.event != Some(PlaybackEvent::Ended))
            .map(|f| (f.time, f.detections.clone()))
            .collect();
        recorded.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { frames: recorded }
    }
}

impl ObjectDetector for ReplayDetector {
    fn detect(&mut self, frame: &FrameSnapshot) -> Result<Vec<Detection>, DetectorError> {
        let at = frame.timestamp + TIME_EPSILON;
        let idx = self.frames.partition_point(|(t, _)| *t <= at);
        match idx.checked_sub(1).and_then(|i| self.frames.get(i)) {
            Some((_, detections)) => Ok(detections.clone()),
            None => Err(DetectorError::InferenceFailed(format!(
                "no recorded frame at or before {:.3}s",
                frame.timestamp
            ))),
        }
    }
}

/// Frame capture that fails exactly where the trace recorded a failure
#[derive(Debug, Clone)]
pub struct ReplayCapture {
    failed_at: Vec<f64>,
    width: u32,
    height: u32,
}

impl ReplayCapture {
    pub fn from_trace(frames: &[TraceFrame], width: u32, height: u32) -> Self {
        Self {
            failed_at: frames
                .iter()
                .filter(|f| f.capture_failed)
                .map(|f| f.time)
                .collect(),
            width,
            height,
        }
    }
}

impl FrameCapture for ReplayCapture {
    fn capture(&mut self, timestamp: f64) -> Result<FrameSnapshot, CaptureError> {
        if self
            .failed_at
            .iter()
            .any(|t| (t - timestamp).abs() < TIME_EPSILON)
        {
            return Err(CaptureError::Unavailable(format!(
                "recorded capture failure at {timestamp:.3}s"
            )));
        }
        Ok(FrameSnapshot::empty(timestamp, self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn person() -> Detection {
        Detection::new("person", 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_replays_latest_frame_at_or_before() {
        let frames = vec![
            TraceFrame::new(1.0, 10.0, vec![person()]),
            TraceFrame::new(2.0, 10.0, vec![person(), person()]),
        ];
        let mut detector = ReplayDetector::from_trace(&frames);

        let at = |t: f64| FrameSnapshot::empty(t, 640, 480);
        assert!(detector.detect(&at(0.5)).is_err());
        assert_eq!(detector.detect(&at(1.0)).unwrap().len(), 1);
        assert_eq!(detector.detect(&at(1.9)).unwrap().len(), 1);
        assert_eq!(detector.detect(&at(2.0)).unwrap().len(), 2);
    }

    #[test]
    fn test_capture_fails_where_recorded() {
        let mut failed = TraceFrame::new(3.0, 10.0, Vec::new());
        failed.capture_failed = true;
        let frames = vec![TraceFrame::new(2.0, 10.0, Vec::new()), failed];
        let mut capture = ReplayCapture::from_trace(&frames, 640, 480);

        assert!(capture.capture(2.0).is_ok());
        assert!(capture.capture(3.0).is_err());
    }
}
