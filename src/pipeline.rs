//! Trace replay
//!
//! Drives an [`AnalysisSession`] from a recorded detection trace instead of a
//! live player. Each trace line becomes a clock update; the recorded
//! detections stand in for the object detector and recorded capture failures
//! stand in for the player's snapshot errors.

use crate::adapters::{ObjectDetector, ReplayCapture, ReplayDetector};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::session::{AnalysisSession, TickOutcome};
use crate::trace::{PlaybackEvent, TraceFrame, TraceReader};
use crate::types::{AnalysisReport, FrameAnalysis};

/// Replay a trace with the default configuration and return the report JSON.
///
/// Fails if the trace is invalid or playback never reaches the completion
/// point with at least one sample.
///
/// # Example
/// ```ignore
/// let report_json = analyze_trace(&std::fs::read_to_string("session.ndjson")?)?;
/// ```
pub fn analyze_trace(trace: &str) -> Result<String, AnalysisError> {
    TraceAnalyzer::default().analyze(trace)
}

/// Everything a replay produced
#[derive(Debug, Clone)]
pub struct TraceRun {
    pub session_id: String,
    /// Final report, if the session completed
    pub report: Option<AnalysisReport>,
    /// Every sampled frame in order
    pub frames: Vec<FrameAnalysis>,
    /// Samples lost to capture failures
    pub skipped: usize,
    /// Clock updates dropped by the in-flight guard
    pub dropped_ticks: u64,
    /// Last playback position seen
    pub last_time: f64,
}

impl TraceRun {
    /// The report, or an `Incomplete` error describing where replay stopped
    pub fn into_report(self) -> Result<AnalysisReport, AnalysisError> {
        let frames = self.frames.len();
        let last_time = self.last_time;
        self.report.ok_or_else(|| {
            AnalysisError::Incomplete(format!(
                "trace stopped at {last_time:.2}s after {frames} samples"
            ))
        })
    }
}

/// Replays traces through fresh sessions sharing one configuration
#[derive(Debug, Clone, Default)]
pub struct TraceAnalyzer {
    config: AnalysisConfig,
}

impl TraceAnalyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Parse, validate, replay and encode the report
    pub fn analyze(&self, trace: &str) -> Result<String, AnalysisError> {
        let frames = TraceReader::parse(trace)?;
        let report = self.run(&frames)?.into_report()?;
        Ok(serde_json::to_string(&report)?)
    }

    /// Replay validated frames through a new session.
    ///
    /// Playback starts at the first frame unless the trace carries an explicit
    /// `play` event, in which case clock updates before it are ignored like a
    /// paused player's would be. An `ended` event completes the session at the
    /// full duration.
    pub fn run(&self, frames: &[TraceFrame]) -> Result<TraceRun, AnalysisError> {
        TraceReader::ensure_valid(frames)?;

        let mut session = AnalysisSession::new(self.config.clone())?;
        let detector = ReplayDetector::from_trace(frames);
        session.load_detector(move || Ok(Box::new(detector) as Box<dyn ObjectDetector>))?;

        let mut capture = ReplayCapture::from_trace(
            frames,
            self.config.reference_width.round() as u32,
            self.config.reference_height.round() as u32,
        );

        let explicit_play = frames
            .iter()
            .any(|f| f.event == Some(PlaybackEvent::Play));
        if !explicit_play {
            session.play()?;
        }

        let mut run = TraceRun {
            session_id: session.session_id().to_string(),
            report: None,
            frames: Vec::new(),
            skipped: 0,
            dropped_ticks: 0,
            last_time: 0.0,
        };

        for frame in frames {
            match frame.event {
                Some(PlaybackEvent::Play) => session.play()?,
                Some(PlaybackEvent::Pause) => session.pause(),
                Some(PlaybackEvent::Ended) => {
                    if let Some(report) = session.ended() {
                        run.report = Some(report);
                    }
                    run.last_time = session.current_time();
                    continue;
                }
                None => {}
            }

            run.last_time = frame.time;
            match session.tick(frame.time, frame.duration, &mut capture) {
                TickOutcome::Sampled(analysis) => run.frames.push(*analysis),
                TickOutcome::Skipped => run.skipped += 1,
                TickOutcome::Completed(report) => {
                    if let Some(analysis) = session.last_frame() {
                        if run.frames.last().map(|f| f.frame_index) != Some(analysis.frame_index)
                        {
                            run.frames.push(analysis.clone());
                        }
                    }
                    run.report = Some(*report);
                }
                TickOutcome::Ignored | TickOutcome::Dropped | TickOutcome::SampleDue(_) => {}
            }
        }

        run.dropped_ticks = session.dropped_ticks();
        log::info!(
            "replayed {} trace frames: {} samples, {} skipped, completed={}",
            frames.len(),
            run.frames.len(),
            run.skipped,
            run.report.is_some()
        );
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, RiskTier};

    fn ndjson(lines: &[String]) -> String {
        lines.join("\n")
    }

    fn face_line(time: f64, duration: f64) -> String {
        format!(
            r#"{{"time": {time}, "duration": {duration}, "detections": [{{"label": "face", "score": 0.95, "box": {{"xmin": 270, "ymin": 190, "xmax": 370, "ymax": 290}}}}]}}"#
        )
    }

    fn two_people_line(time: f64, duration: f64) -> String {
        format!(
            r#"{{"time": {time}, "duration": {duration}, "detections": [{{"label": "person", "score": 0.9, "box": {{"xmin": 100, "ymin": 100, "xmax": 200, "ymax": 300}}}}, {{"label": "person", "score": 0.9, "box": {{"xmin": 300, "ymin": 100, "xmax": 400, "ymax": 300}}}}]}}"#
        )
    }

    #[test]
    fn test_analyze_trace_produces_report_json() {
        let trace = ndjson(&[
            face_line(0.0, 10.0),
            face_line(1.0, 10.0),
            face_line(2.0, 10.0),
            face_line(9.5, 10.0),
        ]);

        let json = analyze_trace(&trace).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(report["eye_contact"]["score"], 100.0);
        assert_eq!(report["eye_contact"]["risk"], "low");
        assert_eq!(report["samples_analyzed"], 3);
        assert!(report["session_id"].is_string());
        assert_eq!(report["detected_markers"][0]["type"], "eye-contact");
    }

    #[test]
    fn test_incomplete_trace_is_an_error() {
        let trace = ndjson(&[face_line(1.0, 100.0), face_line(2.0, 100.0)]);
        let err = analyze_trace(&trace).unwrap_err();
        assert!(matches!(err, AnalysisError::Incomplete(_)));
    }

    #[test]
    fn test_ended_event_completes() {
        let mut frames = TraceReader::parse(&ndjson(&[two_people_line(1.0, 100.0)])).unwrap();
        let mut end = TraceFrame::new(30.0, 100.0, Vec::new());
        end.event = Some(PlaybackEvent::Ended);
        frames.push(end);

        let run = TraceAnalyzer::default().run(&frames).unwrap();
        let report = run.into_report().unwrap();

        assert_eq!(report.samples_analyzed, 1);
        // 200 px apart: 100 * (1 - 200/500)
        assert_eq!(report.category(Category::SocialReciprocity).score, 60.0);
        assert_eq!(report.social_reciprocity.risk, RiskTier::Moderate);
    }

    #[test]
    fn test_explicit_play_gates_sampling() {
        let mut frames = TraceReader::parse(&ndjson(&[
            face_line(1.0, 10.0),
            face_line(2.0, 10.0),
            face_line(3.0, 10.0),
            face_line(9.0, 10.0),
        ]))
        .unwrap();
        frames[2].event = Some(PlaybackEvent::Play);

        let run = TraceAnalyzer::default().run(&frames).unwrap();
        assert_eq!(run.frames.len(), 1);
        assert_eq!(run.frames[0].timestamp, 3.0);
        assert!(run.report.is_some());
    }

    #[test]
    fn test_capture_failures_are_skipped() {
        let trace = ndjson(&[
            face_line(1.0, 10.0),
            r#"{"time": 2.0, "duration": 10.0, "capture_failed": true}"#.to_string(),
            face_line(3.0, 10.0),
            face_line(9.0, 10.0),
        ]);
        let frames = TraceReader::parse(&trace).unwrap();
        let run = TraceAnalyzer::default().run(&frames).unwrap();

        assert_eq!(run.skipped, 1);
        assert_eq!(run.frames.len(), 2);
        assert_eq!(run.report.unwrap().samples_analyzed, 2);
    }

    #[test]
    fn test_invalid_trace_rejected() {
        let trace = ndjson(&[face_line(2.0, 10.0), face_line(1.0, 10.0)]);
        assert!(matches!(
            analyze_trace(&trace),
            Err(AnalysisError::InvalidTrace(_))
        ));
    }

    #[test]
    fn test_custom_interval() {
        let config = AnalysisConfig {
            sampling_interval_sec: 3,
            ..AnalysisConfig::default()
        };
        let analyzer = TraceAnalyzer::new(config).unwrap();
        let lines: Vec<String> = (0..10).map(|t| face_line(t as f64 + 0.5, 10.0)).collect();
        let frames = TraceReader::parse(&ndjson(&lines)).unwrap();

        let run = analyzer.run(&frames).unwrap();
        let sampled: Vec<f64> = run.frames.iter().map(|f| f.timestamp).collect();
        assert_eq!(sampled, vec![0.5, 3.5, 6.5]);
        assert!(run.report.is_some());
    }
}
