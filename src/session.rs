//! Frame sampling loop
//!
//! `AnalysisSession` owns everything that lives for one video: the detector
//! adapter, the scorers (and the motion history inside them), the score
//! history, and the marker collection. It is driven by the player's clock:
//!
//! ```text
//! Idle --begin_loading--> Loading --finish_loading--> Armed --play--> Sampling --(>= 90%)--> Completed
//!   ^                                                                                              |
//!   +------------------------------------------ select_video ------------------------------------+
//! ```
//!
//! Sampling is two-phase so hosts with an asynchronous detector can suspend
//! between the phases: [`AnalysisSession::on_time_update`] hands out a
//! [`SampleTicket`] when a sample is due, and
//! [`AnalysisSession::complete_sample`] takes the frame's detections back.
//! Only one ticket is outstanding at a time; clock updates that arrive while
//! one is out are dropped. [`AnalysisSession::tick`] runs both phases inline
//! for synchronous hosts.

use crate::adapters::{DetectorAdapter, FrameCapture, ObjectDetector};
use crate::aggregator::aggregate;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, CaptureError, DetectorError};
use crate::history::ScoreHistory;
use crate::markers::{visible_markers, MarkerSynthesizer};
use crate::notify::{LogSink, Notification, NotificationSink};
use crate::risk::classify_risk;
use crate::scorers::{
    score_soft, EyeContactScorer, HeuristicScorer, RepetitiveMovementScorer,
    SocialReciprocityScorer,
};
use crate::types::{
    AnalysisReport, Category, CategoryResult, Detection, FrameAnalysis, Marker, ScoreOutcome,
};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Video selected, detector not requested yet
    Idle,
    /// Detector is initializing
    Loading,
    /// Detector load finished (possibly degraded), waiting for playback
    Armed,
    /// Playback has started; clock updates drive sampling
    Sampling,
    /// Report generated; terminal until the next video
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Armed => "armed",
            SessionState::Sampling => "sampling",
            SessionState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Proof that a sample is in flight.
///
/// Tickets from before a `select_video` reset are stale and their results are
/// discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleTicket {
    generation: u64,
    timestamp: f64,
}

impl SampleTicket {
    /// Playback position the frame should be captured at
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// What a clock update or a completed sample did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing to do for this update
    Ignored,
    /// A sample was due but another one is still in flight
    Dropped,
    /// A sample is due: capture the frame, detect, then `complete_sample`
    SampleDue(SampleTicket),
    /// A frame was scored and recorded
    Sampled(Box<FrameAnalysis>),
    /// The frame could not be captured; nothing was recorded
    Skipped,
    /// The session just completed with this report
    Completed(Box<AnalysisReport>),
}

type ReportCallback = Box<dyn FnMut(&AnalysisReport)>;

/// One analysis session: the lifetime of one selected video
pub struct AnalysisSession {
    session_id: String,
    config: AnalysisConfig,
    state: SessionState,
    detector: DetectorAdapter,
    eye_contact: EyeContactScorer,
    repetitive: RepetitiveMovementScorer,
    social: SocialReciprocityScorer,
    synthesizer: MarkerSynthesizer,
    history: ScoreHistory,
    markers: Vec<Marker>,
    visible: Vec<Marker>,
    last_frame: Option<FrameAnalysis>,
    in_flight: Option<SampleTicket>,
    generation: u64,
    current_time: f64,
    duration: Option<f64>,
    playing: bool,
    dropped_ticks: u64,
    report: Option<AnalysisReport>,
    sink: Option<Box<dyn NotificationSink>>,
    on_report: Option<ReportCallback>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::build(AnalysisConfig::default())
    }
}

impl fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .field("detector", &self.detector)
            .field("frames", &self.history.frame_count())
            .field("markers", &self.markers.len())
            .field("in_flight", &self.in_flight)
            .field("current_time", &self.current_time)
            .field("duration", &self.duration)
            .finish()
    }
}

impl AnalysisSession {
    /// Create a session with a validated configuration
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: AnalysisConfig) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            eye_contact: EyeContactScorer::new(&config),
            repetitive: RepetitiveMovementScorer::new(&config),
            social: SocialReciprocityScorer::new(&config),
            synthesizer: MarkerSynthesizer::new(&config),
            config,
            state: SessionState::Idle,
            detector: DetectorAdapter::unloaded(),
            history: ScoreHistory::new(),
            markers: Vec::new(),
            visible: Vec::new(),
            last_frame: None,
            in_flight: None,
            generation: 0,
            current_time: 0.0,
            duration: None,
            playing: false,
            dropped_ticks: 0,
            report: None,
            sink: None,
            on_report: None,
        }
    }

    /// Attach a notification sink
    pub fn with_sink<S: NotificationSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn set_sink<S: NotificationSink + 'static>(&mut self, sink: S) {
        self.sink = Some(Box::new(sink));
    }

    /// Register the report consumer; it is called once per completed session
    pub fn on_report_ready<F: FnMut(&AnalysisReport) + 'static>(&mut self, callback: F) {
        self.on_report = Some(Box::new(callback));
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Loaded, but without a working detector
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.state,
            SessionState::Armed | SessionState::Sampling | SessionState::Completed
        ) && !self.detector.is_available()
    }

    pub fn detector_mut(&mut self) -> &mut DetectorAdapter {
        &mut self.detector
    }

    pub fn history(&self) -> &ScoreHistory {
        &self.history
    }

    /// Every marker synthesized this session, in creation order
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    /// Markers visible at the last clock update
    pub fn visible_markers(&self) -> &[Marker] {
        &self.visible
    }

    pub fn last_frame(&self) -> Option<&FrameAnalysis> {
        self.last_frame.as_ref()
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        self.report.as_ref()
    }

    pub fn is_sample_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Clock updates dropped because a sample was already in flight
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Idle -> Loading
    pub fn begin_loading(&mut self) -> Result<(), AnalysisError> {
        self.expect_state(SessionState::Idle, "load the detector")?;
        self.state = SessionState::Loading;
        log::debug!("session {}: loading detector", self.session_id);
        Ok(())
    }

    /// Loading -> Armed. A failed load arms the session in degraded mode.
    pub fn finish_loading(
        &mut self,
        result: Result<Box<dyn ObjectDetector>, DetectorError>,
    ) -> Result<(), AnalysisError> {
        self.expect_state(SessionState::Loading, "finish loading")?;
        self.detector = DetectorAdapter::from_load_result(result);
        self.state = SessionState::Armed;

        let notification = match self.detector.unavailable_reason() {
            None => Notification::ModelLoaded,
            Some(reason) => Notification::DetectorUnavailable {
                reason: reason.to_string(),
            },
        };
        self.notify(notification);
        Ok(())
    }

    /// Idle -> Loading -> Armed using `loader`
    pub fn load_detector<F>(&mut self, loader: F) -> Result<(), AnalysisError>
    where
        F: FnOnce() -> Result<Box<dyn ObjectDetector>, DetectorError>,
    {
        self.begin_loading()?;
        self.finish_loading(loader())
    }

    /// Player started. The first play arms sampling.
    pub fn play(&mut self) -> Result<(), AnalysisError> {
        match self.state {
            SessionState::Idle | SessionState::Loading => Err(AnalysisError::InvalidTransition {
                action: "play".to_string(),
                state: self.state.to_string(),
            }),
            SessionState::Armed => {
                self.playing = true;
                self.state = SessionState::Sampling;
                self.notify(Notification::AnalysisStarted);
                Ok(())
            }
            SessionState::Sampling | SessionState::Completed => {
                self.playing = true;
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Player reached the end. Completes the session if it has samples.
    pub fn ended(&mut self) -> Option<AnalysisReport> {
        self.playing = false;
        if let Some(duration) = self.duration {
            self.current_time = duration;
            self.refresh_visible();
        }
        self.try_complete()
    }

    /// A new video was selected: everything resets and the session returns
    /// to Idle under a fresh id. Sink and report callback are kept.
    pub fn select_video(&mut self) {
        log::debug!("session {}: reset for new video", self.session_id);
        self.session_id = Uuid::new_v4().to_string();
        self.state = SessionState::Idle;
        self.detector = DetectorAdapter::unloaded();
        self.eye_contact.reset();
        self.repetitive.reset();
        self.social.reset();
        self.history.clear();
        self.markers.clear();
        self.visible.clear();
        self.last_frame = None;
        self.in_flight = None;
        self.generation += 1;
        self.current_time = 0.0;
        self.duration = None;
        self.playing = false;
        self.dropped_ticks = 0;
        self.report = None;
    }

    // ------------------------------------------------------------------
    // Sampling
    // ------------------------------------------------------------------

    /// Handle a playback-clock update.
    ///
    /// `duration` may be non-finite before the player knows it; completion is
    /// not evaluated until it is.
    pub fn on_time_update(&mut self, current_time: f64, duration: f64) -> TickOutcome {
        if !current_time.is_finite() || current_time < 0.0 {
            log::debug!("ignoring clock update with invalid time {current_time}");
            return TickOutcome::Ignored;
        }
        self.current_time = current_time;
        if duration.is_finite() && duration > 0.0 {
            self.duration = Some(duration);
        }
        self.refresh_visible();

        if self.state != SessionState::Sampling {
            return TickOutcome::Ignored;
        }

        if let Some(report) = self.try_complete() {
            return TickOutcome::Completed(Box::new(report));
        }

        if !self.sampling_due(current_time) {
            return TickOutcome::Ignored;
        }

        if self.in_flight.is_some() {
            self.dropped_ticks += 1;
            log::debug!("sample in flight, dropping clock update at {current_time:.3}s");
            return TickOutcome::Dropped;
        }

        let ticket = SampleTicket {
            generation: self.generation,
            timestamp: current_time,
        };
        self.in_flight = Some(ticket);
        TickOutcome::SampleDue(ticket)
    }

    /// Deliver the result of the sample identified by `ticket`.
    ///
    /// `frame` is the detections for the captured frame, or the capture
    /// failure. Results for stale tickets, or arriving after completion, are
    /// discarded.
    pub fn complete_sample(
        &mut self,
        ticket: SampleTicket,
        frame: Result<Vec<Detection>, CaptureError>,
    ) -> TickOutcome {
        if self.in_flight != Some(ticket) {
            log::debug!(
                "discarding result for stale sample at {:.3}s",
                ticket.timestamp
            );
            return TickOutcome::Ignored;
        }
        self.in_flight = None;

        if self.state != SessionState::Sampling {
            log::debug!(
                "discarding sample at {:.3}s, session is {}",
                ticket.timestamp,
                self.state
            );
            return TickOutcome::Ignored;
        }

        let detections = match frame {
            Ok(detections) => detections,
            Err(e) => {
                self.notify(Notification::Error {
                    message: e.to_string(),
                });
                return TickOutcome::Skipped;
            }
        };

        let analysis = self.score_frame(ticket.timestamp, &detections);
        self.refresh_visible();

        match self.try_complete() {
            Some(report) => TickOutcome::Completed(Box::new(report)),
            None => TickOutcome::Sampled(Box::new(analysis)),
        }
    }

    /// Run both sampling phases inline: clock update, capture, detect, score
    pub fn tick<C: FrameCapture + ?Sized>(
        &mut self,
        current_time: f64,
        duration: f64,
        capture: &mut C,
    ) -> TickOutcome {
        let ticket = match self.on_time_update(current_time, duration) {
            TickOutcome::SampleDue(ticket) => ticket,
            other => return other,
        };

        let frame = capture
            .capture(ticket.timestamp())
            .map(|snapshot| self.detector.detect(&snapshot));
        self.complete_sample(ticket, frame)
    }

    fn sampling_due(&self, current_time: f64) -> bool {
        (current_time.floor() as u64) % self.config.sampling_interval_sec == 0
    }

    fn score_frame(&mut self, timestamp: f64, detections: &[Detection]) -> FrameAnalysis {
        let eye = score_soft(&mut self.eye_contact, detections);
        let repetitive = score_soft(&mut self.repetitive, detections);
        let social = score_soft(&mut self.social, detections);

        let mut frame_markers = Vec::new();
        for (category, outcome) in [
            (Category::EyeContact, &eye),
            (Category::RepetitiveMovement, &repetitive),
            (Category::SocialReciprocity, &social),
        ] {
            if let Some(first) = outcome.contributing.first() {
                frame_markers.push(self.synthesizer.synthesize(first, category, timestamp));
            }
        }

        let frame_index =
            self.history
                .record_frame(timestamp, eye.score, repetitive.score, social.score);
        self.markers.extend(frame_markers.iter().cloned());

        log::debug!(
            "frame {frame_index} at {timestamp:.2}s: eye={:.1} repetitive={:.1} social={:.1}",
            eye.score,
            repetitive.score,
            social.score
        );

        let analysis = FrameAnalysis {
            frame_index,
            timestamp,
            eye_contact: frame_result(&eye),
            repetitive_movements: frame_result(&repetitive),
            social_reciprocity: frame_result(&social),
            markers: frame_markers,
        };
        self.last_frame = Some(analysis.clone());
        analysis
    }

    /// Sampling -> Completed, at most once
    fn try_complete(&mut self) -> Option<AnalysisReport> {
        if self.state != SessionState::Sampling || self.history.is_empty() {
            return None;
        }
        let duration = self.duration?;
        if self.current_time < self.config.completion_fraction * duration {
            return None;
        }

        let mut report = aggregate(
            &self.history.scores(Category::EyeContact),
            &self.history.scores(Category::RepetitiveMovement),
            &self.history.scores(Category::SocialReciprocity),
            self.markers.clone(),
        );
        report.session_id = Some(self.session_id.clone());

        self.state = SessionState::Completed;
        self.report = Some(report.clone());
        log::info!(
            "session {} completed at {:.2}s with {} samples",
            self.session_id,
            self.current_time,
            report.samples_analyzed
        );

        if let Some(callback) = self.on_report.as_mut() {
            callback(&report);
        }
        self.notify(Notification::AnalysisComplete {
            overall_risk: report.overall_risk,
            samples_analyzed: report.samples_analyzed,
        });

        Some(report)
    }

    fn refresh_visible(&mut self) {
        self.visible = visible_markers(&self.markers, self.current_time);
    }

    fn expect_state(&self, expected: SessionState, action: &str) -> Result<(), AnalysisError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AnalysisError::InvalidTransition {
                action: action.to_string(),
                state: self.state.to_string(),
            })
        }
    }

    fn notify(&self, notification: Notification) {
        LogSink.notify(&notification);
        if let Some(sink) = &self.sink {
            sink.notify(&notification);
        }
    }
}

fn frame_result(outcome: &ScoreOutcome) -> CategoryResult {
    CategoryResult {
        score: outcome.score,
        risk: classify_risk(outcome.score),
    }
}
