//! Markerscope - heuristic behavioral-marker analysis for recorded video
//!
//! Markerscope samples frames from a playing video, scores each frame's object
//! detections with simple geometric heuristics, and condenses the scores into a
//! categorical report: per-frame detections → heuristic scoring → marker
//! synthesis → score aggregation → risk classification.
//!
//! ## Modules
//!
//! - **Session**: the playback-driven sampling loop (`AnalysisSession`)
//! - **Scorers**: eye contact, repetitive movement and social reciprocity heuristics
//! - **Trace replay**: drive a session offline from a recorded detection trace
//!
//! The scores are illustrative heuristics, not clinical measurements.

pub mod adapters;
pub mod aggregator;
pub mod config;
pub mod error;
pub mod history;
pub mod markers;
pub mod notify;
pub mod pipeline;
pub mod risk;
pub mod scorers;
pub mod session;
pub mod trace;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use adapters::{DetectorAdapter, FrameCapture, FrameSnapshot, ObjectDetector};
pub use aggregator::aggregate;
pub use config::AnalysisConfig;
pub use error::{AnalysisError, CaptureError, DetectorError};
pub use markers::{visible_markers, MarkerSynthesizer};
pub use notify::{LogSink, Notification, NotificationSink};
pub use pipeline::{analyze_trace, TraceAnalyzer, TraceRun};
pub use risk::{classify_risk, overall_risk};
pub use session::{AnalysisSession, SampleTicket, SessionState, TickOutcome};
pub use trace::{TraceFrame, TraceReader, TRACE_VERSION};
pub use types::{
    AnalysisReport, BoundingBox, Category, CategoryResult, Detection, FrameAnalysis, Marker,
    RiskTier,
};

/// Markerscope version
pub const MARKERSCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "markerscope";
