//! Status notifications
//!
//! Fire-and-forget status messages for whatever presentation layer hosts the
//! session (toasts, a status bar, a log). Sessions work the same with or
//! without a sink attached.

use crate::types::RiskTier;
use serde::Serialize;
use std::fmt;

/// Status message emitted by an analysis session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// The object detector finished loading
    ModelLoaded,
    /// The object detector could not be loaded; analysis continues degraded
    DetectorUnavailable { reason: String },
    /// Playback started and sampling is live
    AnalysisStarted,
    /// The final report is ready
    AnalysisComplete {
        overall_risk: RiskTier,
        samples_analyzed: usize,
    },
    /// A non-fatal problem worth surfacing
    Error { message: String },
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::ModelLoaded => write!(f, "object detector loaded"),
            Notification::DetectorUnavailable { reason } => {
                write!(f, "object detector unavailable: {reason}")
            }
            Notification::AnalysisStarted => write!(f, "analysis started"),
            Notification::AnalysisComplete {
                overall_risk,
                samples_analyzed,
            } => write!(
                f,
                "analysis complete: {overall_risk} overall risk from {samples_analyzed} samples"
            ),
            Notification::Error { message } => write!(f, "analysis error: {message}"),
        }
    }
}

/// Receiver for session notifications
pub trait NotificationSink {
    fn notify(&self, notification: &Notification);
}

impl<F> NotificationSink for F
where
    F: Fn(&Notification),
{
    fn notify(&self, notification: &Notification) {
        self(notification)
    }
}

/// Sink that writes notifications to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, notification: &Notification) {
        match notification {
            Notification::DetectorUnavailable { .. } | Notification::Error { .. } => {
                log::warn!("{notification}")
            }
            _ => log::info!("{notification}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_closure_sink() {
        let seen = RefCell::new(Vec::new());
        let sink = |n: &Notification| seen.borrow_mut().push(n.clone());

        sink.notify(&Notification::ModelLoaded);
        sink.notify(&Notification::AnalysisStarted);

        assert_eq!(
            *seen.borrow(),
            vec![Notification::ModelLoaded, Notification::AnalysisStarted]
        );
    }

    #[test]
    fn test_display_and_wire_format() {
        let n = Notification::AnalysisComplete {
            overall_risk: RiskTier::Moderate,
            samples_analyzed: 4,
        };
        assert_eq!(
            n.to_string(),
            "analysis complete: moderate overall risk from 4 samples"
        );

        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["kind"], "analysis_complete");
        assert_eq!(value["overall_risk"], "moderate");
    }

    #[test]
    fn test_log_sink_does_not_panic_without_logger() {
        LogSink.notify(&Notification::Error {
            message: "capture failed".to_string(),
        });
    }
}
