//! Error types for Markerscope

use thiserror::Error;

/// Errors that can occur while driving an analysis session
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid session transition: cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    #[error("Scorer fault in {category}: {reason}")]
    ScorerFault { category: String, reason: String },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid trace frame: {0}")]
    InvalidTrace(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Analysis did not complete: {0}")]
    Incomplete(String),
}

/// Errors raised by an object detector backend
#[derive(Debug, Clone, Error)]
pub enum DetectorError {
    #[error("Detector failed to load: {0}")]
    LoadFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),
}

/// Errors raised while grabbing a frame snapshot from the player
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Frame capture unavailable: {0}")]
    Unavailable(String),
}
