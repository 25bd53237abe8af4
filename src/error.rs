//! Error types for Gesture Pointer

use thiserror::Error;

/// Errors that can occur while mapping landmarks to pointer events
#[derive(Debug, Error)]
pub enum GestureError {
    /// Malformed frame; the caller skips it and continues
    #[error("Invalid landmark frame: {0}")]
    InvalidFrame(String),

    /// Transient condition, not surfaced to the user
    #[error("No hand detected")]
    NoHandDetected,

    /// Invalid configuration, fatal before the pipeline starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse frame input: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pointer sink rejected event: {0}")]
    SinkError(String),
}

impl GestureError {
    /// Whether the pipeline should skip the frame and keep going
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GestureError::InvalidFrame(_) | GestureError::NoHandDetected)
    }
}
