//! Error handling for Padtrack
//!
//! Clip-level read failures abort a render; conversion and per-buffer
//! concatenation failures are recovered inside the engine and only logged.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Padtrack operations
pub type Result<T> = std::result::Result<T, PadtrackError>;

/// Main error type for Padtrack operations
#[derive(Error, Debug)]
pub enum PadtrackError {
    // Source Errors
    #[error("Sound file not found: {name}")]
    SourceNotFound { name: String, path: PathBuf },

    #[error("Invalid audio file format: {name} ({reason})")]
    UnsupportedFormat { name: String, reason: String },

    #[error("Format conversion failed: {reason}")]
    ConversionFailure { reason: String },

    // Timeline Errors
    #[error("No audio to render: timeline is empty")]
    EmptyTimeline,

    #[error("Invalid gap duration: {duration_secs}s")]
    InvalidDuration { duration_secs: f64 },

    #[error("Timeline index {index} out of range (len {len})")]
    InvalidIndex { index: usize, len: usize },

    // Render Errors
    #[error("Failed to save rendered track to {path}: {reason}")]
    WriteFailure { path: PathBuf, reason: String },

    #[error("A render is already running for this timeline")]
    RenderBusy,

    #[error("Render was cancelled")]
    RenderCancelled,

    // Store Errors
    #[error("Track not found: {id}")]
    TrackNotFound { id: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PadtrackError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            PadtrackError::SourceNotFound { .. } => "SOURCE_NOT_FOUND",
            PadtrackError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            PadtrackError::ConversionFailure { .. } => "CONVERSION_FAILURE",
            PadtrackError::EmptyTimeline => "EMPTY_TIMELINE",
            PadtrackError::InvalidDuration { .. } => "INVALID_DURATION",
            PadtrackError::InvalidIndex { .. } => "INVALID_INDEX",
            PadtrackError::WriteFailure { .. } => "WRITE_FAILURE",
            PadtrackError::RenderBusy => "RENDER_BUSY",
            PadtrackError::RenderCancelled => "RENDER_CANCELLED",
            PadtrackError::TrackNotFound { .. } => "TRACK_NOT_FOUND",
            PadtrackError::Config { .. } => "CONFIG_ERROR",
            PadtrackError::Io(_) => "IO_ERROR",
            PadtrackError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recovered inside the engine rather than surfaced
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PadtrackError::ConversionFailure { .. }
                | PadtrackError::RenderBusy
                | PadtrackError::InvalidIndex { .. }
        )
    }

    /// Errors that should not show an error dialog; the UI action is simply a no-op
    pub fn is_silent(&self) -> bool {
        matches!(self, PadtrackError::EmptyTimeline)
    }

    /// Name of the clip that caused this error, if any
    pub fn clip_name(&self) -> Option<&str> {
        match self {
            PadtrackError::SourceNotFound { name, .. }
            | PadtrackError::UnsupportedFormat { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Get a user-friendly message for this error
    pub fn friendly_message(&self) -> String {
        match self {
            PadtrackError::SourceNotFound { name, .. } => {
                format!("The sound '{}' could not be found. Re-record or re-import it and try again.", name)
            }
            PadtrackError::UnsupportedFormat { name, .. } => {
                format!("The sound '{}' is not an audio format that can be read.", name)
            }
            PadtrackError::WriteFailure { .. } => {
                "The track could not be saved. Check free disk space and try again.".to_string()
            }
            PadtrackError::InvalidDuration { .. } => {
                "Delay must be a positive number of seconds.".to_string()
            }
            _ => self.to_string(),
        }
    }
}
