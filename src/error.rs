//! Error types for frame capture processing.
//!
//! Extraction, classification and buffer writes never fail: out-of-range layouts
//! clamp to 0 and capacity is handled by compaction and ring overwrite. The errors
//! here cover the fallible edges of the pipeline.
//!
//! ## Error Categories
//!
//! - **Backend Errors**: paginated store fetches, timestamp lookups and re-framing
//! - **Transport Errors**: failures reported by the frame source
//! - **Config Errors**: invalid or unreadable pipeline configuration
//! - **Session Errors**: operations on a capture session that has already ended
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use framestream::CaptureError;
//!
//! let error = CaptureError::backend_failed("fetch_page", "connection reset");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for capture operations.
pub type Result<T, E = CaptureError> = std::result::Result<T, E>;

/// Main error type for capture operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CaptureError {
    #[error("Backend {operation} failed: {reason}")]
    Backend {
        operation: &'static str,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid configuration for {field}: {details}")]
    Config { field: &'static str, details: String },

    #[error("Configuration file error: {path}")]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml_ng::Error),

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Capture session has already stopped")]
    SessionClosed,
}

impl CaptureError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CaptureError::Backend { .. } => true,
            CaptureError::Transport { .. } => true,
            CaptureError::Timeout { .. } => true,
            CaptureError::Config { .. } => false,
            CaptureError::ConfigFile { .. } => false,
            CaptureError::ConfigParse(_) => false,
            CaptureError::SessionClosed => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            CaptureError::Backend { .. } => vec![
                "Retry the request",
                "Check that the capture was persisted",
                "Verify the backend buffer still exists",
            ],
            CaptureError::Transport { .. } => vec![
                "Check the capture device connection",
                "Verify the bus bitrate and port settings",
                "Restart the capture",
            ],
            CaptureError::Config { .. } => vec![
                "Check the configured value is non-zero",
                "Compare against the documented configuration keys",
            ],
            CaptureError::ConfigFile { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            CaptureError::ConfigParse(_) => vec![
                "Check YAML syntax",
                "Remove unrecognized keys",
            ],
            CaptureError::Timeout { .. } => vec![
                "Increase timeout duration",
                "Check backend responsiveness",
            ],
            CaptureError::SessionClosed => vec![
                "Start a new capture session",
            ],
        }
    }

    /// Helper constructor for backend failures.
    pub fn backend_failed(operation: &'static str, reason: impl Into<String>) -> Self {
        CaptureError::Backend { operation, reason: reason.into(), source: None }
    }

    /// Helper constructor for backend failures with source.
    pub fn backend_failed_with_source(
        operation: &'static str,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        CaptureError::Backend { operation, reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for transport failures.
    pub fn transport_failed(reason: impl Into<String>) -> Self {
        CaptureError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors.
    pub fn invalid_config(field: &'static str, details: impl Into<String>) -> Self {
        CaptureError::Config { field, details: details.into() }
    }

    /// Helper constructor for configuration file errors.
    pub fn config_file(path: PathBuf, source: std::io::Error) -> Self {
        CaptureError::ConfigFile { path, source }
    }
}
