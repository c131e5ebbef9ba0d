//! Capture Error Types
//!
//! Two layers: [`BackendError`] carries the backend's own diagnostic text and
//! never leaves the crate's logging path, while [`CaptureError`] is the fixed
//! taxonomy handed back to callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned to callers of the device directory and capture session
///
/// Carries no free text: callers branch on the variant (or its
/// [`code`](CaptureError::code)), and the backend diagnostic is logged where
/// the failure happened.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureError {
    #[error("Audio backend context could not be initialized")]
    ContextInitFailed,

    #[error("No capture device matched the requested name")]
    DeviceNotFound,

    #[error("Capture device could not be initialized")]
    DeviceInitFailed,

    #[error("Capture device initialized but the stream could not start")]
    DeviceStartFailed,

    #[error("Capture devices could not be enumerated")]
    EnumerationFailed,

    #[error("Operation not allowed in the current session state")]
    InvalidState,
}

impl CaptureError {
    /// Stable numeric code for embedding hosts that pass errors across an FFI
    /// or process boundary
    pub fn code(self) -> i32 {
        match self {
            CaptureError::ContextInitFailed => -1,
            CaptureError::DeviceNotFound => -2,
            CaptureError::DeviceInitFailed => -3,
            CaptureError::DeviceStartFailed => -4,
            CaptureError::EnumerationFailed => -5,
            CaptureError::InvalidState => -6,
        }
    }
}

/// Result type alias for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Diagnostic errors reported by an [`AudioBackend`](crate::AudioBackend)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Audio host unavailable: {0}")]
    HostUnavailable(String),

    #[error("Failed to enumerate devices: {0}")]
    Enumeration(String),

    #[error("Device not available: {0}")]
    DeviceUnavailable(String),

    #[error("Failed to build capture stream: {0}")]
    StreamBuild(String),

    #[error("Failed to start capture stream: {0}")]
    StreamPlay(String),

    #[error("Failed to pause capture stream: {0}")]
    StreamPause(String),

    #[error("Capture stream error: {0}")]
    Stream(String),
}
