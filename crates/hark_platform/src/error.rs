//! Platform Error Types

use thiserror::Error;

/// Errors from platform-specific operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("Format descriptor does not fit in a {capacity}-byte buffer")]
    BufferTooSmall { capacity: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
