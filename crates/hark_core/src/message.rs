//! Session Events
//!
//! Events flow from the capture session (and the backend's audio thread) to
//! whoever holds the session's event receiver.

use serde::{Deserialize, Serialize};

/// Events emitted by a capture session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    /// Stream started; the sink will now receive buffers
    Started {
        device_name: String,
        sample_rate: u32,
        channels: u16,
    },

    /// Stream stopped; no further sink calls will happen
    Stopped,

    /// The backend reported an asynchronous stream error (e.g. device unplugged)
    StreamError { message: String },
}

impl Event {
    /// Create an error event from any error type
    pub fn error<E: std::fmt::Display>(err: E) -> Self {
        Event::StreamError {
            message: err.to_string(),
        }
    }
}
