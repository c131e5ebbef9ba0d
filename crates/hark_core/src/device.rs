//! Capture Device Descriptors

use std::fmt;

use cpal::SampleFormat;
use serde::{Deserialize, Serialize};

/// Opaque backend identifier used to request one specific device
///
/// Only meaningful to the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One enumerated capture device, copied out of a single enumeration call
///
/// Names are backend-assigned and neither unique nor stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Human-readable device name
    pub name: String,

    /// Identifier to hand back to the backend when opening this device
    pub id: DeviceId,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, id: DeviceId) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }

    /// Whether this looks like a monitor/loopback source of an output device
    pub fn is_monitor(&self) -> bool {
        self.name.to_lowercase().contains("monitor")
    }
}

/// Format the backend actually opened the device with
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiatedFormat {
    pub device_name: String,
    pub backend: String,
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
}

impl fmt::Display for NegotiatedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' (backend={}, format={}, channels={}, sampleRate={})",
            self.device_name, self.backend, self.sample_format, self.channels, self.sample_rate
        )
    }
}
