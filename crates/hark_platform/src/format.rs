//! Raw Audio Format Description
//!
//! Backends that negotiate formats through explicit descriptor objects (the
//! PipeWire SPA pods in [`crate::linux`]) are fed from this description;
//! backends that take flat parameters never need it.

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// Interleaved 32-bit float audio at a given rate and channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAudioFormat {
    pub sample_rate: u32,
    pub channels: u32,
}

impl RawAudioFormat {
    pub fn f32_interleaved(sample_rate: u32, channels: u32) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn validate(&self) -> Result<(), PlatformError> {
        if self.sample_rate == 0 {
            return Err(PlatformError::InvalidConfiguration(
                "sample rate must be positive".into(),
            ));
        }
        // SPA_AUDIO_MAX_CHANNELS
        if self.channels == 0 || self.channels > 64 {
            return Err(PlatformError::InvalidConfiguration(format!(
                "invalid channel count: {}",
                self.channels
            )));
        }
        Ok(())
    }
}
