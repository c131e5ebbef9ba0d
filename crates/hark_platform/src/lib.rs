//! Hark Platform - OS-Specific Capture Helpers
//!
//! This crate provides platform-specific pieces that sit next to the
//! capture core:
//! - Capability queries (does this platform expose monitor/loopback sources
//!   as ordinary capture devices?)
//! - Format descriptor construction for backends that negotiate formats
//!   through explicit objects (PipeWire SPA pods)
//!
//! # Platform Support
//!
//! | Platform | Audio server        | Monitor sources as inputs | Format pods        |
//! |----------|---------------------|---------------------------|--------------------|
//! | Linux    | PipeWire/PulseAudio | Yes                       | Yes (`pipewire`)   |
//! | Windows  | WASAPI              | No (loopback API)         | No                 |
//! | macOS    | CoreAudio           | No (needs virtual device) | No                 |

mod error;
mod format;

#[cfg(target_os = "linux")]
pub mod linux;

pub use error::PlatformError;
pub use format::RawAudioFormat;

/// Check if the current platform lists monitor sources among capture devices
pub fn supports_monitor_sources() -> bool {
    #[cfg(target_os = "linux")]
    {
        true // PulseAudio and pipewire-pulse expose "Monitor of ..." sources
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

/// Check if this build can construct backend format descriptors
pub fn supports_format_descriptors() -> bool {
    #[cfg(target_os = "linux")]
    {
        linux::supports_format_pods()
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}
