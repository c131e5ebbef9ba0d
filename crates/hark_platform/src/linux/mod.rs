//! Linux Platform Support - PipeWire
//!
//! PipeWire streams negotiate their format through SPA pods passed to
//! `Stream::connect`. [`build_audio_format_pod`] produces the `EnumFormat`
//! pod for a [`RawAudioFormat`](crate::RawAudioFormat) inside a caller-owned
//! buffer.

#[cfg(feature = "pipewire")]
mod spa_format;

#[cfg(feature = "pipewire")]
pub use spa_format::build_audio_format_pod;

/// Whether format pods can be built in this build
pub fn supports_format_pods() -> bool {
    cfg!(feature = "pipewire")
}
