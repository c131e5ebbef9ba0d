//! Hark Core - Audio Capture Device Manager
//!
//! This crate provides:
//! - Capture device enumeration and name lookup (via CPAL)
//! - A capture session that owns one backend context and one device through
//!   an initialize → start → stop → teardown lifecycle
//! - Real-time delivery of captured f32 frames to a caller-supplied sink
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Control Thread                          │
//! │   CaptureSession ──▶ DeviceDirectory ──▶ AudioBackend       │
//! │        ▲   start / stop / teardown           │              │
//! │        └──── crossbeam-channel ◀── events ───┤              │
//! └──────────────────────────────────────────────┼──────────────┘
//!                                                │ owns
//!                                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Backend Audio Thread                        │
//! │   data callback ──▶ SinkGate ──▶ SampleSink (──rtrb──▶ worker)
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod backend;
mod config;
mod device;
mod directory;
mod error;
mod message;
mod session;
mod sink;
mod stream;

pub use backend::{
    AudioBackend, CpalBackend, CpalContext, CpalDevice, DataCallback, DeviceRequest, ErrorCallback,
};
pub use config::{CaptureConfig, StreamConfig};
pub use device::{DeviceDescriptor, DeviceId, NegotiatedFormat};
pub use directory::{truncate_name, DeviceDirectory};
pub use error::{BackendError, CaptureError, CaptureResult};
pub use message::Event;
pub use session::{CaptureSession, SessionPhase};
pub use sink::{QueueSink, SampleQueue, SampleSink};
pub use stream::CallbackStats;
