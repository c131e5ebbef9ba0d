//! Audio Backend Boundary
//!
//! Defines the interface the capture session drives. The backend owns device
//! enumeration, format negotiation and the real-time callback thread; the core
//! only sequences these calls and tracks what it has acquired.

mod cpal_host;

#[cfg(test)]
pub(crate) mod mock;

pub use cpal_host::{CpalBackend, CpalContext, CpalDevice};

use crate::device::{DeviceDescriptor, DeviceId, NegotiatedFormat};
use crate::error::BackendError;

/// Callback invoked on the backend's audio thread with interleaved f32
/// samples and the number of frames they hold
///
/// The slice is only valid for the duration of the call.
pub type DataCallback = Box<dyn FnMut(&[f32], u32) + Send + 'static>;

/// Callback invoked on the backend's audio thread when the stream reports an
/// asynchronous error
pub type ErrorCallback = Box<dyn FnMut(BackendError) + Send + 'static>;

/// Parameters for opening a capture device
///
/// Samples are always requested as interleaved 32-bit floats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    /// Specific device to open; `None` = the backend's default capture device
    pub device_id: Option<DeviceId>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Fixed period size in frames; `None` = backend default
    pub buffer_size: Option<u32>,
}

/// Trait for audio backends that can host a capture session
///
/// Context and device are plain values: releasing one means handing it back
/// to `uninit_context`/`uninit_device`, after which it no longer exists.
pub trait AudioBackend {
    /// Connection to the audio subsystem
    type Context;

    /// One opened capture device bound to a context
    type Device;

    /// Name of this backend (e.g., "cpal")
    fn name(&self) -> &'static str;

    /// Acquire a backend context
    fn init_context(&self) -> Result<Self::Context, BackendError>;

    /// Release a backend context
    fn uninit_context(&self, context: Self::Context) {
        drop(context);
    }

    /// List capture-capable devices in backend enumeration order
    fn capture_devices(&self, context: &Self::Context)
        -> Result<Vec<DeviceDescriptor>, BackendError>;

    /// Open a capture device; the stream must not deliver data until
    /// `start_device` is called
    fn init_device(
        &self,
        context: &Self::Context,
        request: &DeviceRequest,
        on_data: DataCallback,
        on_error: ErrorCallback,
    ) -> Result<Self::Device, BackendError>;

    /// Format the device was actually opened with
    fn negotiated_format(&self, context: &Self::Context, device: &Self::Device) -> NegotiatedFormat;

    /// Begin delivering data to the device's callback
    fn start_device(&self, device: &mut Self::Device) -> Result<(), BackendError>;

    /// Halt data delivery
    fn stop_device(&self, device: &mut Self::Device) -> Result<(), BackendError>;

    /// Release a device
    fn uninit_device(&self, device: Self::Device) {
        drop(device);
    }
}
