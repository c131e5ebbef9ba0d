//! Device Directory
//!
//! Lists the capture devices a backend exposes and turns a human-supplied name
//! fragment into a device identifier. Matching is a case-sensitive substring
//! search because backend names often embed volatile suffixes (instance ids,
//! card numbers); when several devices match, the first one in backend
//! enumeration order wins.

use tracing::{debug, error, warn};

use crate::backend::AudioBackend;
use crate::device::{DeviceDescriptor, DeviceId};
use crate::error::{CaptureError, CaptureResult};

/// Device lookup against one backend
pub struct DeviceDirectory<'a, B: AudioBackend> {
    backend: &'a B,
}

impl<'a, B: AudioBackend> DeviceDirectory<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Snapshot of the capture devices visible through `context`
    ///
    /// Zero devices is an empty list, not an error.
    pub fn enumerate(&self, context: &B::Context) -> CaptureResult<Vec<DeviceDescriptor>> {
        self.backend.capture_devices(context).map_err(|e| {
            error!("Device enumeration failed: {}", e);
            CaptureError::EnumerationFailed
        })
    }

    /// Identifier of the first device whose name contains `fragment`
    ///
    /// An empty fragment names no device. Enumeration failures are reported as
    /// `DeviceNotFound` after logging the backend diagnostic.
    pub fn resolve_by_name(&self, context: &B::Context, fragment: &str) -> CaptureResult<DeviceId> {
        if fragment.is_empty() {
            return Err(CaptureError::DeviceNotFound);
        }

        let devices = self
            .enumerate(context)
            .map_err(|_| CaptureError::DeviceNotFound)?;

        match devices.into_iter().find(|d| d.name.contains(fragment)) {
            Some(device) => {
                debug!("Resolved '{}' to device '{}' ({})", fragment, device.name, device.id);
                Ok(device.id)
            }
            None => {
                warn!("No capture device name contains '{}'", fragment);
                Err(CaptureError::DeviceNotFound)
            }
        }
    }

    /// Enumerate capture devices through a context opened just for this call
    pub fn scan_capture_devices(&self) -> CaptureResult<Vec<DeviceDescriptor>> {
        self.with_scoped_context(|context| self.enumerate(context))?
    }

    /// Name of the first monitor/loopback source, cut to at most
    /// `max_name_len` bytes
    ///
    /// Uses a context scoped to this call. Matching is case-insensitive.
    /// A zero-byte limit cannot hold a name and yields `None`.
    pub fn find_monitor_source(&self, max_name_len: usize) -> Option<String> {
        if max_name_len == 0 {
            return None;
        }
        let devices = self.scan_capture_devices().ok()?;
        let monitor = devices.into_iter().find(DeviceDescriptor::is_monitor)?;
        debug!("Found monitor source '{}'", monitor.name);
        Some(truncate_name(&monitor.name, max_name_len).to_string())
    }

    fn with_scoped_context<T>(&self, f: impl FnOnce(&B::Context) -> T) -> CaptureResult<T> {
        let context = self.backend.init_context().map_err(|e| {
            error!("Failed to open {} context: {}", self.backend.name(), e);
            CaptureError::ContextInitFailed
        })?;
        let result = f(&context);
        self.backend.uninit_context(context);
        Ok(result)
    }
}

/// Longest prefix of `name` that fits in `max_len` bytes without splitting a
/// character
pub fn truncate_name(name: &str, max_len: usize) -> &str {
    if name.len() <= max_len {
        return name;
    }
    let mut end = max_len;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
