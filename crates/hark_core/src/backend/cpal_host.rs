//! CPAL Backend
//!
//! Maps the backend boundary onto cpal: a context is a `cpal::Host`, a device
//! is a built (paused) input stream. CPAL doesn't provide stable device IDs,
//! so identifiers are `"<index>:<name>"` in enumeration order and are checked
//! against the name again when the device is opened.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, SampleFormat, Stream, StreamConfig as CpalStreamConfig};
use tracing::{debug, warn};

use super::{AudioBackend, DataCallback, DeviceRequest, ErrorCallback};
use crate::device::{DeviceDescriptor, DeviceId, NegotiatedFormat};
use crate::error::BackendError;

/// Audio backend built on cpal
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    /// Host to open by name (case-insensitive); `None` = platform default
    host_name: Option<String>,
}

/// Open connection to one cpal host
pub struct CpalContext {
    host: Host,
}

/// Capture stream built on one cpal input device
pub struct CpalDevice {
    /// Held to keep the stream alive; dropping it closes the device
    stream: Stream,
    name: String,
    config: CpalStreamConfig,
}

impl CpalBackend {
    /// Backend using the platform default host
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend using a specific host, e.g. "ALSA" or "JACK"
    pub fn with_host(host_name: impl Into<String>) -> Self {
        Self {
            host_name: Some(host_name.into()),
        }
    }

    /// Names of the hosts compiled into this build
    pub fn available_hosts() -> Vec<&'static str> {
        cpal::available_hosts()
            .into_iter()
            .map(|id| id.name())
            .collect()
    }

    fn format_id(index: usize, name: &str) -> DeviceId {
        DeviceId::new(format!("{}:{}", index, name))
    }

    fn device_name(device: &Device) -> String {
        device.name().unwrap_or_else(|_| "Unknown Device".to_string())
    }

    fn find_device(host: &Host, id: &DeviceId) -> Result<Device, BackendError> {
        let (index, name) = id
            .as_str()
            .split_once(':')
            .and_then(|(index, name)| index.parse::<usize>().ok().map(|i| (i, name)))
            .ok_or_else(|| BackendError::DeviceUnavailable(format!("Malformed device id: {}", id)))?;

        let devices: Vec<Device> = host
            .input_devices()
            .map_err(|e| BackendError::Enumeration(e.to_string()))?
            .collect();

        // Fast path: the list hasn't changed since the id was produced
        if let Some(device) = devices.get(index) {
            if Self::device_name(device) == name {
                return Ok(device.clone());
            }
        }

        devices
            .into_iter()
            .find(|device| Self::device_name(device) == name)
            .ok_or_else(|| BackendError::DeviceUnavailable(format!("Device '{}' disappeared", name)))
    }
}

impl AudioBackend for CpalBackend {
    type Context = CpalContext;
    type Device = CpalDevice;

    fn name(&self) -> &'static str {
        "cpal"
    }

    fn init_context(&self) -> Result<CpalContext, BackendError> {
        let host = match &self.host_name {
            None => cpal::default_host(),
            Some(wanted) => {
                let id = cpal::available_hosts()
                    .into_iter()
                    .find(|id| id.name().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        BackendError::HostUnavailable(format!(
                            "'{}' is not one of {:?}",
                            wanted,
                            Self::available_hosts()
                        ))
                    })?;
                cpal::host_from_id(id).map_err(|e| BackendError::HostUnavailable(e.to_string()))?
            }
        };

        debug!("Opened audio host {}", host.id().name());
        Ok(CpalContext { host })
    }

    fn capture_devices(&self, context: &CpalContext) -> Result<Vec<DeviceDescriptor>, BackendError> {
        let devices = context
            .host
            .input_devices()
            .map_err(|e| BackendError::Enumeration(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| {
                let name = Self::device_name(&device);
                let id = Self::format_id(index, &name);
                DeviceDescriptor::new(name, id)
            })
            .collect())
    }

    fn init_device(
        &self,
        context: &CpalContext,
        request: &DeviceRequest,
        mut on_data: DataCallback,
        mut on_error: ErrorCallback,
    ) -> Result<CpalDevice, BackendError> {
        let device = match &request.device_id {
            Some(id) => Self::find_device(&context.host, id)?,
            None => context.host.default_input_device().ok_or_else(|| {
                BackendError::DeviceUnavailable("No default input device".to_string())
            })?,
        };
        let name = Self::device_name(&device);

        let config = CpalStreamConfig {
            channels: request.channels,
            sample_rate: cpal::SampleRate(request.sample_rate),
            buffer_size: match request.buffer_size {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };

        let channels = request.channels.max(1) as usize;
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    on_data(data, (data.len() / channels) as u32);
                },
                move |err| on_error(BackendError::Stream(err.to_string())),
                None, // No timeout
            )
            .map_err(|e| BackendError::StreamBuild(e.to_string()))?;

        // Some hosts start streams as soon as they are built
        if let Err(e) = stream.pause() {
            warn!("Could not hold '{}' paused until start: {}", name, e);
        }

        Ok(CpalDevice {
            stream,
            name,
            config,
        })
    }

    fn negotiated_format(&self, context: &CpalContext, device: &CpalDevice) -> NegotiatedFormat {
        NegotiatedFormat {
            device_name: device.name.clone(),
            backend: context.host.id().name().to_string(),
            sample_format: SampleFormat::F32,
            channels: device.config.channels,
            sample_rate: device.config.sample_rate.0,
        }
    }

    fn start_device(&self, device: &mut CpalDevice) -> Result<(), BackendError> {
        device
            .stream
            .play()
            .map_err(|e| BackendError::StreamPlay(e.to_string()))
    }

    fn stop_device(&self, device: &mut CpalDevice) -> Result<(), BackendError> {
        device
            .stream
            .pause()
            .map_err(|e| BackendError::StreamPause(e.to_string()))
    }
}
