//! Scripted backend for exercising the session without audio hardware
//!
//! Every step can be made to fail, acquisitions and releases are counted, and
//! a started device delivers buffers from its own thread until stopped.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::SampleFormat;
use parking_lot::Mutex;

use super::{AudioBackend, DataCallback, DeviceRequest, ErrorCallback};
use crate::device::{DeviceDescriptor, DeviceId, NegotiatedFormat};
use crate::error::BackendError;

#[derive(Debug, Clone)]
pub(crate) struct Script {
    pub devices: Vec<String>,
    pub fail_context: bool,
    pub fail_enumeration: bool,
    pub fail_init: bool,
    pub fail_start: bool,
    /// Deliver one extra buffer after stop, like a backend racing its own shutdown
    pub late_callback: bool,
    /// Report this stream error from the delivery thread once started
    pub stream_error: Option<String>,
    pub frames_per_buffer: u32,
    pub period: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            devices: vec!["Built-in Microphone".into()],
            fail_context: false,
            fail_enumeration: false,
            fail_init: false,
            fail_start: false,
            late_callback: false,
            stream_error: None,
            frames_per_buffer: 256,
            period: Duration::from_millis(2),
        }
    }
}

/// Counters shared between a mock backend and the test inspecting it
#[derive(Debug, Default)]
pub(crate) struct MockLog {
    pub contexts_opened: AtomicUsize,
    pub contexts_released: AtomicUsize,
    pub devices_opened: AtomicUsize,
    pub devices_released: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub last_request: Mutex<Option<DeviceRequest>>,
    pub releases: Mutex<Vec<&'static str>>,
}

impl MockLog {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockBackend {
    script: Script,
    log: Arc<MockLog>,
}

pub(crate) struct MockContext;

pub(crate) struct MockDevice {
    name: String,
    request: DeviceRequest,
    on_data: Arc<Mutex<DataCallback>>,
    on_error: Arc<Mutex<ErrorCallback>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl MockBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            log: Arc::new(MockLog::default()),
        }
    }

    pub fn with_devices(names: &[&str]) -> Self {
        Self::new(Script {
            devices: names.iter().map(|n| n.to_string()).collect(),
            ..Script::default()
        })
    }

    pub fn log(&self) -> Arc<MockLog> {
        Arc::clone(&self.log)
    }

    fn descriptors(&self) -> Vec<DeviceDescriptor> {
        self.script
            .devices
            .iter()
            .enumerate()
            .map(|(i, name)| DeviceDescriptor::new(name.clone(), DeviceId::new(format!("mock-{}", i))))
            .collect()
    }
}

impl MockDevice {
    fn halt(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.halt();
    }
}

impl AudioBackend for MockBackend {
    type Context = MockContext;
    type Device = MockDevice;

    fn name(&self) -> &'static str {
        "mock"
    }

    fn init_context(&self) -> Result<MockContext, BackendError> {
        if self.script.fail_context {
            return Err(BackendError::HostUnavailable("scripted failure".into()));
        }
        self.log.contexts_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockContext)
    }

    fn uninit_context(&self, _context: MockContext) {
        self.log.contexts_released.fetch_add(1, Ordering::SeqCst);
        self.log.releases.lock().push("context");
    }

    fn capture_devices(&self, _context: &MockContext) -> Result<Vec<DeviceDescriptor>, BackendError> {
        if self.script.fail_enumeration {
            return Err(BackendError::Enumeration("scripted failure".into()));
        }
        Ok(self.descriptors())
    }

    fn init_device(
        &self,
        _context: &MockContext,
        request: &DeviceRequest,
        on_data: DataCallback,
        on_error: ErrorCallback,
    ) -> Result<MockDevice, BackendError> {
        *self.log.last_request.lock() = Some(request.clone());

        if self.script.fail_init {
            return Err(BackendError::StreamBuild("scripted failure".into()));
        }

        let descriptors = self.descriptors();
        let name = match &request.device_id {
            Some(id) => descriptors
                .iter()
                .find(|d| &d.id == id)
                .map(|d| d.name.clone())
                .ok_or_else(|| BackendError::DeviceUnavailable(id.to_string()))?,
            None => descriptors
                .first()
                .map(|d| d.name.clone())
                .ok_or_else(|| BackendError::DeviceUnavailable("no default".into()))?,
        };

        self.log.devices_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockDevice {
            name,
            request: request.clone(),
            on_data: Arc::new(Mutex::new(on_data)),
            on_error: Arc::new(Mutex::new(on_error)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    fn negotiated_format(&self, _context: &MockContext, device: &MockDevice) -> NegotiatedFormat {
        NegotiatedFormat {
            device_name: device.name.clone(),
            backend: "mock".into(),
            sample_format: SampleFormat::F32,
            channels: device.request.channels,
            sample_rate: device.request.sample_rate,
        }
    }

    fn start_device(&self, device: &mut MockDevice) -> Result<(), BackendError> {
        if self.script.fail_start {
            return Err(BackendError::StreamPlay("scripted failure".into()));
        }
        self.log.starts.fetch_add(1, Ordering::SeqCst);

        device.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&device.running);
        let on_data = Arc::clone(&device.on_data);
        let on_error = Arc::clone(&device.on_error);
        let frames = self.script.frames_per_buffer;
        let period = self.script.period;
        let stream_error = self.script.stream_error.clone();
        let buffer = vec![0.25_f32; frames as usize * device.request.channels as usize];

        device.worker = Some(thread::spawn(move || {
            if let Some(message) = stream_error {
                (*on_error.lock())(BackendError::Stream(message));
            }
            while running.load(Ordering::SeqCst) {
                (*on_data.lock())(&buffer, frames);
                thread::sleep(period);
            }
        }));
        Ok(())
    }

    fn stop_device(&self, device: &mut MockDevice) -> Result<(), BackendError> {
        self.log.stops.fetch_add(1, Ordering::SeqCst);
        device.halt();

        if self.script.late_callback {
            let channels = device.request.channels as usize;
            let frames = self.script.frames_per_buffer;
            let buffer = vec![0.5_f32; frames as usize * channels];
            (*device.on_data.lock())(&buffer, frames);
        }
        Ok(())
    }

    fn uninit_device(&self, device: MockDevice) {
        self.log.devices_released.fetch_add(1, Ordering::SeqCst);
        self.log.releases.lock().push("device");
        drop(device);
    }
}
