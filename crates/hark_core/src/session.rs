//! Capture Session - lifecycle of one capture stream
//!
//! The session owns one backend context and at most one device, and moves
//! them through:
//!
//! ```text
//!   Idle ──▶ ContextReady ──▶ DeviceReady ──▶ Started ──▶ Stopped
//!    ▲            │                │             │           │
//!    └────────────┴── teardown ────┴─────────────┴───────────┘
//! ```
//!
//! Each state variant owns exactly the resources acquired so far, so a failed
//! `start` leaves whatever it did acquire in the session until `teardown`
//! (or drop) releases it: device first, then context.
//!
//! The session spawns no threads. The sink runs on the backend's audio thread;
//! `stop` and `teardown` close the sink gate before touching the stream, so
//! once they return the sink will not be called again.

use std::mem;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::backend::{AudioBackend, CpalBackend, DeviceRequest};
use crate::config::CaptureConfig;
use crate::device::{DeviceDescriptor, DeviceId, NegotiatedFormat};
use crate::directory::DeviceDirectory;
use crate::error::{CaptureError, CaptureResult};
use crate::message::Event;
use crate::sink::SampleSink;
use crate::stream::{self, CallbackStats, SinkGate};

/// Capacity of the session event channel; the audio thread drops events
/// rather than block when it is full
const EVENT_CAPACITY: usize = 64;

/// Observable lifecycle phase of a [`CaptureSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    ContextReady,
    DeviceReady,
    Started,
    Stopped,
}

enum SessionState<B: AudioBackend> {
    Idle,
    ContextReady {
        context: B::Context,
    },
    DeviceReady {
        context: B::Context,
        device: B::Device,
    },
    Started {
        context: B::Context,
        device: B::Device,
    },
    Stopped {
        context: B::Context,
        device: B::Device,
    },
}

impl<B: AudioBackend> SessionState<B> {
    fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::ContextReady { .. } => SessionPhase::ContextReady,
            SessionState::DeviceReady { .. } => SessionPhase::DeviceReady,
            SessionState::Started { .. } => SessionPhase::Started,
            SessionState::Stopped { .. } => SessionPhase::Stopped,
        }
    }

    fn context(&self) -> Option<&B::Context> {
        match self {
            SessionState::Idle => None,
            SessionState::ContextReady { context }
            | SessionState::DeviceReady { context, .. }
            | SessionState::Started { context, .. }
            | SessionState::Stopped { context, .. } => Some(context),
        }
    }
}

/// One managed capture stream
pub struct CaptureSession<B: AudioBackend> {
    backend: B,
    state: SessionState<B>,

    /// Gate shared with the backend callback of the current device
    gate: Option<Arc<SinkGate>>,

    /// Format the current device was opened with
    format: Option<NegotiatedFormat>,

    event_sender: Sender<Event>,
    event_receiver: Receiver<Event>,
}

impl CaptureSession<CpalBackend> {
    /// Session on the cpal host named in `config`, or the platform default
    pub fn for_config(config: &CaptureConfig) -> Self {
        let backend = match &config.host {
            Some(host) => CpalBackend::with_host(host.clone()),
            None => CpalBackend::new(),
        };
        Self::new(backend)
    }
}

impl<B: AudioBackend> CaptureSession<B> {
    /// Create an idle session; nothing is acquired until `start`
    pub fn new(backend: B) -> Self {
        let (event_sender, event_receiver) = bounded(EVENT_CAPACITY);
        Self {
            backend,
            state: SessionState::Idle,
            gate: None,
            format: None,
            event_sender,
            event_receiver,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn is_started(&self) -> bool {
        self.phase() == SessionPhase::Started
    }

    /// Callback counters for the current device
    pub fn stats(&self) -> CallbackStats {
        self.gate.as_ref().map(|g| g.stats()).unwrap_or_default()
    }

    /// Format negotiated when the device was initialized
    pub fn device_format(&self) -> Option<&NegotiatedFormat> {
        self.format.as_ref()
    }

    /// Session events: started/stopped transitions and backend stream errors
    pub fn events(&self) -> &Receiver<Event> {
        &self.event_receiver
    }

    /// Capture devices, listed through the session's context when it holds
    /// one and through a short-lived context otherwise
    pub fn devices(&self) -> CaptureResult<Vec<DeviceDescriptor>> {
        let directory = DeviceDirectory::new(&self.backend);
        match self.state.context() {
            Some(context) => directory.enumerate(context),
            None => directory.scan_capture_devices(),
        }
    }

    /// Open the configured device and start delivering buffers to `sink`
    ///
    /// Only legal from `Idle`. On failure the session keeps whatever it
    /// acquired (see the module docs); call `teardown` before retrying.
    pub fn start<S: SampleSink>(&mut self, config: &CaptureConfig, sink: S) -> CaptureResult<()> {
        if !matches!(self.state, SessionState::Idle) {
            warn!("start() called in {:?} phase", self.phase());
            return Err(CaptureError::InvalidState);
        }

        let context = self.backend.init_context().map_err(|e| {
            error!("Audio context init failed: {}", e);
            CaptureError::ContextInitFailed
        })?;
        debug!("{} context initialized", self.backend.name());

        let device_id = match self.resolve_device(&context, config) {
            Ok(id) => id,
            Err(e) => {
                self.state = SessionState::ContextReady { context };
                return Err(e);
            }
        };

        if let Err(msg) = config.stream.validate() {
            error!("Capture device init failed: {}", msg);
            self.state = SessionState::ContextReady { context };
            return Err(CaptureError::DeviceInitFailed);
        }

        let request = DeviceRequest {
            device_id,
            sample_rate: config.stream.sample_rate,
            channels: config.stream.channels,
            buffer_size: config.stream.buffer_size,
        };
        let gate = Arc::new(SinkGate::new(Box::new(sink)));

        let mut device = match self.backend.init_device(
            &context,
            &request,
            stream::data_callback(&gate),
            stream::error_callback(self.event_sender.clone()),
        ) {
            Ok(device) => device,
            Err(e) => {
                error!("Capture device init failed: {}", e);
                self.state = SessionState::ContextReady { context };
                return Err(CaptureError::DeviceInitFailed);
            }
        };

        let format = self.backend.negotiated_format(&context, &device);
        info!("Capture device {} initialized", format);
        self.gate = Some(Arc::clone(&gate));

        if let Err(e) = self.backend.start_device(&mut device) {
            error!("Capture device start failed: {}", e);
            self.format = Some(format);
            self.state = SessionState::DeviceReady { context, device };
            return Err(CaptureError::DeviceStartFailed);
        }

        gate.open();
        let _ = self.event_sender.try_send(Event::Started {
            device_name: format.device_name.clone(),
            sample_rate: format.sample_rate,
            channels: format.channels,
        });
        self.format = Some(format);
        self.state = SessionState::Started { context, device };
        info!("Capture started");
        Ok(())
    }

    /// Halt the stream, keeping device and context for teardown
    ///
    /// A no-op outside `Started`. Returns once no sink call is running and
    /// none will follow.
    pub fn stop(&mut self) {
        self.state = match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Started { context, mut device } => {
                self.close_gate();
                if let Err(e) = self.backend.stop_device(&mut device) {
                    warn!("Capture device stop reported: {}", e);
                }
                let _ = self.event_sender.try_send(Event::Stopped);
                info!("Capture stopped");
                SessionState::Stopped { context, device }
            }
            other => {
                debug!("stop() ignored in {:?} phase", other.phase());
                other
            }
        };
    }

    /// Release the device (if held) and then the context (if held)
    ///
    /// Legal in any phase and idempotent; the session ends `Idle`.
    pub fn teardown(&mut self) {
        self.close_gate();

        match mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Idle => return,
            SessionState::ContextReady { context } => {
                self.backend.uninit_context(context);
            }
            SessionState::Started {
                context,
                mut device,
            } => {
                if let Err(e) = self.backend.stop_device(&mut device) {
                    warn!("Capture device stop reported: {}", e);
                }
                let _ = self.event_sender.try_send(Event::Stopped);
                self.backend.uninit_device(device);
                self.backend.uninit_context(context);
            }
            SessionState::DeviceReady { context, device }
            | SessionState::Stopped { context, device } => {
                self.backend.uninit_device(device);
                self.backend.uninit_context(context);
            }
        }

        self.gate = None;
        self.format = None;
        debug!("Capture session torn down");
    }

    fn resolve_device(
        &self,
        context: &B::Context,
        config: &CaptureConfig,
    ) -> CaptureResult<Option<DeviceId>> {
        match config.device_fragment() {
            Some(fragment) => DeviceDirectory::new(&self.backend)
                .resolve_by_name(context, fragment)
                .map(Some),
            None => Ok(None),
        }
    }

    fn close_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.close();
        }
    }
}

impl<B: AudioBackend> Drop for CaptureSession<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::backend::mock::{MockBackend, MockLog, Script};
    use crate::config::StreamConfig;

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn frame_counter() -> (Arc<AtomicU64>, impl SampleSink) {
        let frames = Arc::new(AtomicU64::new(0));
        let sink_frames = Arc::clone(&frames);
        let sink = move |_: &[f32], n: u32| {
            sink_frames.fetch_add(u64::from(n), Ordering::SeqCst);
        };
        (frames, sink)
    }

    fn session_with(script: Script) -> (CaptureSession<MockBackend>, Arc<MockLog>) {
        let backend = MockBackend::new(script);
        let log = backend.log();
        (CaptureSession::new(backend), log)
    }

    #[test]
    fn test_teardown_before_start_is_noop() {
        let (mut session, log) = session_with(Script::default());
        session.teardown();
        session.teardown();

        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(MockLog::count(&log.contexts_opened), 0);
        assert_eq!(MockLog::count(&log.contexts_released), 0);
        assert_eq!(MockLog::count(&log.devices_released), 0);
    }

    #[test]
    fn test_context_init_failure_holds_nothing() {
        let (mut session, log) = session_with(Script {
            fail_context: true,
            ..Script::default()
        });
        let (_, sink) = frame_counter();

        let result = session.start(&CaptureConfig::new(48000, 2), sink);
        assert_eq!(result, Err(CaptureError::ContextInitFailed));
        assert_eq!(session.phase(), SessionPhase::Idle);

        session.teardown();
        assert_eq!(MockLog::count(&log.devices_opened), 0);
        assert!(log.releases.lock().is_empty());
    }

    #[test]
    fn test_device_not_found_keeps_context_only() {
        let (mut session, log) = session_with(Script::default());
        let (_, sink) = frame_counter();

        let config = CaptureConfig::new(48000, 2).with_device("monitor");
        assert_eq!(session.start(&config, sink), Err(CaptureError::DeviceNotFound));
        assert_eq!(session.phase(), SessionPhase::ContextReady);
        assert_eq!(MockLog::count(&log.contexts_released), 0);

        session.teardown();
        assert_eq!(*log.releases.lock(), vec!["context"]);
        assert_eq!(MockLog::count(&log.devices_opened), 0);
    }

    #[test]
    fn test_device_init_failure_keeps_context_only() {
        let (mut session, log) = session_with(Script {
            fail_init: true,
            ..Script::default()
        });
        let (_, sink) = frame_counter();

        assert_eq!(
            session.start(&CaptureConfig::new(48000, 2), sink),
            Err(CaptureError::DeviceInitFailed)
        );
        assert_eq!(session.phase(), SessionPhase::ContextReady);

        session.teardown();
        assert_eq!(*log.releases.lock(), vec!["context"]);
    }

    #[test]
    fn test_invalid_stream_config_is_device_init_failure() {
        let (mut session, log) = session_with(Script::default());
        let (_, sink) = frame_counter();
        let config = CaptureConfig {
            stream: StreamConfig {
                channels: 0,
                ..StreamConfig::default()
            },
            ..CaptureConfig::default()
        };

        assert_eq!(session.start(&config, sink), Err(CaptureError::DeviceInitFailed));
        assert!(log.last_request.lock().is_none(), "backend should not be asked");
        session.teardown();
        assert_eq!(*log.releases.lock(), vec!["context"]);
    }

    #[test]
    fn test_device_start_failure_keeps_device_and_context() {
        let (mut session, log) = session_with(Script {
            fail_start: true,
            ..Script::default()
        });
        let (frames, sink) = frame_counter();

        assert_eq!(
            session.start(&CaptureConfig::new(48000, 2), sink),
            Err(CaptureError::DeviceStartFailed)
        );
        assert_eq!(session.phase(), SessionPhase::DeviceReady);
        assert!(session.device_format().is_some());

        session.teardown();
        assert_eq!(*log.releases.lock(), vec!["device", "context"]);
        assert_eq!(frames.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let (mut session, log) = session_with(Script::default());
        let (_, sink) = frame_counter();
        let (_, second) = frame_counter();
        let config = CaptureConfig::new(48000, 2);

        session.start(&config, sink).unwrap();
        assert_eq!(session.start(&config, second), Err(CaptureError::InvalidState));
        assert_eq!(session.phase(), SessionPhase::Started);
        assert_eq!(MockLog::count(&log.contexts_opened), 1);
    }

    #[test]
    fn test_capture_end_to_end() {
        let (mut session, log) = session_with(Script::default());
        let (frames, sink) = frame_counter();

        session.start(&CaptureConfig::new(48000, 2), sink).unwrap();
        assert!(session.is_started());
        assert!(wait_until(|| frames.load(Ordering::SeqCst) > 0));

        session.stop();
        assert_eq!(session.phase(), SessionPhase::Stopped);
        let after_stop = frames.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(frames.load(Ordering::SeqCst), after_stop);

        session.teardown();
        assert_eq!(frames.load(Ordering::SeqCst), after_stop);
        assert_eq!(*log.releases.lock(), vec!["device", "context"]);
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_no_sink_call_after_stop_even_if_backend_calls_late() {
        let (mut session, _log) = session_with(Script {
            late_callback: true,
            ..Script::default()
        });
        let (frames, sink) = frame_counter();

        session.start(&CaptureConfig::new(48000, 2), sink).unwrap();
        assert!(wait_until(|| frames.load(Ordering::SeqCst) > 0));
        session.stop();

        let after_stop = frames.load(Ordering::SeqCst);
        let stats = session.stats();
        assert!(stats.gated_buffers >= 1);
        assert_eq!(stats.delivered_frames, after_stop);
        session.teardown();
        assert_eq!(frames.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_stop_twice_is_harmless() {
        let (mut session, log) = session_with(Script::default());
        let (_, sink) = frame_counter();

        session.start(&CaptureConfig::new(48000, 2), sink).unwrap();
        session.stop();
        session.stop();

        assert_eq!(session.phase(), SessionPhase::Stopped);
        assert_eq!(MockLog::count(&log.stops), 1);
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let (mut session, log) = session_with(Script::default());
        session.stop();
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(MockLog::count(&log.stops), 0);
    }

    #[test]
    fn test_stop_after_start_failure_is_noop() {
        let (mut session, log) = session_with(Script {
            fail_start: true,
            ..Script::default()
        });
        let (_, sink) = frame_counter();
        assert_eq!(
            session.start(&CaptureConfig::new(48000, 2), sink),
            Err(CaptureError::DeviceStartFailed)
        );

        session.stop();
        assert_eq!(session.phase(), SessionPhase::DeviceReady);
        assert_eq!(MockLog::count(&log.stops), 0);
        assert!(log.releases.lock().is_empty());
        assert!(session.events().try_iter().all(|e| e != Event::Stopped));
    }

    #[test]
    fn test_named_device_is_requested() {
        let backend = MockBackend::with_devices(&[
            "Built-in Microphone",
            "Monitor Source of Speakers (alsa_output.analog-stereo.monitor)",
        ]);
        let log = backend.log();
        let mut session = CaptureSession::new(backend);
        let (_, sink) = frame_counter();

        let config = CaptureConfig::new(44100, 1).with_device("monitor");
        session.start(&config, sink).unwrap();

        let request = log.last_request.lock().clone().unwrap();
        assert_eq!(request.device_id, Some(DeviceId::new("mock-1")));
        assert_eq!(request.sample_rate, 44100);
        assert_eq!(request.channels, 1);

        let format = session.device_format().unwrap();
        assert!(format.device_name.starts_with("Monitor Source"));
        assert_eq!(format.sample_format, cpal::SampleFormat::F32);
    }

    #[test]
    fn test_default_device_when_no_name() {
        let (mut session, log) = session_with(Script::default());
        let (_, sink) = frame_counter();
        session.start(&CaptureConfig::new(48000, 2).with_device(""), sink).unwrap();

        let request = log.last_request.lock().clone().unwrap();
        assert_eq!(request.device_id, None);
    }

    #[test]
    fn test_events_follow_lifecycle() {
        let (mut session, _log) = session_with(Script::default());
        let (_, sink) = frame_counter();

        session.start(&CaptureConfig::new(48000, 2), sink).unwrap();
        session.stop();

        let events: Vec<Event> = session.events().try_iter().collect();
        assert!(matches!(events[0], Event::Started { sample_rate: 48000, channels: 2, .. }));
        assert_eq!(events[1], Event::Stopped);
    }

    #[test]
    fn test_stream_error_reaches_event_channel() {
        let (mut session, _log) = session_with(Script {
            stream_error: Some("device unplugged".into()),
            ..Script::default()
        });
        let (_, sink) = frame_counter();
        session.start(&CaptureConfig::new(48000, 2), sink).unwrap();

        let found = wait_until(|| {
            session
                .events()
                .try_iter()
                .any(|e| matches!(e, Event::StreamError { ref message } if message.contains("unplugged")))
        });
        assert!(found);
    }

    #[test]
    fn test_drop_releases_resources() {
        let backend = MockBackend::default();
        let log = backend.log();
        {
            let mut session = CaptureSession::new(backend);
            let (_, sink) = frame_counter();
            session.start(&CaptureConfig::new(48000, 2), sink).unwrap();
        }
        assert_eq!(*log.releases.lock(), vec!["device", "context"]);
    }

    #[test]
    fn test_restart_after_teardown() {
        let (mut session, log) = session_with(Script::default());
        let config = CaptureConfig::new(48000, 2);

        let (_, sink) = frame_counter();
        session.start(&config, sink).unwrap();
        session.teardown();

        let (frames, sink) = frame_counter();
        session.start(&config, sink).unwrap();
        assert!(wait_until(|| frames.load(Ordering::SeqCst) > 0));
        session.teardown();

        assert_eq!(MockLog::count(&log.contexts_opened), 2);
        assert_eq!(MockLog::count(&log.contexts_released), 2);
    }

    #[test]
    fn test_devices_uses_held_context() {
        let (mut session, log) = session_with(Script::default());
        let (_, sink) = frame_counter();
        session.start(&CaptureConfig::new(48000, 2), sink).unwrap();

        let devices = session.devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(MockLog::count(&log.contexts_opened), 1);
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_cpal_default_device_capture() {
        let config = CaptureConfig::new(48000, 2);
        let mut session = CaptureSession::for_config(&config);
        let (frames, sink) = frame_counter();

        if session.start(&config, sink).is_ok() {
            assert!(wait_until(|| frames.load(Ordering::SeqCst) > 0));
            session.stop();
            let after_stop = frames.load(Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            assert_eq!(frames.load(Ordering::SeqCst), after_stop);
        }
        session.teardown();
    }
}
