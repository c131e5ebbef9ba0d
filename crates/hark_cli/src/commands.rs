//! Subcommand implementations

use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use hark_core::{
    CaptureConfig, CaptureError, CaptureSession, CpalBackend, DeviceDirectory, Event, SampleSink,
};
use hark_platform::RawAudioFormat;
use tracing::{error, info, warn};

fn backend_for(host: Option<&str>) -> CpalBackend {
    match host {
        Some(host) => CpalBackend::with_host(host),
        None => CpalBackend::new(),
    }
}

pub fn list_devices(host: Option<&str>) -> Result<()> {
    let backend = backend_for(host);
    let devices = DeviceDirectory::new(&backend)
        .scan_capture_devices()
        .context("listing capture devices")?;

    if devices.is_empty() {
        println!("No capture devices found");
        return Ok(());
    }
    for device in devices {
        let tag = if device.is_monitor() { " [monitor]" } else { "" };
        println!("{:<40} {}{}", device.id, device.name, tag);
    }
    Ok(())
}

pub fn find_monitor(host: Option<&str>, max_len: usize) -> Result<()> {
    if !hark_platform::supports_monitor_sources() {
        warn!("This platform does not usually expose monitor sources as capture devices");
    }

    let backend = backend_for(host);
    match DeviceDirectory::new(&backend).find_monitor_source(max_len) {
        Some(name) => {
            println!("{}", name);
            Ok(())
        }
        None => bail!("no monitor source found"),
    }
}

pub fn load_config(path: Option<&Path>) -> Result<CaptureConfig> {
    match path {
        Some(path) => CaptureConfig::load_from(path)
            .with_context(|| format!("reading config {}", path.display())),
        None => Ok(CaptureConfig::load()),
    }
}

/// Frame counter and peak meter shared between the sink and the main thread
#[derive(Default)]
struct CaptureMeter {
    frames: AtomicU64,
    /// Peak since last read (stored as u32, interpreted as f32 bits)
    peak_bits: AtomicU32,
}

impl CaptureMeter {
    fn record(&self, samples: &[f32], frame_count: u32) {
        self.frames
            .fetch_add(u64::from(frame_count), Ordering::Relaxed);
        let peak = samples.iter().fold(0.0_f32, |p, s| p.max(s.abs()));
        let previous = f32::from_bits(self.peak_bits.load(Ordering::Relaxed));
        if peak > previous {
            self.peak_bits.store(peak.to_bits(), Ordering::Relaxed);
        }
    }

    fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    fn take_peak(&self) -> f32 {
        f32::from_bits(self.peak_bits.swap(0.0_f32.to_bits(), Ordering::Relaxed))
    }
}

fn meter_sink(meter: &Arc<CaptureMeter>) -> impl SampleSink {
    let meter = Arc::clone(meter);
    move |samples: &[f32], frame_count: u32| meter.record(samples, frame_count)
}

fn start_session(
    config: &CaptureConfig,
    meter: &Arc<CaptureMeter>,
    fallback_default: bool,
) -> Result<CaptureSession<CpalBackend>> {
    let mut session = CaptureSession::for_config(config);
    match session.start(config, meter_sink(meter)) {
        Ok(()) => Ok(session),
        Err(CaptureError::DeviceNotFound) if fallback_default => {
            warn!(
                "No device matched {:?}, falling back to the default device",
                config.device_name
            );
            session.teardown();
            let default = CaptureConfig {
                device_name: None,
                ..config.clone()
            };
            session
                .start(&default, meter_sink(meter))
                .context("starting capture on the default device")?;
            Ok(session)
        }
        Err(e) => {
            session.teardown();
            Err(e).with_context(|| format!("starting capture (code {})", e.code()))
        }
    }
}

pub fn capture(config: &CaptureConfig, seconds: u64, fallback_default: bool) -> Result<()> {
    let meter = Arc::new(CaptureMeter::default());
    let mut session = start_session(config, &meter, fallback_default)?;

    if let Some(format) = session.device_format() {
        info!("Capturing from {}", format);
    }
    if let Some(latency) = config.stream.latency_ms() {
        info!(
            "Requested period: {} frames ({:.2} ms)",
            config.stream.buffer_size.unwrap_or_default(),
            latency
        );
    }

    let mut last_frames = 0;
    for second in 1..=seconds {
        thread::sleep(Duration::from_secs(1));

        for event in session.events().try_iter() {
            match event {
                Event::StreamError { message } => error!("Stream error: {}", message),
                other => info!("Event: {:?}", other),
            }
        }

        let frames = meter.frames();
        println!(
            "{:>4}s  {:>8} frames/s  peak {:.3}",
            second,
            frames - last_frames,
            meter.take_peak()
        );
        last_frames = frames;
    }

    session.stop();
    let stats = session.stats();
    info!(
        "Captured {} frames in {} buffers ({} callbacks)",
        stats.delivered_frames, stats.delivered_buffers, stats.callbacks
    );
    session.teardown();
    Ok(())
}

pub fn describe_format(rate: u32, channels: u32) -> Result<()> {
    let format = RawAudioFormat::f32_interleaved(rate, channels);
    format.validate()?;

    #[cfg(all(target_os = "linux", feature = "pipewire"))]
    {
        let mut buffer = [0u8; 1024];
        let pod = hark_platform::linux::build_audio_format_pod(&mut buffer, &format)?;
        println!("SPA EnumFormat pod: {} bytes (F32LE, {} Hz, {} ch)", pod.size(), rate, channels);
        Ok(())
    }

    #[cfg(not(all(target_os = "linux", feature = "pipewire")))]
    {
        if !hark_platform::supports_format_descriptors() {
            info!("Format descriptors are not built on this platform/build; showing raw format");
        }
        println!("{}", serde_json::to_string_pretty(&format)?);
        Ok(())
    }
}
