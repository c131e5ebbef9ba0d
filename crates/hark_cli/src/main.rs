//! Hark - command line front end for the capture core

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hark", version, about = "List capture devices and capture audio")]
struct Cli {
    /// Audio host to use (e.g. ALSA, JACK, WASAPI); defaults to the platform host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List capture devices
    Devices,

    /// Print the first monitor/loopback source
    Monitor {
        /// Truncate the name to this many bytes
        #[arg(long, default_value_t = 256)]
        max_len: usize,
    },

    /// Capture from a device and report frame counts and peak levels
    Capture {
        /// Substring of the device name (case-sensitive); default device if omitted
        #[arg(short, long)]
        device: Option<String>,

        /// Sample rate in Hz
        #[arg(short, long)]
        rate: Option<u32>,

        /// Channel count
        #[arg(short, long)]
        channels: Option<u16>,

        /// Fixed period size in frames; backend default if omitted
        #[arg(short, long)]
        buffer_size: Option<u32>,

        /// How long to capture
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,

        /// Fall back to the default device when --device matches nothing
        #[arg(long)]
        fallback_default: bool,

        /// JSON config file (defaults to the per-user config)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Build the backend format descriptor for a rate/channel pair
    Format {
        #[arg(short, long, default_value_t = 48000)]
        rate: u32,

        #[arg(short, long, default_value_t = 2)]
        channels: u32,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "hark=debug" } else { "hark=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    info!("Starting hark {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Devices => commands::list_devices(cli.host.as_deref()),
        Command::Monitor { max_len } => commands::find_monitor(cli.host.as_deref(), max_len),
        Command::Capture {
            device,
            rate,
            channels,
            buffer_size,
            seconds,
            fallback_default,
            config,
        } => {
            let mut capture = commands::load_config(config.as_deref())?;
            if cli.host.is_some() {
                capture.host = cli.host;
            }
            if device.is_some() {
                capture.device_name = device;
            }
            if let Some(rate) = rate {
                capture.stream.sample_rate = rate;
            }
            if let Some(channels) = channels {
                capture.stream.channels = channels;
            }
            if buffer_size.is_some() {
                capture.stream.buffer_size = buffer_size;
            }
            commands::capture(&capture, seconds, fallback_default)
        }
        Command::Format { rate, channels } => commands::describe_format(rate, channels),
    }
}
