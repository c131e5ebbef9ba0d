//! Callback Bridge
//!
//! Glue between the backend's real-time thread and the caller's sink.
//!
//! ```text
//!   backend thread                      control thread
//!   ──────────────                      ──────────────
//!   on_data(samples, frames)            stop()
//!     open? ──no──▶ return                close(): open = false
//!     lock sink                                  lock sink  ◀── waits for
//!     open? ──no──▶ return                       unlock         in-flight call
//!     sink.on_samples(..)                 backend stop
//!     unlock
//! ```
//!
//! Once `close()` returns, no sink call is in progress and none will start.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use tracing::debug;

use crate::backend::{DataCallback, ErrorCallback};
use crate::message::Event;
use crate::sink::SampleSink;

/// Per-session callback counters
///
/// Lives with the session rather than in a process-wide static so concurrent
/// sessions stay independent.
#[derive(Debug, Default)]
pub struct CallbackCounters {
    callbacks: AtomicU64,
    delivered_buffers: AtomicU64,
    delivered_frames: AtomicU64,
    gated_buffers: AtomicU64,
}

/// Snapshot of [`CallbackCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallbackStats {
    /// Every invocation of the bridging callback by the backend
    pub callbacks: u64,
    /// Buffers handed to the sink
    pub delivered_buffers: u64,
    /// Frames handed to the sink
    pub delivered_frames: u64,
    /// Buffers discarded because the gate was closed
    pub gated_buffers: u64,
}

impl CallbackCounters {
    pub fn snapshot(&self) -> CallbackStats {
        CallbackStats {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            delivered_buffers: self.delivered_buffers.load(Ordering::Relaxed),
            delivered_frames: self.delivered_frames.load(Ordering::Relaxed),
            gated_buffers: self.gated_buffers.load(Ordering::Relaxed),
        }
    }
}

/// Shared state between the bridging callback and the control thread
pub struct SinkGate {
    open: AtomicBool,
    sink: Mutex<Box<dyn SampleSink>>,
    counters: CallbackCounters,
}

impl SinkGate {
    /// Create a closed gate around `sink`
    pub fn new(sink: Box<dyn SampleSink>) -> Self {
        Self {
            open: AtomicBool::new(false),
            sink: Mutex::new(sink),
            counters: CallbackCounters::default(),
        }
    }

    /// Let buffers through to the sink
    pub fn open(&self) {
        self.open.store(true, Ordering::Release);
    }

    /// Stop forwarding and wait out any sink call already in progress
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
        drop(self.sink.lock());
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> CallbackStats {
        self.counters.snapshot()
    }

    /// Forward one backend buffer; called on the audio thread
    pub fn deliver(&self, samples: &[f32], frame_count: u32) {
        let call = self.counters.callbacks.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.is_open() {
            self.counters.gated_buffers.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut sink = self.sink.lock();
        // Re-check under the lock: close() may have run while we waited
        if !self.is_open() {
            self.counters.gated_buffers.fetch_add(1, Ordering::Relaxed);
            return;
        }
        sink.on_samples(samples, frame_count);

        let delivered = self.counters.delivered_buffers.fetch_add(1, Ordering::Relaxed) + 1;
        self.counters
            .delivered_frames
            .fetch_add(u64::from(frame_count), Ordering::Relaxed);

        if delivered == 1 || delivered == 100 {
            debug!(
                "Capture callback delivered buffer (count={}, callbacks={}, frames={})",
                delivered, call, frame_count
            );
        }
    }
}

/// Build the data callback registered with the backend
pub fn data_callback(gate: &Arc<SinkGate>) -> DataCallback {
    let gate = Arc::clone(gate);
    Box::new(move |samples: &[f32], frame_count: u32| gate.deliver(samples, frame_count))
}

/// Build the error callback registered with the backend
///
/// Runs on the audio thread, so it never blocks: events are dropped if the
/// channel is gone.
pub fn error_callback(events: Sender<Event>) -> ErrorCallback {
    Box::new(move |err| {
        let _ = events.try_send(Event::error(err));
    })
}
