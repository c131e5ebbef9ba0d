//! Sample Sinks
//!
//! A sink receives every captured buffer on the backend's audio thread. The
//! sample slice is borrowed for the duration of one call only; sinks that need
//! the data later must copy it out, e.g. through [`QueueSink`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

/// Consumer of captured audio
///
/// `samples` holds `frame_count * channels` interleaved f32 values.
/// Implementations run on a real-time thread: no blocking, ideally no
/// allocation.
pub trait SampleSink: Send + 'static {
    fn on_samples(&mut self, samples: &[f32], frame_count: u32);
}

impl<F> SampleSink for F
where
    F: FnMut(&[f32], u32) + Send + 'static,
{
    fn on_samples(&mut self, samples: &[f32], frame_count: u32) {
        self(samples, frame_count)
    }
}

/// Sink that copies samples into a bounded lock-free queue for a worker
/// thread to consume
pub struct QueueSink {
    producer: Producer<f32>,
    dropped: Arc<AtomicU64>,
}

/// Worker side of a [`QueueSink`]
pub struct SampleQueue {
    consumer: Consumer<f32>,
    dropped: Arc<AtomicU64>,
}

impl QueueSink {
    /// Create a sink/queue pair holding up to `capacity` samples
    pub fn with_capacity(capacity: usize) -> (QueueSink, SampleQueue) {
        let (producer, consumer) = RingBuffer::<f32>::new(capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        (
            QueueSink {
                producer,
                dropped: Arc::clone(&dropped),
            },
            SampleQueue { consumer, dropped },
        )
    }
}

impl SampleSink for QueueSink {
    fn on_samples(&mut self, samples: &[f32], frame_count: u32) {
        if frame_count == 0 {
            return;
        }
        let channels = (samples.len() / frame_count as usize).max(1);

        // Whole frames only, so the consumer stays channel-aligned
        let free = self.producer.slots().min(samples.len());
        let to_write = free - free % channels;
        let written = self
            .producer
            .write_chunk_uninit(to_write)
            .map_or(0, |chunk| chunk.fill_from_iter(samples.iter().copied()));

        if written < samples.len() {
            // Worker isn't keeping up - drop the trailing frames rather than block
            self.dropped
                .fetch_add((samples.len() - written) as u64, Ordering::Relaxed);
        }
    }
}

impl SampleQueue {
    /// Samples ready to be read
    pub fn available(&self) -> usize {
        self.consumer.slots()
    }

    /// Samples discarded because the queue was full
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Whether the sink side is gone (its session was torn down)
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }

    /// Copy up to `out.len()` samples into `out`, returning how many were read
    pub fn pop_into(&mut self, out: &mut [f32]) -> usize {
        let to_read = out.len().min(self.consumer.slots());
        match self.consumer.read_chunk(to_read) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                out[..first.len()].copy_from_slice(first);
                out[first.len()..first.len() + second.len()].copy_from_slice(second);
                chunk.commit_all();
                to_read
            }
            Err(_) => 0,
        }
    }

    /// Append everything currently queued to `out`, returning how many were read
    pub fn drain_into(&mut self, out: &mut Vec<f32>) -> usize {
        let to_read = self.consumer.slots();
        match self.consumer.read_chunk(to_read) {
            Ok(chunk) => {
                out.extend(chunk);
                to_read
            }
            Err(_) => 0,
        }
    }
}
