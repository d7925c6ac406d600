//! Cross-thread register write channel
//!
//! Splits a [`WriteQueue`] into a producer handle for the sequencer thread
//! and a consumer handle for the audio thread. Neither half is `Clone`, so
//! there is exactly one of each.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::queue::{QueueStats, WriteQueue, WriteSource};
use crate::registers::RegisterWrite;

/// Create a producer/consumer pair over a bounded write queue
pub fn write_channel(capacity: usize) -> (WriteProducer, WriteConsumer) {
    let queue = Arc::new(Mutex::new(WriteQueue::new(capacity)));
    (
        WriteProducer {
            queue: Arc::clone(&queue),
        },
        WriteConsumer { queue },
    )
}

/// Sequencer side of the write channel
#[derive(Debug)]
pub struct WriteProducer {
    queue: Arc<Mutex<WriteQueue>>,
}

impl WriteProducer {
    /// Append a write without blocking; `false` if it was dropped
    pub fn enqueue(&self, write: RegisterWrite) -> bool {
        self.queue.lock().enqueue(write)
    }

    /// Append a write built from its parts
    pub fn enqueue_parts(&self, channel: u8, command: u8, value: u32) -> bool {
        self.enqueue(RegisterWrite::new(channel, command, value))
    }

    /// Pending writes
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Overflow statistics
    pub fn stats(&self) -> QueueStats {
        self.queue.lock().stats()
    }
}

/// Audio side of the write channel
#[derive(Debug)]
pub struct WriteConsumer {
    queue: Arc<Mutex<WriteQueue>>,
}

impl WriteSource for WriteConsumer {
    fn pop_write(&mut self) -> Option<RegisterWrite> {
        self.queue.lock().pop()
    }

    fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    fn clear(&mut self) {
        self.queue.lock().clear();
    }
}
