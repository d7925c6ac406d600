//! Register write queue
//!
//! Bounded FIFO between the event-rate sequencer and the sample-rate chip.
//! The platform drains it at a fixed number of writes per step, which models
//! the limited command bus of the real hardware.
//!
//! When full, the newest write is dropped: it is counted, a warning is logged
//! once per overflow episode, and [`WriteQueue::enqueue`] returns `false`.

use std::collections::VecDeque;

use log::warn;

use crate::registers::RegisterWrite;

/// Anything the platform can pull register writes from
pub trait WriteSource {
    /// Take the oldest pending write
    fn pop_write(&mut self) -> Option<RegisterWrite>;

    /// Number of writes still pending
    fn pending(&self) -> usize;

    /// Discard every pending write
    fn clear(&mut self);

    /// Whether writes reach this source through [`Platform::enqueue`], which
    /// is where write capture records them
    ///
    /// [`Platform::enqueue`]: crate::platform::Platform::enqueue
    fn supports_capture(&self) -> bool {
        false
    }
}

/// Queue statistics for monitoring overflow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Writes accepted
    pub accepted: u64,
    /// Writes rejected because the queue was full
    pub dropped: u64,
    /// Number of distinct overflow episodes
    pub overflow_episodes: u64,
    /// Highest fill level seen
    pub high_water: usize,
}

/// Bounded FIFO of register writes
#[derive(Debug, Clone)]
pub struct WriteQueue {
    entries: VecDeque<RegisterWrite>,
    capacity: usize,
    stats: QueueStats,
    /// Currently inside an overflow episode
    overflowing: bool,
}

impl WriteQueue {
    /// Create an empty queue holding at most `capacity` writes
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            stats: QueueStats::default(),
            overflowing: false,
        }
    }

    /// Maximum number of pending writes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pending writes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the next enqueue would be rejected
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Append a write without blocking
    ///
    /// # Returns
    ///
    /// `false` if the queue was full and the write was dropped
    pub fn enqueue(&mut self, write: RegisterWrite) -> bool {
        if self.is_full() {
            self.stats.dropped += 1;
            if !self.overflowing {
                self.overflowing = true;
                self.stats.overflow_episodes += 1;
                warn!(
                    "register write queue full ({} entries), dropping writes starting at channel {} command {}",
                    self.capacity, write.channel, write.command
                );
            }
            return false;
        }

        self.entries.push_back(write);
        self.stats.accepted += 1;
        self.stats.high_water = self.stats.high_water.max(self.entries.len());
        true
    }

    /// Take the oldest write
    pub fn pop(&mut self) -> Option<RegisterWrite> {
        let write = self.entries.pop_front()?;
        self.overflowing = false;
        Some(write)
    }

    /// Overflow statistics
    pub fn stats(&self) -> QueueStats {
        self.stats
    }
}

impl WriteSource for WriteQueue {
    fn pop_write(&mut self) -> Option<RegisterWrite> {
        self.pop()
    }

    fn pending(&self) -> usize {
        self.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.overflowing = false;
    }

    fn supports_capture(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(value: u32) -> RegisterWrite {
        RegisterWrite::new(0, 2, value)
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = WriteQueue::new(8);
        for v in 0..5 {
            assert!(queue.enqueue(w(v)));
        }
        let values: Vec<u32> = std::iter::from_fn(|| queue.pop()).map(|x| x.value).collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_newest_on_overflow() {
        let mut queue = WriteQueue::new(2);
        assert!(queue.enqueue(w(1)));
        assert!(queue.enqueue(w(2)));
        assert!(!queue.enqueue(w(3)));
        assert!(!queue.enqueue(w(4)));

        let stats = queue.stats();
        assert_eq!(stats.dropped, 2);
        assert_eq!(stats.overflow_episodes, 1);
        assert_eq!(queue.pop().map(|x| x.value), Some(1));
        assert_eq!(queue.pop().map(|x| x.value), Some(2));
    }

    #[test]
    fn test_new_episode_after_drain() {
        let mut queue = WriteQueue::new(1);
        queue.enqueue(w(1));
        queue.enqueue(w(2));
        queue.pop();
        queue.enqueue(w(3));
        queue.enqueue(w(4));
        assert_eq!(queue.stats().overflow_episodes, 2);
        assert_eq!(queue.stats().high_water, 1);
    }

    #[test]
    fn test_zero_capacity_rejects_everything() {
        let mut queue = WriteQueue::new(0);
        assert!(!queue.enqueue(w(1)));
        assert_eq!(queue.pending(), 0);
    }
}
