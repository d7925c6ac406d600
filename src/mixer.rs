//! Output stage
//!
//! Collects per-channel outputs and the summed master into [`MixBuffers`],
//! with an optional post filter on the master: DC offset removal followed by
//! a soft triangular low-pass.

/// DC history size (2048 samples)
const DC_HISTORY_BITS: usize = 11;
const DC_HISTORY_SIZE: usize = 1 << DC_HISTORY_BITS;

/// Rendered audio: master plus one buffer per audio channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MixBuffers {
    /// Summed (and optionally filtered) output
    pub master: Vec<i16>,
    /// Per-channel outputs, indexed by audio channel
    pub channels: Vec<Vec<i16>>,
}

impl MixBuffers {
    /// Create empty buffers for `channel_count` channels
    pub fn with_capacity(channel_count: usize, capacity: usize) -> Self {
        Self {
            master: Vec::with_capacity(capacity),
            channels: (0..channel_count)
                .map(|_| Vec::with_capacity(capacity))
                .collect(),
        }
    }

    /// Number of samples in the master buffer
    pub fn len(&self) -> usize {
        self.master.len()
    }

    /// True when nothing has been rendered
    pub fn is_empty(&self) -> bool {
        self.master.is_empty()
    }

    /// Append one output frame
    ///
    /// Extra channel values beyond the buffer count are ignored.
    pub fn push_frame(&mut self, master: i16, channels: impl IntoIterator<Item = i16>) {
        self.master.push(master);
        for (buf, sample) in self.channels.iter_mut().zip(channels) {
            buf.push(sample);
        }
    }

    /// Append every frame of `other`
    pub fn extend(&mut self, other: MixBuffers) {
        self.master.extend(other.master);
        for (buf, more) in self.channels.iter_mut().zip(other.channels) {
            buf.extend(more);
        }
    }
}

/// Saturate a mixed sample to 16 bits
#[inline]
pub fn clamp_i16(sample: i32) -> i16 {
    sample.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// DC removal plus triangular FIR (`0.25 x[n-2] + 0.5 x[n-1] + 0.25 x[n]`)
#[derive(Clone)]
pub struct PostFilter {
    /// Circular buffer of recent samples
    history: Box<[i32; DC_HISTORY_SIZE]>,
    /// Current write position in history
    position: usize,
    /// Running sum of history
    running_sum: i64,
    last_in1: i32,
    last_in2: i32,
}

impl PostFilter {
    /// Create a filter with empty history
    pub fn new() -> Self {
        Self {
            history: Box::new([0; DC_HISTORY_SIZE]),
            position: 0,
            running_sum: 0,
            last_in1: 0,
            last_in2: 0,
        }
    }

    /// Clear the filter state
    pub fn reset(&mut self) {
        self.history.fill(0);
        self.position = 0;
        self.running_sum = 0;
        self.last_in1 = 0;
        self.last_in2 = 0;
    }

    /// Filter one master sample
    #[inline]
    pub fn process(&mut self, sample: i32) -> i32 {
        self.running_sum -= self.history[self.position] as i64;
        self.running_sum += sample as i64;
        self.history[self.position] = sample;
        self.position = (self.position + 1) & (DC_HISTORY_SIZE - 1);

        let dc_offset = (self.running_sum >> DC_HISTORY_BITS) as i32;
        let centered = sample - dc_offset;

        let out = (self.last_in2 + 2 * self.last_in1 + centered) / 4;
        self.last_in2 = self.last_in1;
        self.last_in1 = centered;
        out
    }
}

impl Default for PostFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PostFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostFilter")
            .field("position", &self.position)
            .field("running_sum", &self.running_sum)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_i16() {
        assert_eq!(clamp_i16(40_000), i16::MAX);
        assert_eq!(clamp_i16(-40_000), i16::MIN);
        assert_eq!(clamp_i16(123), 123);
    }

    #[test]
    fn test_post_filter_removes_offset() {
        let mut filter = PostFilter::new();
        let mut last = 0;
        for _ in 0..DC_HISTORY_SIZE * 2 {
            last = filter.process(5000);
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn test_post_filter_smooths_step() {
        let mut filter = PostFilter::new();
        let first = filter.process(4096);
        let second = filter.process(4096);
        // Quarter, then three quarters of the DC-adjusted step
        assert_eq!(first, (4096 - 2) / 4);
        assert!(second > first);
    }

    #[test]
    fn test_push_frame() {
        let mut bufs = MixBuffers::with_capacity(2, 4);
        bufs.push_frame(10, [4, 6]);
        bufs.push_frame(-1, [0, -1, 99]);
        assert_eq!(bufs.len(), 2);
        assert_eq!(bufs.master, vec![10, -1]);
        assert_eq!(bufs.channels, vec![vec![4, 0], vec![6, -1]]);
    }
}
