//! Chip platform
//!
//! Couples a [`CrapSynth`] with the rate-limited register write queue and the
//! output stage. Before every internal step at most
//! [`ChipConfig::writes_per_step`] queued writes are applied, which models the
//! finite command bus between the sequencer MCU and the chip.

use log::{info, warn};

use crate::capture::WriteLog;
use crate::chip::{CrapSynth, MemoryBank, SampleData, SamplePlacement};
use crate::config::ChipConfig;
use crate::constants::MAX_AUDIO_CHANNELS;
use crate::mixer::{clamp_i16, MixBuffers, PostFilter};
use crate::queue::{QueueStats, WriteQueue, WriteSource};
use crate::registers::RegisterWrite;
use crate::{CrapSynthError, Result};

/// A chip driven through a write queue
///
/// The default source is an owned [`WriteQueue`]. For a sequencer on another
/// thread use a [`WriteConsumer`](crate::streaming::WriteConsumer) from
/// [`write_channel`](crate::streaming::write_channel) instead.
#[derive(Debug)]
pub struct Platform<S: WriteSource = WriteQueue> {
    config: ChipConfig,
    chip: CrapSynth,
    source: S,
    post_filter: Option<PostFilter>,
    capture: Option<WriteLog>,
    samples_rendered: u64,
    writes_applied: u64,
}

impl Platform<WriteQueue> {
    /// Create a platform with its own write queue
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate
    pub fn new(config: ChipConfig) -> Result<Self> {
        let queue = WriteQueue::new(config.queue_capacity);
        Self::with_source(config, queue)
    }

    /// Queue a register write
    ///
    /// # Returns
    ///
    /// `false` if the queue was full and the write was dropped
    pub fn enqueue(&mut self, write: RegisterWrite) -> bool {
        if let Some(log) = self.capture.as_mut() {
            log.record(self.samples_rendered, write);
        }
        self.source.enqueue(write)
    }

    /// Queue a register write built from its parts
    pub fn enqueue_parts(&mut self, channel: u8, command: u8, value: u32) -> bool {
        self.enqueue(RegisterWrite::new(channel, command, value))
    }

    /// Write queue
    pub fn queue(&self) -> &WriteQueue {
        &self.source
    }

    /// Write queue statistics
    pub fn queue_stats(&self) -> QueueStats {
        self.source.stats()
    }
}

impl<S: WriteSource> Platform<S> {
    /// Create a platform pulling writes from `source`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate, or if
    /// capture is enabled for a source whose writes bypass
    /// [`Platform::enqueue`]
    pub fn with_source(config: ChipConfig, source: S) -> Result<Self> {
        config.validate()?;
        if config.capture && !source.supports_capture() {
            return Err(CrapSynthError::ConfigError(
                "write capture needs the platform's own write queue".to_string(),
            ));
        }

        let burst = config.worst_case_burst();
        if config.queue_capacity < burst {
            warn!(
                "write queue capacity {} is below the worst-case tick burst of {} writes",
                config.queue_capacity, burst
            );
        }

        info!(
            "platform: {:?}, {} Hz x{}, queue {}, {} write(s)/step",
            config.revision,
            config.sample_rate,
            config.oversample,
            config.queue_capacity,
            config.writes_per_step
        );

        Ok(Self {
            chip: CrapSynth::new(config.revision),
            source,
            post_filter: config.post_filter.then(PostFilter::new),
            capture: config.capture.then(WriteLog::new),
            samples_rendered: 0,
            writes_applied: 0,
            config,
        })
    }

    /// Render `num_samples` output samples
    pub fn clock_and_mix(&mut self, num_samples: usize) -> MixBuffers {
        let count = self.chip.audio_channel_count();
        let steps = self.config.oversample.max(1) as i64;
        let mut out = MixBuffers::with_capacity(count, num_samples);

        for _ in 0..num_samples {
            let mut master_sum = 0i64;
            let mut channel_sums = [0i64; MAX_AUDIO_CHANNELS];

            for _ in 0..steps {
                self.drain_writes();
                self.chip.clock();

                master_sum += self.chip.master_output() as i64;
                for (sum, &value) in channel_sums.iter_mut().zip(self.chip.channel_outputs()) {
                    *sum += value as i64;
                }
            }

            let mut master = (master_sum / steps) as i32;
            if let Some(filter) = self.post_filter.as_mut() {
                master = filter.process(master);
            }
            out.push_frame(
                clamp_i16(master),
                channel_sums[..count]
                    .iter()
                    .map(|&sum| clamp_i16((sum / steps) as i32)),
            );
            self.samples_rendered += 1;
        }

        out
    }

    fn drain_writes(&mut self) {
        for _ in 0..self.config.writes_per_step {
            let Some(write) = self.source.pop_write() else {
                break;
            };
            self.chip.write(write);
            self.writes_applied += 1;
        }
    }

    /// Reset the chip and drop pending writes
    ///
    /// See [`CrapSynth::reset`] for what `preserve_mutes_and_memory` keeps.
    /// The reset is captured so replays cross it the same way.
    pub fn reset(&mut self, preserve_mutes_and_memory: bool) {
        if let Some(log) = self.capture.as_mut() {
            log.record_reset(self.samples_rendered, preserve_mutes_and_memory);
        }
        self.chip.reset(preserve_mutes_and_memory);
        self.source.clear();
        if let Some(filter) = self.post_filter.as_mut() {
            filter.reset();
        }
    }

    /// Mute or unmute an audio channel
    pub fn set_muted(&mut self, channel: usize, muted: bool) {
        self.chip.set_muted(channel, muted);
    }

    /// Pack samples into sample memory
    pub fn render_sample_memory(&mut self, samples: &[SampleData]) -> Vec<SamplePlacement> {
        self.chip.render_sample_memory(samples)
    }

    /// Bytes used in a sample bank
    pub fn memory_usage(&self, bank: MemoryBank) -> usize {
        self.chip.memory_usage(bank)
    }

    /// Configuration
    pub fn config(&self) -> &ChipConfig {
        &self.config
    }

    /// Chip
    pub fn chip(&self) -> &CrapSynth {
        &self.chip
    }

    /// Mutable chip, for direct writes that bypass the queue
    pub fn chip_mut(&mut self) -> &mut CrapSynth {
        &mut self.chip
    }

    /// Write source
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Output samples rendered so far
    pub fn samples_rendered(&self) -> u64 {
        self.samples_rendered
    }

    /// Writes applied to the chip so far
    pub fn writes_applied(&self) -> u64 {
        self.writes_applied
    }

    /// Captured writes, when capture is enabled
    pub fn capture(&self) -> Option<&WriteLog> {
        self.capture.as_ref()
    }

    /// Take the captured writes, leaving an empty log in place
    pub fn take_capture(&mut self) -> Option<WriteLog> {
        self.capture.as_mut().map(std::mem::take)
    }
}
