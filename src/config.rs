//! Platform configuration
//!
//! Everything that is fixed when a [`Platform`](crate::Platform) is created:
//! chip revision, step rate, queue sizing and output processing. Loadable
//! from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ACC_BITS, DEFAULT_QUEUE_CAPACITY, DEFAULT_SAMPLE_RATE, TIMER_ACC_BITS, TIMER_OVERFLOW,
    WAVETABLE_SIZE,
};
use crate::registers::Revision;
use crate::{CrapSynthError, Result};

/// Most commands any single channel accepts
const MAX_COMMANDS_PER_CHANNEL: usize = 12;

/// Configuration for a chip platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChipConfig {
    /// Chip revision (number of DAC channels)
    pub revision: Revision,
    /// Output sample rate in Hz; the chip steps `oversample` times per sample
    pub sample_rate: u32,
    /// Register write queue size
    pub queue_capacity: usize,
    /// Writes drained from the queue before each internal step
    pub writes_per_step: usize,
    /// Internal steps per output sample
    pub oversample: u32,
    /// DC removal and soft low-pass on the master output
    pub post_filter: bool,
    /// Record every enqueued write for later replay
    pub capture: bool,
}

impl ChipConfig {
    /// Settings matching the reference hardware: one write and one step per sample
    pub fn hardware() -> Self {
        Self {
            revision: Revision::Rev2,
            sample_rate: DEFAULT_SAMPLE_RATE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            writes_per_step: 1,
            oversample: 1,
            post_filter: false,
            capture: false,
        }
    }

    /// Listening preset: post filter on
    pub fn high_fidelity() -> Self {
        Self::hardware().with_post_filter(true)
    }

    /// Set the chip revision
    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    /// Set the output sample rate
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the write queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set how many writes are drained per step
    pub fn with_writes_per_step(mut self, writes: usize) -> Self {
        self.writes_per_step = writes;
        self
    }

    /// Set the oversampling factor
    pub fn with_oversample(mut self, factor: u32) -> Self {
        self.oversample = factor;
        self
    }

    /// Enable or disable the master post filter
    pub fn with_post_filter(mut self, enabled: bool) -> Self {
        self.post_filter = enabled;
        self
    }

    /// Enable or disable write capture
    pub fn with_capture(mut self, enabled: bool) -> Self {
        self.capture = enabled;
        self
    }

    /// Internal step rate in Hz
    pub fn step_rate(&self) -> u64 {
        self.sample_rate as u64 * self.oversample.max(1) as u64
    }

    /// Largest burst of writes one sequencer tick can emit: every register
    /// of every channel plus a full wavetable upload per DAC
    pub fn worst_case_burst(&self) -> usize {
        self.revision.dac_count() * WAVETABLE_SIZE
            + self.revision.channel_count() * MAX_COMMANDS_PER_CHANNEL
    }

    /// Check the configuration
    ///
    /// # Errors
    ///
    /// [`CrapSynthError::ConfigError`] for a zero queue capacity, zero
    /// oversample factor, zero drain rate or zero sample rate
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(CrapSynthError::ConfigError(
                "queue capacity must be greater than 0".into(),
            ));
        }
        if self.oversample == 0 {
            return Err(CrapSynthError::ConfigError(
                "oversample factor must be greater than 0".into(),
            ));
        }
        if self.writes_per_step == 0 {
            return Err(CrapSynthError::ConfigError(
                "writes per step must be greater than 0".into(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(CrapSynthError::ConfigError(
                "sample rate must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CrapSynthError::ConfigError(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// DDS phase increment producing `hz` at the step rate
    pub fn hz_to_increment(&self, hz: f64) -> u32 {
        frequency_to_increment(hz, self.step_rate(), ACC_BITS)
    }

    /// Timer increment overflowing `hz` times per second at the step rate
    ///
    /// Clamped to one overflow per step.
    pub fn hz_to_timer_increment(&self, hz: f64) -> u32 {
        frequency_to_increment(hz, self.step_rate(), TIMER_ACC_BITS).min(TIMER_OVERFLOW)
    }
}

impl Default for ChipConfig {
    fn default() -> Self {
        Self::hardware()
    }
}

fn frequency_to_increment(hz: f64, step_rate: u64, bits: u32) -> u32 {
    if step_rate == 0 || !hz.is_finite() || hz <= 0.0 {
        return 0;
    }
    let increment = (hz * (1u64 << bits) as f64 / step_rate as f64).round();
    increment.min(u32::MAX as f64) as u32
}
