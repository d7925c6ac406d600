//! Tick sequencing
//!
//! Sequencers issue register writes on musical ticks (for example 60 Hz)
//! while the chip runs at the sample rate. [`TickClock`] converts between the
//! two without drift, and [`Script`] is a small JSON format of per-tick write
//! lists that renders through a [`Platform`].

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::chip::SampleData;
use crate::mixer::MixBuffers;
use crate::platform::Platform;
use crate::registers::RegisterWrite;
use crate::{CrapSynthError, Result};

/// Sample-accurate tick scheduler
#[derive(Debug, Clone)]
pub struct TickClock {
    sample_rate: u32,
    tick_rate: f64,
    /// Ticks started so far
    tick_count: u64,
    /// Samples covered by those ticks
    sample_count: u64,
}

impl TickClock {
    /// Create a clock firing `tick_rate` times per second at `sample_rate`
    pub fn new(sample_rate: u32, tick_rate: f64) -> Self {
        Self {
            sample_rate,
            tick_rate,
            tick_count: 0,
            sample_count: 0,
        }
    }

    /// Sample index where tick `tick` begins
    pub fn tick_start(&self, tick: u64) -> u64 {
        if self.tick_rate <= 0.0 {
            return 0;
        }
        (tick as f64 * self.sample_rate as f64 / self.tick_rate).floor() as u64
    }

    /// Start the next tick and return its length in samples
    ///
    /// Lengths alternate between floor and ceil of the exact period so the
    /// tick boundaries never drift.
    pub fn next_tick_length(&mut self) -> u64 {
        self.tick_count += 1;
        let end = self.tick_start(self.tick_count);
        let length = end - self.sample_count;
        self.sample_count = end;
        length
    }

    /// Ticks started so far
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Samples covered by the started ticks
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Elapsed time in seconds
    pub fn elapsed_time(&self) -> f64 {
        self.sample_count as f64 / self.sample_rate as f64
    }

    /// Restart from tick 0
    pub fn reset(&mut self) {
        self.tick_count = 0;
        self.sample_count = 0;
    }
}

/// Writes issued on one tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickWrites {
    /// Tick index
    pub tick: u64,
    /// Writes in issue order
    pub writes: Vec<RegisterWrite>,
}

/// A rendered sequence of register writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Ticks per second
    pub tick_rate: f64,
    /// Samples to render; defaults to the end of the last tick
    #[serde(default)]
    pub total_samples: Option<u64>,
    /// Samples to place in sample memory before rendering
    #[serde(default)]
    pub sample_data: Vec<SampleData>,
    /// Per-tick write lists
    #[serde(default)]
    pub ticks: Vec<TickWrites>,
}

impl Script {
    /// Parse and check a JSON script
    pub fn from_json_str(json: &str) -> Result<Self> {
        let script: Self = serde_json::from_str(json)
            .map_err(|e| CrapSynthError::ParseError(format!("invalid script JSON: {e}")))?;
        script.validate()?;
        Ok(script)
    }

    /// Load a JSON script file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Check the tick rate
    pub fn validate(&self) -> Result<()> {
        if !self.tick_rate.is_finite() || self.tick_rate <= 0.0 {
            return Err(CrapSynthError::ConfigError(format!(
                "tick rate must be positive, got {}",
                self.tick_rate
            )));
        }
        Ok(())
    }

    /// Number of samples the script renders at `sample_rate` (before extras)
    pub fn length_in_samples(&self, sample_rate: u32) -> u64 {
        if let Some(total) = self.total_samples {
            return total;
        }
        let last_tick = self.ticks.iter().map(|t| t.tick).max();
        let clock = TickClock::new(sample_rate, self.tick_rate);
        last_tick.map_or(0, |tick| clock.tick_start(tick + 1))
    }

    /// Render through `platform`, followed by `extra_samples` of tail
    ///
    /// # Errors
    ///
    /// [`CrapSynthError::ConfigError`] if the tick rate is not positive or
    /// exceeds the sample rate (every tick needs at least one sample)
    pub fn render(&self, platform: &mut Platform, extra_samples: u64) -> Result<MixBuffers> {
        self.validate()?;

        let sample_rate = platform.config().sample_rate;
        if self.tick_rate > sample_rate as f64 {
            return Err(CrapSynthError::ConfigError(format!(
                "tick rate {} exceeds the sample rate {}",
                self.tick_rate, sample_rate
            )));
        }

        if !self.sample_data.is_empty() {
            platform.render_sample_memory(&self.sample_data);
        }
        let total = self.length_in_samples(sample_rate) + extra_samples;

        let mut ticks: Vec<&TickWrites> = self.ticks.iter().collect();
        ticks.sort_by_key(|t| t.tick);
        let mut ticks = ticks.into_iter().peekable();

        let channel_count = platform.chip().audio_channel_count();
        let mut out = MixBuffers::with_capacity(channel_count, total as usize);
        let mut clock = TickClock::new(sample_rate, self.tick_rate);
        let mut rendered = 0u64;

        while rendered < total {
            let tick = clock.tick_count();
            while let Some(entry) = ticks.next_if(|t| t.tick <= tick) {
                for write in &entry.writes {
                    platform.enqueue(*write);
                }
            }

            let length = clock.next_tick_length().min(total - rendered);
            out.extend(platform.clock_and_mix(length as usize));
            rendered += length;
        }

        info!(
            "rendered {} ticks, {} samples, {} writes applied",
            clock.tick_count(),
            rendered,
            platform.writes_applied()
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChipConfig;

    #[test]
    fn test_tick_lengths_do_not_drift() {
        let mut clock = TickClock::new(250_000, 60.0);
        let total: u64 = (0..60).map(|_| clock.next_tick_length()).sum();
        assert_eq!(total, 250_000);
        assert_eq!(clock.tick_count(), 60);
        assert!((clock.elapsed_time() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_tick_lengths_alternate() {
        let mut clock = TickClock::new(10, 3.0);
        let lengths: Vec<u64> = (0..3).map(|_| clock.next_tick_length()).collect();
        assert_eq!(lengths, vec![3, 3, 4]);
    }

    #[test]
    fn test_script_rejects_bad_tick_rate() {
        let json = r#"{ "tick_rate": 0.0 }"#;
        assert!(matches!(
            Script::from_json_str(json),
            Err(CrapSynthError::ConfigError(_))
        ));
    }

    #[test]
    fn test_script_rejects_tick_rate_above_sample_rate() {
        let json = r#"{ "tick_rate": 1e300, "total_samples": 100 }"#;
        let script = Script::from_json_str(json).expect("valid script");
        let mut platform = Platform::new(ChipConfig::default()).expect("valid config");
        assert!(matches!(
            script.render(&mut platform, 0),
            Err(CrapSynthError::ConfigError(_))
        ));
        assert_eq!(platform.samples_rendered(), 0);
    }

    #[test]
    fn test_script_length_from_last_tick() {
        let json = r#"{
            "tick_rate": 50.0,
            "ticks": [ { "tick": 3, "writes": [ { "channel": 0, "command": 0, "value": 255 } ] } ]
        }"#;
        let script = Script::from_json_str(json).expect("valid script");
        assert_eq!(script.length_in_samples(250_000), 20_000);
    }

    #[test]
    fn test_script_render_applies_tick_writes() {
        let json = r#"{
            "tick_rate": 1000.0,
            "ticks": [
                { "tick": 0, "writes": [ { "channel": 0, "command": 2, "value": 1 } ] },
                { "tick": 2, "writes": [ { "channel": 0, "command": 2, "value": 2 } ] }
            ]
        }"#;
        let script = Script::from_json_str(json).expect("valid script");
        let mut platform = Platform::new(ChipConfig::default()).expect("valid config");
        let out = script.render(&mut platform, 10).expect("render");

        assert_eq!(out.len(), 3 * 250 + 10);
        assert_eq!(platform.writes_applied(), 2);
        assert_eq!(platform.chip().dds(0).map(|c| c.frequency()), Some(2));
    }
}
