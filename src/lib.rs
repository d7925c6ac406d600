//! CrapSynth sound chip emulator
//!
//! A sample-accurate model of the CrapSynth: a microcontroller-driven
//! synthesizer built from four AD9833-style DDS tone generators, an LFSR
//! noise source, two or three 12-bit sample/wavetable DAC channels and a bank
//! of phase-reset timers. The chip is programmed entirely through register
//! writes, which reach it through a rate-limited queue just like the command
//! bus of the real hardware.
//!
//! # Features
//! - Bit-exact DDS phase accumulators with sine, triangle, square and PWM waves
//! - 23-bit LFSR noise with internal or external clocking
//! - DAC sample playback from flash/RAM banks, software wavetables and
//!   procedural noise, triangle, saw and pulse
//! - Zero-cross deferred volume changes on every channel
//! - Timer-driven hard sync (phase reset) of any channel set
//! - Bounded register write queue drained at a fixed rate per step
//! - Write capture and deterministic replay
//! - WAV export (`export-wav` feature, on by default)
//!
//! # Quick start
//! ```
//! use crapsynth::{ChipConfig, Platform};
//!
//! let config = ChipConfig::default();
//! let mut platform = Platform::new(config).unwrap();
//!
//! // DDS channel 0: 440 Hz sine at full volume
//! platform.enqueue_parts(0, 0, 255);
//! platform.enqueue_parts(0, 1, 1);
//! platform.enqueue_parts(0, 2, config.hz_to_increment(440.0));
//!
//! let buffers = platform.clock_and_mix(1024);
//! assert_eq!(buffers.master.len(), 1024);
//! ```
//!
//! ## Driving the chip from another thread
//! ```
//! use crapsynth::streaming::write_channel;
//! use crapsynth::{ChipConfig, Platform};
//!
//! let config = ChipConfig::default();
//! let (producer, consumer) = write_channel(config.queue_capacity);
//! let mut platform = Platform::with_source(config, consumer).unwrap();
//!
//! std::thread::spawn(move || {
//!     producer.enqueue_parts(0, 0, 255);
//! })
//! .join()
//! .unwrap();
//!
//! let _ = platform.clock_and_mix(256);
//! ```

#![warn(missing_docs)]

pub mod capture;
pub mod chip;
pub mod config;
pub mod constants;
#[cfg(feature = "export-wav")]
pub mod export;
pub mod mixer;
pub mod platform;
pub mod queue;
pub mod registers;
pub mod sequence;
pub mod streaming;
pub mod tables;
pub mod timer;

/// Error types for CrapSynth operations
#[derive(thiserror::Error, Debug)]
pub enum CrapSynthError {
    /// Error while parsing a script or write log
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Error writing audio file
    #[error("Audio file write error: {0}")]
    AudioFileError(String),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for CrapSynthError {
    /// Converts a String into `CrapSynthError::Other`.
    ///
    /// Prefer the specific variants (`ConfigError`, `ParseError`,
    /// `AudioFileError`) where the cause is known.
    fn from(msg: String) -> Self {
        CrapSynthError::Other(msg)
    }
}

impl From<&str> for CrapSynthError {
    /// Converts a string slice into `CrapSynthError::Other`.
    fn from(msg: &str) -> Self {
        CrapSynthError::Other(msg.to_string())
    }
}

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, CrapSynthError>;

// Public API exports
pub use capture::{CapturedEvent, LogEvent, WriteLog};
pub use chip::{
    CrapSynth, DacWaveform, DdsWaveform, MemoryBank, PlayFlags, SampleData, SamplePlacement,
};
pub use config::ChipConfig;
pub use mixer::MixBuffers;
pub use platform::Platform;
pub use queue::{QueueStats, WriteQueue, WriteSource};
pub use registers::{ChannelId, Register, RegisterWrite, Revision};
pub use sequence::{Script, TickClock};
pub use streaming::{write_channel, WriteConsumer, WriteProducer};
pub use tables::LookupTables;
pub use timer::{ChannelMask, TimerBank};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: CrapSynthError = "boom".into();
        assert!(matches!(err, CrapSynthError::Other(ref m) if m == "boom"));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CrapSynthError = io.into();
        assert!(err.to_string().starts_with("IO error"));
    }
}
