//! Register write capture and replay
//!
//! A [`WriteLog`] records every write handed to the platform queue, and every
//! platform reset, together with the output sample index at which it was
//! issued. Replaying the log through a platform with the same configuration
//! reproduces the live output exactly, including writes dropped by a full
//! queue.
//!
//! Logs are stored as JSON or in a compact little-endian binary form:
//!
//! ```text
//! "CRWL"  magic
//! u16     version (2)
//! u32     record count
//! record: u64 sample, u8 kind, u8 channel, u8 command, u32 value
//! ```
//!
//! Kind 0 is a register write. Kind 1 is a reset; its value is 1 when mutes
//! and sample memory were preserved, and channel and command are 0.

use std::path::Path;

use nom::bytes::complete::tag;
use nom::combinator::{map_opt, verify};
use nom::multi::count;
use nom::number::complete::{le_u16, le_u32, le_u64, le_u8};
use nom::sequence::tuple;
use nom::IResult;
use serde::{Deserialize, Serialize};

use crate::mixer::MixBuffers;
use crate::platform::Platform;
use crate::registers::RegisterWrite;
use crate::{CrapSynthError, Result};

/// Binary log magic
pub const LOG_MAGIC: &[u8; 4] = b"CRWL";

/// Binary log format version
pub const LOG_VERSION: u16 = 2;

/// Size of one binary record in bytes
const RECORD_SIZE: usize = 8 + 1 + 1 + 1 + 4;

const KIND_WRITE: u8 = 0;
const KIND_RESET: u8 = 1;

/// Something the sequencer did to the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    /// A queued register write
    Write(RegisterWrite),
    /// A platform reset
    Reset {
        /// Mute flags and sample memory were kept
        preserve_mutes_and_memory: bool,
    },
}

/// An event and the output sample it was issued before
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedEvent {
    /// Output sample index (0 = before the first rendered sample)
    pub sample: u64,
    /// The event
    pub event: LogEvent,
}

/// Ordered log of captured writes and resets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteLog {
    entries: Vec<CapturedEvent>,
}

impl WriteLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write issued before output sample `sample`
    pub fn record(&mut self, sample: u64, write: RegisterWrite) {
        self.entries.push(CapturedEvent {
            sample,
            event: LogEvent::Write(write),
        });
    }

    /// Append a reset issued before output sample `sample`
    pub fn record_reset(&mut self, sample: u64, preserve_mutes_and_memory: bool) {
        self.entries.push(CapturedEvent {
            sample,
            event: LogEvent::Reset {
                preserve_mutes_and_memory,
            },
        });
    }

    /// Captured events in issue order
    pub fn entries(&self) -> &[CapturedEvent] {
        &self.entries
    }

    /// Number of captured events
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of captured register writes
    pub fn write_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.event, LogEvent::Write(_)))
            .count()
    }

    /// True when nothing was captured
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sample index of the last captured event
    pub fn last_sample(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.sample).max()
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CrapSynthError::Other(format!("failed to serialize write log: {e}")))
    }

    /// Parse a JSON log
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CrapSynthError::ParseError(format!("invalid write log JSON: {e}")))
    }

    /// Encode to the binary format
    ///
    /// # Errors
    ///
    /// [`CrapSynthError::Other`] if the log holds more than `u32::MAX` records
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let count = u32::try_from(self.entries.len()).map_err(|_| {
            CrapSynthError::Other(format!(
                "write log too large for the binary format: {} records",
                self.entries.len()
            ))
        })?;

        let mut out = Vec::with_capacity(10 + self.entries.len() * RECORD_SIZE);
        out.extend_from_slice(LOG_MAGIC);
        out.extend_from_slice(&LOG_VERSION.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        for entry in &self.entries {
            let (kind, channel, command, value) = match entry.event {
                LogEvent::Write(write) => (KIND_WRITE, write.channel, write.command, write.value),
                LogEvent::Reset {
                    preserve_mutes_and_memory,
                } => (KIND_RESET, 0, 0, preserve_mutes_and_memory as u32),
            };
            out.extend_from_slice(&entry.sample.to_le_bytes());
            out.push(kind);
            out.push(channel);
            out.push(command);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Ok(out)
    }

    /// Decode the binary format
    ///
    /// # Errors
    ///
    /// [`CrapSynthError::ParseError`] on a bad magic, unknown version,
    /// unknown record kind or truncated data
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let (_, entries) = parse_log(data).map_err(|e| {
            CrapSynthError::ParseError(format!("invalid binary write log: {e:?}"))
        })?;
        Ok(Self { entries })
    }

    /// Save to a file: JSON for a `.json` extension, binary otherwise
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if is_json_path(path) {
            std::fs::write(path, self.to_json()?)?;
        } else {
            std::fs::write(path, self.to_bytes()?)?;
        }
        Ok(())
    }

    /// Load a file written by [`save`](Self::save)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if is_json_path(path) {
            Self::from_json(&std::fs::read_to_string(path)?)
        } else {
            Self::from_bytes(&std::fs::read(path)?)
        }
    }

    /// Feed the log through `platform` and render `total_samples` samples
    ///
    /// Sample indices are relative to the platform's current position. Events
    /// are applied just before the sample they were captured at, in capture
    /// order, then the platform renders up to the next captured event.
    pub fn replay_into(&self, platform: &mut Platform, total_samples: u64) -> MixBuffers {
        let mut ordered: Vec<&CapturedEvent> = self.entries.iter().collect();
        ordered.sort_by_key(|e| e.sample);
        let mut pending = ordered.into_iter().peekable();

        let channel_count = platform.chip().audio_channel_count();
        let mut out = MixBuffers::with_capacity(channel_count, total_samples as usize);
        let mut pos = 0u64;

        while pos < total_samples {
            while let Some(entry) = pending.next_if(|e| e.sample <= pos) {
                match entry.event {
                    LogEvent::Write(write) => {
                        platform.enqueue(write);
                    }
                    LogEvent::Reset {
                        preserve_mutes_and_memory,
                    } => platform.reset(preserve_mutes_and_memory),
                }
            }
            let next = pending
                .peek()
                .map_or(total_samples, |e| e.sample.min(total_samples));
            out.extend(platform.clock_and_mix((next - pos) as usize));
            pos = next;
        }

        out
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn parse_record(input: &[u8]) -> IResult<&[u8], CapturedEvent> {
    map_opt(
        tuple((le_u64, le_u8, le_u8, le_u8, le_u32)),
        |(sample, kind, channel, command, value)| {
            let event = match kind {
                KIND_WRITE => LogEvent::Write(RegisterWrite::new(channel, command, value)),
                KIND_RESET => LogEvent::Reset {
                    preserve_mutes_and_memory: value != 0,
                },
                _ => return None,
            };
            Some(CapturedEvent { sample, event })
        },
    )(input)
}

fn parse_log(input: &[u8]) -> IResult<&[u8], Vec<CapturedEvent>> {
    let (input, _) = tag(&LOG_MAGIC[..])(input)?;
    let (input, _) = verify(le_u16, |v: &u16| *v == LOG_VERSION)(input)?;
    let (input, n) = le_u32(input)?;
    count(parse_record, n as usize)(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> WriteLog {
        let mut log = WriteLog::new();
        log.record(0, RegisterWrite::new(0, 0, 255));
        log.record(0, RegisterWrite::new(0, 1, 1));
        log.record(12, RegisterWrite::new(5, 10, 0xff80));
        log.record_reset(12, true);
        log.record(20, RegisterWrite::new(1, 0, 7));
        log
    }

    #[test]
    fn test_binary_layout() {
        let bytes = sample_log().to_bytes().expect("encodable");
        assert_eq!(&bytes[..4], b"CRWL");
        assert_eq!(bytes.len(), 10 + 5 * RECORD_SIZE);
        let reset = &bytes[10 + 3 * RECORD_SIZE..10 + 4 * RECORD_SIZE];
        assert_eq!(reset[8], KIND_RESET);
        assert_eq!(reset[11], 1);
        assert_eq!(WriteLog::from_bytes(&bytes).expect("valid log"), sample_log());
    }

    #[test]
    fn test_binary_rejects_bad_input() {
        assert!(matches!(
            WriteLog::from_bytes(b"NOPE\x01\x00\x00\x00\x00\x00"),
            Err(CrapSynthError::ParseError(_))
        ));

        let mut bytes = sample_log().to_bytes().expect("encodable");
        bytes[4] = 9;
        assert!(WriteLog::from_bytes(&bytes).is_err());

        let mut bytes = sample_log().to_bytes().expect("encodable");
        bytes[10 + 8] = 7;
        assert!(WriteLog::from_bytes(&bytes).is_err());

        let bytes = sample_log().to_bytes().expect("encodable");
        assert!(WriteLog::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_json_log() {
        let json = sample_log().to_json().expect("serializable");
        assert_eq!(WriteLog::from_json(&json).expect("valid json"), sample_log());
        assert!(json.contains("preserve_mutes_and_memory"));
        assert_eq!(sample_log().last_sample(), Some(20));
        assert_eq!(sample_log().write_count(), 4);
    }

    #[test]
    fn test_save_and_load_by_extension() {
        let dir = tempfile::tempdir().expect("temp dir");
        for name in ["log.json", "log.crwl"] {
            let path = dir.path().join(name);
            sample_log().save(&path).expect("save");
            assert_eq!(WriteLog::load(&path).expect("load"), sample_log());
        }
    }
}
