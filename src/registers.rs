//! Register address map
//!
//! A register write addresses a channel (high byte) and a command (low byte)
//! and carries a 32-bit value. Writes are decoded once into a typed
//! [`Register`] and dispatched by the chip with a `match`.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_DAC_CHANNELS, NUM_DDS_CHANNELS, NUM_TIMERS};

/// Chip revision, which fixes the number of DAC channels and the address map
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Revision {
    /// Two DAC channels; timers at channels 7..=11
    Rev1,
    /// Three DAC channels; timers at channels 8..=12
    #[default]
    Rev2,
}

impl Revision {
    /// Number of DAC channels
    pub const fn dac_count(self) -> usize {
        match self {
            Revision::Rev1 => 2,
            Revision::Rev2 => MAX_DAC_CHANNELS,
        }
    }

    /// Number of audio channels (DDS + noise + DAC)
    pub const fn audio_channel_count(self) -> usize {
        NUM_DDS_CHANNELS + 1 + self.dac_count()
    }

    /// Channel index of the first phase-reset timer
    pub const fn first_timer_channel(self) -> usize {
        self.audio_channel_count()
    }

    /// Total number of addressable channels
    pub const fn channel_count(self) -> usize {
        self.first_timer_channel() + NUM_TIMERS
    }

    /// Map a channel index to the component it addresses
    pub fn channel_id(self, channel: u8) -> Option<ChannelId> {
        let channel = channel as usize;
        let noise = NUM_DDS_CHANNELS;
        let first_dac = noise + 1;
        let first_timer = self.first_timer_channel();

        match channel {
            c if c < noise => Some(ChannelId::Dds(c)),
            c if c == noise => Some(ChannelId::Noise),
            c if c < first_timer => Some(ChannelId::Dac(c - first_dac)),
            c if c < self.channel_count() => Some(ChannelId::Timer(c - first_timer)),
            _ => None,
        }
    }

    /// Channel index of a component
    pub fn channel_index(self, id: ChannelId) -> u8 {
        let index = match id {
            ChannelId::Dds(n) => n,
            ChannelId::Noise => NUM_DDS_CHANNELS,
            ChannelId::Dac(n) => NUM_DDS_CHANNELS + 1 + n,
            ChannelId::Timer(n) => self.first_timer_channel() + n,
        };
        index as u8
    }
}

/// Component addressed by a channel index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// DDS tone channel 0..=3
    Dds(usize),
    /// Noise channel
    Noise,
    /// DAC channel 0..=2
    Dac(usize),
    /// Phase-reset timer 0..=4
    Timer(usize),
}

/// DDS channel commands
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[allow(missing_docs)]
pub enum DdsCommand {
    Volume = 0,
    Waveform = 1,
    Frequency = 2,
    PhaseReset = 3,
    PwmFrequency = 4,
    Duty = 5,
    ZeroCross = 6,
}

/// Noise channel commands
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[allow(missing_docs)]
pub enum NoiseCommand {
    Volume = 0,
    ClockSource = 1,
    Reseed = 3,
    Frequency = 4,
    ZeroCross = 6,
}

/// DAC channel commands
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[allow(missing_docs)]
pub enum DacCommand {
    Volume = 0,
    Play = 1,
    Start = 2,
    PositionReset = 3,
    Frequency = 4,
    ZeroCross = 6,
    LoopPoint = 7,
    Length = 8,
    WaveformDuty = 9,
    WavetableByte = 10,
    Amplitude = 11,
}

/// Phase-reset timer commands
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
#[allow(missing_docs)]
pub enum TimerCommand {
    Mask = 0,
    Frequency = 1,
    ResetAccumulator = 2,
    Enable = 3,
}

/// Decoded register: target component and typed command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    /// DDS channel register
    Dds(usize, DdsCommand),
    /// Noise channel register
    Noise(NoiseCommand),
    /// DAC channel register
    Dac(usize, DacCommand),
    /// Phase-reset timer register
    Timer(usize, TimerCommand),
}

impl Register {
    /// Decode a channel/command pair for a chip revision
    ///
    /// Returns `None` for unknown channels or command numbers.
    pub fn decode(revision: Revision, channel: u8, command: u8) -> Option<Self> {
        let command = command as u32;
        match revision.channel_id(channel)? {
            ChannelId::Dds(n) => DdsCommand::from_u32(command).map(|c| Register::Dds(n, c)),
            ChannelId::Noise => NoiseCommand::from_u32(command).map(Register::Noise),
            ChannelId::Dac(n) => DacCommand::from_u32(command).map(|c| Register::Dac(n, c)),
            ChannelId::Timer(n) => TimerCommand::from_u32(command).map(|c| Register::Timer(n, c)),
        }
    }
}

/// One register write as issued by the sequencer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterWrite {
    /// Channel index (see [`Revision::channel_id`])
    pub channel: u8,
    /// Command number within the channel
    pub command: u8,
    /// Register value
    pub value: u32,
}

impl RegisterWrite {
    /// Create a write
    pub const fn new(channel: u8, command: u8, value: u32) -> Self {
        Self {
            channel,
            command,
            value,
        }
    }

    /// Packed register-dump address: `(channel << 8) | command`
    pub const fn address(&self) -> u16 {
        ((self.channel as u16) << 8) | self.command as u16
    }

    /// Build a write from a packed address
    pub const fn from_address(address: u16, value: u32) -> Self {
        Self::new((address >> 8) as u8, address as u8, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rev2_channel_map() {
        let rev = Revision::Rev2;
        assert_eq!(rev.channel_id(0), Some(ChannelId::Dds(0)));
        assert_eq!(rev.channel_id(4), Some(ChannelId::Noise));
        assert_eq!(rev.channel_id(7), Some(ChannelId::Dac(2)));
        assert_eq!(rev.channel_id(8), Some(ChannelId::Timer(0)));
        assert_eq!(rev.channel_id(12), Some(ChannelId::Timer(4)));
        assert_eq!(rev.channel_id(13), None);
    }

    #[test]
    fn test_rev1_channel_map() {
        let rev = Revision::Rev1;
        assert_eq!(rev.audio_channel_count(), 7);
        assert_eq!(rev.channel_id(6), Some(ChannelId::Dac(1)));
        assert_eq!(rev.channel_id(7), Some(ChannelId::Timer(0)));
        assert_eq!(rev.channel_id(11), Some(ChannelId::Timer(4)));
        assert_eq!(rev.channel_id(12), None);
    }

    #[test]
    fn test_channel_index_roundtrip() {
        for rev in [Revision::Rev1, Revision::Rev2] {
            for ch in 0..rev.channel_count() as u8 {
                let id = rev.channel_id(ch).expect("valid channel");
                assert_eq!(rev.channel_index(id), ch);
            }
        }
    }

    #[test]
    fn test_decode_commands() {
        let rev = Revision::Rev2;
        assert_eq!(
            Register::decode(rev, 1, 2),
            Some(Register::Dds(1, DdsCommand::Frequency))
        );
        assert_eq!(
            Register::decode(rev, 4, 3),
            Some(Register::Noise(NoiseCommand::Reseed))
        );
        assert_eq!(
            Register::decode(rev, 5, 10),
            Some(Register::Dac(0, DacCommand::WavetableByte))
        );
        assert_eq!(
            Register::decode(rev, 9, 3),
            Some(Register::Timer(1, TimerCommand::Enable))
        );
    }

    #[test]
    fn test_decode_unknown() {
        let rev = Revision::Rev2;
        assert_eq!(Register::decode(rev, 4, 2), None);
        assert_eq!(Register::decode(rev, 0, 7), None);
        assert_eq!(Register::decode(rev, 200, 0), None);
    }

    #[test]
    fn test_address_packing() {
        let write = RegisterWrite::new(5, 10, 0x1234);
        assert_eq!(write.address(), 0x050a);
        assert_eq!(RegisterWrite::from_address(0x050a, 0x1234), write);
    }
}
