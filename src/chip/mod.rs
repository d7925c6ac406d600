//! CrapSynth chip core
//!
//! Owns every channel, the phase-reset timers, the sample memory and the
//! lookup tables. One call to [`CrapSynth::clock`] advances the whole chip by
//! a single internal step (one output sample at the default rate).

pub mod dac;
pub mod dds;
pub mod memory;
pub mod noise;
pub mod volume;

pub use dac::{DacChannel, DacWaveform, PlayFlags};
pub use dds::{DdsChannel, DdsWaveform};
pub use memory::{MemoryBank, SampleData, SampleMemory, SamplePlacement};
pub use noise::NoiseChannel;
pub use volume::VolumeLatch;

use log::debug;

use crate::constants::{FIRST_DAC_CHANNEL, MAX_AUDIO_CHANNELS, MAX_DAC_CHANNELS, NOISE_CHANNEL};
use crate::registers::{
    DacCommand, DdsCommand, NoiseCommand, Register, RegisterWrite, Revision, TimerCommand,
};
use crate::tables::LookupTables;
use crate::timer::{ChannelMask, TimerBank};

/// CrapSynth sound chip
///
/// Four DDS tone channels, one LFSR noise channel, two or three DAC channels
/// (depending on [`Revision`]) and five phase-reset timers.
///
/// # Example
///
/// ```
/// use crapsynth::{CrapSynth, RegisterWrite};
///
/// let mut chip = CrapSynth::default();
///
/// // DDS channel 0: full volume sine
/// chip.write(RegisterWrite::new(0, 0, 255));
/// chip.write(RegisterWrite::new(0, 1, 1));
/// chip.write(RegisterWrite::new(0, 2, 1 << 20));
///
/// chip.clock();
/// let sample = chip.master_output();
/// # let _ = sample;
/// ```
#[derive(Clone, Debug)]
pub struct CrapSynth {
    revision: Revision,
    tables: LookupTables,
    memory: SampleMemory,

    dds: [DdsChannel; 4],
    noise: NoiseChannel,
    dac: [DacChannel; MAX_DAC_CHANNELS],
    timers: TimerBank,

    muted: [bool; MAX_AUDIO_CHANNELS],
    outputs: [i32; MAX_AUDIO_CHANNELS],
    master: i32,
}

impl CrapSynth {
    /// Create a chip of the given revision
    pub fn new(revision: Revision) -> Self {
        Self {
            revision,
            tables: LookupTables::new(),
            memory: SampleMemory::new(),
            dds: Default::default(),
            noise: NoiseChannel::new(),
            dac: Default::default(),
            timers: TimerBank::new(),
            muted: [false; MAX_AUDIO_CHANNELS],
            outputs: [0; MAX_AUDIO_CHANNELS],
            master: 0,
        }
    }

    /// Chip revision
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Number of audio channels for this revision
    pub fn audio_channel_count(&self) -> usize {
        self.revision.audio_channel_count()
    }

    /// Reset every channel and timer
    ///
    /// With `preserve_mutes_and_memory` the sample memory and mute flags
    /// survive (soft reset); otherwise both are cleared as well.
    pub fn reset(&mut self, preserve_mutes_and_memory: bool) {
        self.tables.recalc();

        for ch in &mut self.dds {
            ch.reset();
        }
        self.noise.reset();
        for ch in &mut self.dac {
            ch.reset();
        }
        self.timers.reset();

        self.outputs = [0; MAX_AUDIO_CHANNELS];
        self.master = 0;

        if !preserve_mutes_and_memory {
            self.memory.clear();
            self.muted = [false; MAX_AUDIO_CHANNELS];
        }
    }

    /// Apply a register write immediately
    ///
    /// Bypasses the rate-limited write queue, which is what setup code and
    /// tests want. Writes to unknown channels or commands are ignored.
    ///
    /// # Returns
    ///
    /// `true` if the write addressed a known register
    pub fn write(&mut self, write: RegisterWrite) -> bool {
        let Some(register) = Register::decode(self.revision, write.channel, write.command) else {
            debug!(
                "ignored register write: channel {} command {} value {:#x}",
                write.channel, write.command, write.value
            );
            return false;
        };

        let value = write.value;
        match register {
            Register::Dds(n, command) => self.write_dds(n, command, value),
            Register::Noise(command) => self.write_noise(command, value),
            Register::Dac(n, command) => self.write_dac(n, command, value),
            Register::Timer(n, command) => self.write_timer(n, command, value),
        }
        true
    }

    fn write_dds(&mut self, n: usize, command: DdsCommand, value: u32) {
        match command {
            DdsCommand::Volume => self.dds[n].set_volume(value as u8),
            DdsCommand::Waveform => self.dds[n].set_waveform(DdsWaveform::from_register(value)),
            DdsCommand::Frequency => self.dds[n].set_frequency(value),
            DdsCommand::PhaseReset => self.dds[n].phase_reset(),
            DdsCommand::PwmFrequency => self.dds[n].set_timer_frequency(value),
            DdsCommand::Duty => self.dds[n].set_duty(value as u16),
            DdsCommand::ZeroCross => {
                // Channel pairs 0/1 and 2/3 share one zero-cross setting
                let enabled = value & 1 != 0;
                self.dds[n].set_zero_cross(enabled);
                self.dds[n ^ 1].set_zero_cross(enabled);
            }
        }
    }

    fn write_noise(&mut self, command: NoiseCommand, value: u32) {
        let noise = &mut self.noise;
        match command {
            NoiseCommand::Volume => noise.set_volume(value as u8),
            NoiseCommand::ClockSource => noise.set_internal_clock(value != 0),
            NoiseCommand::Reseed => noise.reseed(value),
            NoiseCommand::Frequency => noise.set_frequency(value),
            NoiseCommand::ZeroCross => noise.set_zero_cross(value & 1 != 0),
        }
    }

    fn write_dac(&mut self, n: usize, command: DacCommand, value: u32) {
        let dac = &mut self.dac[n];
        match command {
            DacCommand::Volume => dac.set_volume(value as u8),
            DacCommand::Play => dac.play(PlayFlags::from_bits_truncate(value)),
            DacCommand::Start => dac.set_start(value),
            DacCommand::PositionReset => dac.reset_position(),
            DacCommand::Frequency => dac.set_frequency(value),
            DacCommand::ZeroCross => dac.set_zero_cross(value & 1 != 0),
            DacCommand::LoopPoint => dac.set_loop_point(value),
            DacCommand::Length => dac.set_length(value),
            DacCommand::WaveformDuty => dac.set_waveform_and_duty(value),
            DacCommand::WavetableByte => dac.write_wavetable_byte(value),
            DacCommand::Amplitude => dac.set_amplitude(value),
        }
    }

    fn write_timer(&mut self, n: usize, command: TimerCommand, value: u32) {
        let Some(timer) = self.timers.timer_mut(n) else {
            return;
        };
        match command {
            TimerCommand::Mask => timer.set_mask(value),
            TimerCommand::Frequency => timer.set_frequency(value),
            TimerCommand::ResetAccumulator => timer.reset_accumulator(),
            TimerCommand::Enable => timer.set_enabled(value != 0),
        }
    }

    /// Advance the chip by one internal step and refresh the outputs
    pub fn clock(&mut self) {
        for ch in &mut self.dds {
            ch.clock_step(&self.tables);
        }
        self.noise.clock_step();
        let dac_count = self.revision.dac_count();
        for ch in &mut self.dac[..dac_count] {
            ch.clock_step(&self.memory);
        }

        // Timer ISRs run after the channel updates
        let resets = self.timers.clock(self.noise.is_internal_clock());
        if !resets.is_empty() {
            self.apply_phase_reset(resets);
        }

        self.update_outputs();
    }

    fn apply_phase_reset(&mut self, mask: ChannelMask) {
        for (i, ch) in self.dds.iter_mut().enumerate() {
            if mask.has_channel(i) {
                ch.phase_reset();
            }
        }
        if mask.has_channel(NOISE_CHANNEL) {
            self.noise.phase_reset();
        }
        let dac_count = self.revision.dac_count();
        for (i, ch) in self.dac[..dac_count].iter_mut().enumerate() {
            if mask.has_channel(FIRST_DAC_CHANNEL + i) {
                ch.reset_position();
            }
        }
    }

    fn update_outputs(&mut self) {
        let count = self.audio_channel_count();
        let tables = &self.tables;

        for (i, out) in self.outputs.iter_mut().enumerate().take(count) {
            *out = if self.muted[i] {
                0
            } else if i < NOISE_CHANNEL {
                self.dds[i].output(tables)
            } else if i == NOISE_CHANNEL {
                self.noise.output(tables)
            } else {
                self.dac[i - FIRST_DAC_CHANNEL].output(tables)
            };
        }

        self.master = self.outputs[..count].iter().sum();
    }

    /// Mute or unmute an audio channel
    ///
    /// Out-of-range channels are ignored.
    pub fn set_muted(&mut self, channel: usize, muted: bool) {
        if channel < self.audio_channel_count() {
            self.muted[channel] = muted;
        }
    }

    /// Whether an audio channel is muted
    pub fn is_muted(&self, channel: usize) -> bool {
        self.muted.get(channel).copied().unwrap_or(false)
    }

    /// Last output of one audio channel
    pub fn channel_output(&self, channel: usize) -> i32 {
        if channel < self.audio_channel_count() {
            self.outputs[channel]
        } else {
            0
        }
    }

    /// Last outputs of all audio channels of this revision
    pub fn channel_outputs(&self) -> &[i32] {
        &self.outputs[..self.audio_channel_count()]
    }

    /// Sum of all unmuted channel outputs from the last step
    pub fn master_output(&self) -> i32 {
        self.master
    }

    /// Pack samples into flash and RAM, replacing previous contents
    pub fn render_sample_memory(&mut self, samples: &[SampleData]) -> Vec<SamplePlacement> {
        self.memory.render(samples)
    }

    /// Bytes used in a sample bank
    pub fn memory_usage(&self, bank: MemoryBank) -> usize {
        self.memory.memory_usage(bank)
    }

    /// Sample memory
    pub fn memory(&self) -> &SampleMemory {
        &self.memory
    }

    /// Lookup tables
    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// DDS channel by index
    pub fn dds(&self, n: usize) -> Option<&DdsChannel> {
        self.dds.get(n)
    }

    /// Noise channel
    pub fn noise(&self) -> &NoiseChannel {
        &self.noise
    }

    /// DAC channel by index (only those present in this revision)
    pub fn dac(&self, n: usize) -> Option<&DacChannel> {
        self.dac[..self.revision.dac_count()].get(n)
    }

    /// Phase-reset timers
    pub fn timers(&self) -> &TimerBank {
        &self.timers
    }
}

impl Default for CrapSynth {
    fn default() -> Self {
        Self::new(Revision::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TIMER_OVERFLOW;

    fn w(channel: u8, command: u8, value: u32) -> RegisterWrite {
        RegisterWrite::new(channel, command, value)
    }

    #[test]
    fn test_chip_creation() {
        let chip = CrapSynth::default();
        assert_eq!(chip.revision(), Revision::Rev2);
        assert_eq!(chip.audio_channel_count(), 8);
        assert_eq!(chip.master_output(), 0);
        assert!(chip.dac(2).is_some());
        assert!(CrapSynth::new(Revision::Rev1).dac(2).is_none());
    }

    #[test]
    fn test_dds_dispatch() {
        let mut chip = CrapSynth::default();
        assert!(chip.write(w(2, 2, 777)));
        assert!(chip.write(w(2, 1, 4)));
        assert!(chip.write(w(2, 5, 0x1_2345)));
        let dds = chip.dds(2).expect("channel 2");
        assert_eq!(dds.frequency(), 777);
        assert_eq!(dds.waveform(), DdsWaveform::SquareHalf);
        assert_eq!(dds.duty(), 0x2345);
    }

    #[test]
    fn test_unknown_write_ignored() {
        let mut chip = CrapSynth::default();
        assert!(!chip.write(w(4, 2, 1)));
        assert!(!chip.write(w(99, 0, 1)));
    }

    #[test]
    fn test_zero_cross_shared_by_pair() {
        let mut chip = CrapSynth::default();
        chip.write(w(3, 6, 1));
        assert!(chip.dds(2).map(|c| c.volume().is_deferred()).unwrap_or(false));
        assert!(chip.dds(3).map(|c| c.volume().is_deferred()).unwrap_or(false));
        assert!(!chip.dds(0).map(|c| c.volume().is_deferred()).unwrap_or(true));
    }

    #[test]
    fn test_rev1_channel_7_is_timer() {
        let mut chip = CrapSynth::new(Revision::Rev1);
        chip.write(w(7, 1, 1234));
        assert_eq!(chip.timers().timer(0).map(|t| t.frequency()), Some(1234));
    }

    #[test]
    fn test_noise_clock_source() {
        let mut chip = CrapSynth::default();
        chip.write(w(4, 4, 99));
        chip.write(w(4, 1, 1));
        assert!(chip.noise().is_internal_clock());
        chip.write(w(4, 1, 0));
        assert_eq!(chip.noise().increment(), 99);
    }

    #[test]
    fn test_mute_excludes_from_master() {
        let mut chip = CrapSynth::default();
        for ch in 0..2u8 {
            chip.write(w(ch, 0, 255));
            chip.write(w(ch, 1, 3));
            chip.write(w(ch, 2, 1 << 20));
        }
        chip.clock();
        let both = chip.master_output();
        assert_eq!(both, chip.channel_output(0) + chip.channel_output(1));

        chip.set_muted(1, true);
        chip.clock();
        assert_eq!(chip.channel_output(1), 0);
        assert_eq!(chip.master_output(), chip.channel_output(0));
    }

    #[test]
    fn test_timer_resets_masked_channels_only() {
        let mut chip = CrapSynth::default();
        for ch in 0..4u8 {
            chip.write(w(ch, 1, 1));
            chip.write(w(ch, 2, 1000));
        }
        chip.write(w(8, 0, 0b0101));
        chip.write(w(8, 1, TIMER_OVERFLOW / 4));
        chip.write(w(8, 3, 1));

        for _ in 0..4 {
            chip.clock();
        }
        let accs: Vec<u32> = (0..4)
            .filter_map(|n| chip.dds(n).map(|c| c.accumulator()))
            .collect();
        assert_eq!(accs, vec![0, 4000, 0, 4000]);
    }

    #[test]
    fn test_soft_and_hard_reset() {
        let mut chip = CrapSynth::default();
        chip.render_sample_memory(&[SampleData::new("s", MemoryBank::Flash, vec![1; 64])]);
        chip.set_muted(3, true);
        chip.write(w(0, 2, 500));

        chip.reset(true);
        assert_eq!(chip.memory_usage(MemoryBank::Flash), 64);
        assert!(chip.is_muted(3));
        assert_eq!(chip.dds(0).map(|c| c.frequency()), Some(0));

        chip.reset(false);
        assert_eq!(chip.memory_usage(MemoryBank::Flash), 0);
        assert!(!chip.is_muted(3));
    }
}
