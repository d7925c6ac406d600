//! DAC channel
//!
//! 12-bit sample channel clocked by an MCU timer. It plays 8-bit samples from
//! flash or RAM, or loops a 256-byte software wavetable, and can add a
//! procedural triangle or LFSR noise on top of the sample data or replace it
//! with a saw or pulse.

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::memory::{MemoryBank, SampleMemory};
use super::volume::VolumeLatch;
use crate::constants::{
    DAC_LFSR_SEED, DAC_MAX, DAC_MAX_AMPLITUDE_SHIFT, DAC_MIDPOINT, DAC_OUTPUT_SCALE,
    TIMER_ACC_MASK, TIMER_OVERFLOW, WAVETABLE_SIZE,
};
use crate::tables::LookupTables;

/// Mask for 24-bit sample addresses
const ADDRESS_MASK: u32 = 0xff_ffff;

/// Bit selecting the RAM bank in start-address and play-control values
const RAM_SELECT: u32 = 1 << 24;

/// 12-bit DAC LFSR mask
const DAC_LFSR_MASK: u16 = 0xfff;

bitflags! {
    /// Play-control register bits
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PlayFlags: u32 {
        /// Start (set) or stop (clear) playback
        const PLAY = 1 << 0;
        /// Loop the software wavetable instead of sample memory
        const WAVETABLE = 1 << 1;
        /// Loop the sample back to the loop point at its end
        const LOOP = 1 << 2;
        /// Read sample data from the RAM bank
        const RAM = RAM_SELECT;
    }
}

/// Procedural waveform mixed into DAC output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromPrimitive, Serialize, Deserialize)]
pub enum DacWaveform {
    /// Plain sample or wavetable data
    #[default]
    None = 0,
    /// 12-bit LFSR noise added to the data
    Noise = 1,
    /// Bouncing triangle counter added to the data
    Triangle = 2,
    /// Ramp from the playback phase, replaces the data
    Saw = 3,
    /// Pulse from the playback phase and duty, replaces the data
    Pulse = 4,
}

impl DacWaveform {
    /// Decode the low 3 bits of a waveform register value
    ///
    /// Codes without a waveform fall back to [`DacWaveform::None`].
    pub fn from_register(value: u32) -> Self {
        Self::from_u32(value & 0x7).unwrap_or_default()
    }
}

/// Sample / wavetable DAC channel
#[derive(Clone, Debug)]
pub struct DacChannel {
    start: u32,
    length: u32,
    loop_point: u32,
    /// Current read position
    pos: u32,
    wavetable: [u8; WAVETABLE_SIZE],
    /// 30-bit timer accumulator
    acc: u32,
    increment: u32,
    waveform: DacWaveform,
    duty: u8,
    playing: bool,
    looping: bool,
    wavetable_mode: bool,
    /// RAM selected by the start-address write
    start_ram: bool,
    /// RAM selected by the play-control write
    play_ram: bool,
    tri_counter: i32,
    tri_rising: bool,
    lfsr: u16,
    /// Noise/triangle amplitude shift (0..=11)
    amplitude: u8,
    /// 12-bit output value
    output: i32,
    volume: VolumeLatch,
}

impl DacChannel {
    /// Create a stopped channel at the output midpoint
    pub fn new() -> Self {
        Self {
            start: 0,
            length: 0,
            loop_point: 0,
            pos: 0,
            wavetable: [0; WAVETABLE_SIZE],
            acc: 0,
            increment: 0,
            waveform: DacWaveform::None,
            duty: 0,
            playing: false,
            looping: false,
            wavetable_mode: false,
            start_ram: false,
            play_ram: false,
            tri_counter: 0,
            tri_rising: true,
            lfsr: DAC_LFSR_SEED,
            amplitude: 0,
            output: DAC_MIDPOINT,
            volume: VolumeLatch::new(),
        }
    }

    /// Reset to power-on state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn bank(&self) -> MemoryBank {
        if self.start_ram || self.play_ram {
            MemoryBank::Ram
        } else {
            MemoryBank::Flash
        }
    }

    /// Position playback restarts from
    fn origin(&self) -> u32 {
        if self.wavetable_mode {
            0
        } else {
            self.start
        }
    }

    fn end(&self) -> u32 {
        self.start.saturating_add(self.length)
    }

    fn loop_point_in_range(&self) -> bool {
        (self.start..self.end()).contains(&self.loop_point)
    }

    /// Handle a play-control write
    pub fn play(&mut self, flags: PlayFlags) {
        if !flags.contains(PlayFlags::PLAY) {
            self.playing = false;
            return;
        }

        let wavetable = flags.contains(PlayFlags::WAVETABLE);
        self.looping = flags.contains(PlayFlags::LOOP);
        self.play_ram = flags.contains(PlayFlags::RAM);

        if self.playing && self.wavetable_mode == wavetable {
            return;
        }
        if !wavetable && self.length == 0 {
            self.playing = false;
            return;
        }

        self.wavetable_mode = wavetable;
        if !wavetable && !self.loop_point_in_range() {
            self.loop_point = self.start;
        }
        self.pos = self.origin();
        self.acc = 0;
        self.playing = true;
    }

    /// Set the sample start address (bit 24 selects RAM)
    ///
    /// RAM is read when either this write or the play-control write sets
    /// bit 24.
    pub fn set_start(&mut self, value: u32) {
        self.start = value & ADDRESS_MASK;
        self.start_ram = value & RAM_SELECT != 0;
        self.clamp_position();
    }

    /// Set the sample length in bytes
    pub fn set_length(&mut self, value: u32) {
        self.length = value & ADDRESS_MASK;
        self.clamp_position();
    }

    /// Keep a playing sample inside `[start, start + length)` after its
    /// region moved
    fn clamp_position(&mut self) {
        if !self.playing || self.wavetable_mode {
            return;
        }
        if self.length == 0 {
            self.playing = false;
        } else if self.pos < self.start {
            self.pos = self.start;
        } else if self.pos >= self.end() {
            self.wrap_at_end();
        }
    }

    /// Past the end: back to the loop point when looping, else stop
    fn wrap_at_end(&mut self) {
        if self.looping {
            self.pos = if self.loop_point_in_range() {
                self.loop_point
            } else {
                self.start
            };
        } else {
            self.playing = false;
        }
    }

    /// Set the loop point address
    pub fn set_loop_point(&mut self, value: u32) {
        self.loop_point = value & ADDRESS_MASK;
    }

    /// Set the timer increment (clamped to one overflow per step)
    #[inline]
    pub fn set_frequency(&mut self, increment: u32) {
        self.increment = increment.min(TIMER_OVERFLOW);
    }

    /// Set waveform (bits 0..2) and pulse duty (bits 8..15)
    pub fn set_waveform_and_duty(&mut self, value: u32) {
        self.waveform = DacWaveform::from_register(value);
        self.duty = (value >> 8) as u8;
    }

    /// Write one wavetable byte (bits 8..15 index, bits 0..7 data)
    pub fn write_wavetable_byte(&mut self, value: u32) {
        let index = ((value >> 8) & 0xff) as usize;
        self.wavetable[index] = value as u8;
    }

    /// Set the noise/triangle amplitude shift (taken modulo 12)
    pub fn set_amplitude(&mut self, value: u32) {
        self.amplitude = (value % (DAC_MAX_AMPLITUDE_SHIFT as u32 + 1)) as u8;
        self.tri_counter = self.tri_counter.min(self.triangle_peak());
    }

    /// Request a volume change
    #[inline]
    pub fn set_volume(&mut self, code: u8) {
        self.volume.set(code);
    }

    /// Enable or disable zero-cross deferral
    #[inline]
    pub fn set_zero_cross(&mut self, enabled: bool) {
        self.volume.set_deferred(enabled);
    }

    /// Move the read position back to the start (or wavetable index 0)
    pub fn reset_position(&mut self) {
        self.pos = self.origin();
    }

    fn triangle_peak(&self) -> i32 {
        1 << self.amplitude
    }

    fn step_triangle(&mut self) {
        let peak = self.triangle_peak();
        if self.tri_rising {
            if self.tri_counter >= peak {
                self.tri_rising = false;
                self.tri_counter -= 1;
            } else {
                self.tri_counter += 1;
            }
        } else if self.tri_counter <= 0 {
            self.tri_rising = true;
            self.tri_counter += 1;
        } else {
            self.tri_counter -= 1;
        }
    }

    /// x^12 + x^6 + x^4 + x + 1
    fn step_lfsr(&mut self) {
        let l = self.lfsr;
        let bit = ((l >> 11) ^ (l >> 5) ^ (l >> 3) ^ l) & 1;
        self.lfsr = ((l << 1) & DAC_LFSR_MASK) | bit;
    }

    fn advance_position(&mut self) {
        if self.wavetable_mode {
            self.pos = (self.pos + 1) % WAVETABLE_SIZE as u32;
            return;
        }

        self.pos += 1;
        if self.pos >= self.end() {
            self.wrap_at_end();
        }
    }

    /// Advance one internal step
    pub fn clock_step(&mut self, memory: &SampleMemory) {
        if !self.playing || self.increment == 0 {
            return;
        }

        let sum = self.acc + self.increment;
        self.acc = sum & TIMER_ACC_MASK;
        if sum < TIMER_OVERFLOW {
            return;
        }

        let byte = if self.wavetable_mode {
            self.wavetable[self.pos as usize % WAVETABLE_SIZE]
        } else {
            memory.read(self.bank(), self.pos)
        };
        let base = (byte as i32) << 4;
        let phase = (self.pos.wrapping_sub(self.origin()) & 0xff) as i32;

        let value = match self.waveform {
            DacWaveform::None => base,
            DacWaveform::Triangle => {
                self.step_triangle();
                base + self.tri_counter
            }
            DacWaveform::Noise => {
                self.step_lfsr();
                let mask = (1i32 << (self.amplitude + 1)) - 1;
                base + (self.lfsr as i32 & mask)
            }
            DacWaveform::Saw => phase << 4,
            DacWaveform::Pulse => {
                if phase < self.duty as i32 {
                    DAC_MAX
                } else {
                    0
                }
            }
        };

        let was_high = self.output > DAC_MIDPOINT;
        self.output = value.clamp(0, DAC_MAX);
        if (self.output > DAC_MIDPOINT) != was_high {
            self.volume.commit_crossing();
        }

        self.advance_position();
    }

    /// Signed channel output for the mix stage
    #[inline]
    pub fn output(&self, tables: &LookupTables) -> i32 {
        let centered = (self.output - DAC_MIDPOINT) * DAC_OUTPUT_SCALE;
        (centered as f32 * tables.gain(self.volume.active())) as i32
    }

    /// Current read position
    pub fn position(&self) -> u32 {
        self.pos
    }

    /// Raw 12-bit output value
    pub fn level(&self) -> i32 {
        self.output
    }

    /// Whether the channel is playing
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Effective loop point
    pub fn loop_point(&self) -> u32 {
        self.loop_point
    }

    /// Selected procedural waveform
    pub fn waveform(&self) -> DacWaveform {
        self.waveform
    }

    /// 12-bit noise LFSR state
    pub fn lfsr(&self) -> u16 {
        self.lfsr
    }

    /// Software wavetable
    pub fn wavetable(&self) -> &[u8; WAVETABLE_SIZE] {
        &self.wavetable
    }

    /// Volume register
    pub fn volume(&self) -> &VolumeLatch {
        &self.volume
    }
}

impl Default for DacChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::memory::SampleData;

    fn ramp_memory() -> SampleMemory {
        let mut mem = SampleMemory::new();
        let data: Vec<u8> = (0..=255u8).collect();
        mem.render(&[SampleData::new("ramp", MemoryBank::Flash, data)]);
        mem
    }

    fn playing_sample(start: u32, length: u32, flags: PlayFlags) -> DacChannel {
        let mut ch = DacChannel::new();
        ch.set_start(start);
        ch.set_length(length);
        ch.set_frequency(TIMER_OVERFLOW);
        ch.play(PlayFlags::PLAY | flags);
        ch
    }

    #[test]
    fn test_reads_sample_bytes() {
        let mem = ramp_memory();
        let mut ch = playing_sample(10, 20, PlayFlags::empty());
        ch.clock_step(&mem);
        assert_eq!(ch.level(), 10 << 4);
        assert_eq!(ch.position(), 11);
    }

    #[test]
    fn test_loop_wraps_to_loop_point() {
        let mem = ramp_memory();
        let mut ch = DacChannel::new();
        ch.set_start(100);
        ch.set_length(50);
        ch.set_loop_point(120);
        ch.set_frequency(TIMER_OVERFLOW);
        ch.play(PlayFlags::PLAY | PlayFlags::LOOP);

        let mut read = Vec::new();
        for _ in 0..80 {
            read.push((ch.level(), ch.position()));
            ch.clock_step(&mem);
        }
        let positions: Vec<u32> = read.iter().map(|&(_, p)| p).collect();
        let expected: Vec<u32> = (100..150).chain(120..150).collect();
        assert_eq!(positions, expected);
    }

    #[test]
    fn test_one_shot_stops_and_latches() {
        let mem = ramp_memory();
        let mut ch = playing_sample(5, 3, PlayFlags::empty());
        for _ in 0..3 {
            ch.clock_step(&mem);
        }
        assert!(!ch.is_playing());
        assert_eq!(ch.level(), 7 << 4);
        ch.clock_step(&mem);
        assert_eq!(ch.level(), 7 << 4);
    }

    #[test]
    fn test_zero_length_does_not_start() {
        let ch = playing_sample(0, 0, PlayFlags::empty());
        assert!(!ch.is_playing());
    }

    #[test]
    fn test_loop_point_clamped_on_start() {
        let mut ch = DacChannel::new();
        ch.set_start(100);
        ch.set_length(10);
        ch.set_loop_point(500);
        ch.play(PlayFlags::PLAY | PlayFlags::LOOP);
        assert_eq!(ch.loop_point(), 100);
    }

    #[test]
    fn test_replay_same_mode_keeps_position() {
        let mem = ramp_memory();
        let mut ch = playing_sample(0, 100, PlayFlags::empty());
        ch.clock_step(&mem);
        ch.clock_step(&mem);
        ch.play(PlayFlags::PLAY | PlayFlags::LOOP);
        assert_eq!(ch.position(), 2);

        ch.play(PlayFlags::PLAY | PlayFlags::WAVETABLE);
        assert_eq!(ch.position(), 0);
    }

    #[test]
    fn test_wavetable_wraps_at_256() {
        let mem = SampleMemory::new();
        let mut ch = DacChannel::new();
        ch.write_wavetable_byte((255 << 8) | 0xff);
        ch.set_frequency(TIMER_OVERFLOW);
        ch.play(PlayFlags::PLAY | PlayFlags::WAVETABLE);
        assert_eq!(ch.wavetable()[255], 0xff);

        for _ in 0..255 {
            ch.clock_step(&mem);
        }
        assert_eq!(ch.position(), 255);
        ch.clock_step(&mem);
        assert_eq!(ch.level(), 0xff << 4);
        assert_eq!(ch.position(), 0);
    }

    #[test]
    fn test_saw_and_pulse_replace_data() {
        let mem = SampleMemory::new();
        let mut ch = DacChannel::new();
        ch.set_frequency(TIMER_OVERFLOW);
        ch.set_waveform_and_duty(DacWaveform::Saw as u32);
        ch.play(PlayFlags::PLAY | PlayFlags::WAVETABLE);
        for _ in 0..3 {
            ch.clock_step(&mem);
        }
        assert_eq!(ch.level(), 2 << 4);

        ch.set_waveform_and_duty((4 << 8) | DacWaveform::Pulse as u32);
        ch.clock_step(&mem); // phase 3
        assert_eq!(ch.level(), DAC_MAX);
        ch.clock_step(&mem); // phase 4
        assert_eq!(ch.level(), 0);
    }

    #[test]
    fn test_triangle_bounces() {
        let mem = SampleMemory::new();
        let mut ch = DacChannel::new();
        ch.set_frequency(TIMER_OVERFLOW);
        ch.set_amplitude(1);
        ch.set_waveform_and_duty(DacWaveform::Triangle as u32);
        ch.play(PlayFlags::PLAY | PlayFlags::WAVETABLE);

        let mut seen = Vec::new();
        for _ in 0..8 {
            ch.clock_step(&mem);
            seen.push(ch.level());
        }
        assert_eq!(seen, vec![1, 2, 1, 0, 1, 2, 1, 0]);
    }

    #[test]
    fn test_noise_bounded_by_amplitude() {
        let mem = SampleMemory::new();
        let mut ch = DacChannel::new();
        ch.set_frequency(TIMER_OVERFLOW);
        ch.set_amplitude(3);
        ch.set_waveform_and_duty(DacWaveform::Noise as u32);
        ch.play(PlayFlags::PLAY | PlayFlags::WAVETABLE);
        for _ in 0..1000 {
            ch.clock_step(&mem);
            assert!(ch.level() < 16);
            assert_ne!(ch.lfsr(), 0);
        }
    }

    #[test]
    fn test_amplitude_wraps_modulo_12() {
        let mut ch = DacChannel::new();
        ch.set_amplitude(12);
        ch.set_waveform_and_duty(DacWaveform::Triangle as u32);
        assert_eq!(ch.triangle_peak(), 1);
    }

    #[test]
    fn test_reset_position_returns_to_start() {
        let mem = ramp_memory();
        let mut ch = playing_sample(40, 50, PlayFlags::LOOP);
        for _ in 0..7 {
            ch.clock_step(&mem);
        }
        ch.reset_position();
        assert_eq!(ch.position(), 40);
    }

    #[test]
    fn test_deferred_volume_on_midpoint_crossing() {
        let mut mem = SampleMemory::new();
        mem.render(&[SampleData::new("x", MemoryBank::Ram, vec![0x90, 0x90, 0x10])]);
        let mut ch = DacChannel::new();
        ch.set_start(RAM_SELECT);
        ch.set_length(3);
        ch.set_frequency(TIMER_OVERFLOW);
        ch.set_zero_cross(true);
        ch.play(PlayFlags::PLAY | PlayFlags::RAM);

        ch.clock_step(&mem); // 2047 -> above midpoint
        ch.set_volume(180);
        ch.clock_step(&mem); // still above
        assert_eq!(ch.volume().active(), 0);
        ch.clock_step(&mem); // below midpoint
        assert_eq!(ch.volume().active(), 180);
    }

    #[test]
    fn test_moved_start_keeps_position_in_region() {
        let mem = ramp_memory();
        let mut ch = playing_sample(0, 10, PlayFlags::LOOP);
        for _ in 0..5 {
            ch.clock_step(&mem);
        }
        ch.set_start(1000);
        assert_eq!(ch.position(), 1000);

        for _ in 0..50 {
            assert!(ch.is_playing());
            assert!((1000..1010).contains(&ch.position()));
            ch.clock_step(&mem);
        }
    }

    #[test]
    fn test_shortened_length_wraps_or_stops() {
        let mem = ramp_memory();
        let mut looped = playing_sample(20, 30, PlayFlags::LOOP);
        let mut one_shot = playing_sample(20, 30, PlayFlags::empty());
        for _ in 0..15 {
            looped.clock_step(&mem);
            one_shot.clock_step(&mem);
        }

        looped.set_length(10);
        assert_eq!(looped.position(), 20);
        assert!(looped.is_playing());

        one_shot.set_length(10);
        assert!(!one_shot.is_playing());

        looped.set_length(0);
        assert!(!looped.is_playing());
    }

    #[test]
    fn test_ram_selected_by_start_or_play() {
        let mut mem = SampleMemory::new();
        mem.render(&[
            SampleData::new("flash", MemoryBank::Flash, vec![0x10]),
            SampleData::new("ram", MemoryBank::Ram, vec![0x20]),
        ]);

        let mut by_start = playing_sample(RAM_SELECT, 1, PlayFlags::empty());
        by_start.clock_step(&mem);
        assert_eq!(by_start.level(), 0x20 << 4);

        let mut by_play = playing_sample(0, 1, PlayFlags::RAM);
        by_play.clock_step(&mem);
        assert_eq!(by_play.level(), 0x20 << 4);

        let mut flash = playing_sample(0, 1, PlayFlags::empty());
        flash.clock_step(&mem);
        assert_eq!(flash.level(), 0x10 << 4);
    }

    #[test]
    fn test_output_idle_is_silent() {
        let tables = LookupTables::new();
        let mut ch = DacChannel::new();
        ch.set_volume(255);
        assert_eq!(ch.output(&tables), 0);
    }
}
