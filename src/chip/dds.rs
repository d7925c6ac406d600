//! DDS tone channel
//!
//! Models one AD9833-style direct digital synthesis generator: a 28-bit phase
//! accumulator mapped to a 10-bit waveform, plus the MCU timer that drives the
//! PWM waveform variant.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::volume::VolumeLatch;
use crate::constants::{
    ACC_BITS, ACC_MASK, DDS_MAX, DDS_MIDPOINT, DDS_OUTPUT_SCALE, TIMER_ACC_BITS, TIMER_ACC_MASK,
    ZERO_CROSS_TOLERANCE,
};
use crate::tables::LookupTables;

/// Number of selectable DDS waveforms
const NUM_WAVEFORMS: u32 = 6;

/// Waveform produced by a DDS channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromPrimitive, Serialize, Deserialize)]
pub enum DdsWaveform {
    /// Silent
    #[default]
    None = 0,
    /// Table sine
    Sine = 1,
    /// Triangle from the accumulator bits
    Triangle = 2,
    /// Square wave at full amplitude
    SquareFull = 3,
    /// Square wave at half amplitude
    SquareHalf = 4,
    /// Pulse wave generated by an MCU timer with variable duty
    PwmFromTimer = 5,
}

impl DdsWaveform {
    /// Decode a waveform register value (taken modulo the waveform count)
    pub fn from_register(value: u32) -> Self {
        Self::from_u32(value % NUM_WAVEFORMS).unwrap_or_default()
    }
}

/// Compute the 10-bit waveform value for an accumulator
///
/// `acc` is the 28-bit phase accumulator for every waveform except
/// [`DdsWaveform::PwmFromTimer`], which compares the top 16 bits of the
/// 30-bit timer accumulator against the duty value.
#[inline]
pub fn waveform_value(tables: &LookupTables, waveform: DdsWaveform, acc: u32, duty: u16) -> i32 {
    const HALF: u32 = 1 << (ACC_BITS - 1);

    match waveform {
        DdsWaveform::None => 0,
        DdsWaveform::Sine => tables.sine((acc >> (ACC_BITS - 10)) as usize) as i32,
        DdsWaveform::Triangle => {
            let folded = if acc > HALF { !acc } else { acc };
            ((folded >> (ACC_BITS - 11)) & 1023) as i32
        }
        DdsWaveform::SquareFull => {
            if acc > HALF {
                DDS_MAX
            } else {
                0
            }
        }
        DdsWaveform::SquareHalf => {
            if acc > HALF {
                DDS_MIDPOINT
            } else {
                0
            }
        }
        DdsWaveform::PwmFromTimer => {
            // Duty 0xffff can never be reached by a 16-bit counter: constant low
            let threshold = if duty == 0xffff { 0x1_0000 } else { duty as u32 };
            if (acc >> (TIMER_ACC_BITS - 16)) >= threshold {
                DDS_MAX
            } else {
                0
            }
        }
    }
}

/// DDS tone channel
#[derive(Clone, Debug, Default)]
pub struct DdsChannel {
    /// 28-bit phase accumulator
    acc: u32,
    /// Phase increment per step
    frequency: u32,
    /// 30-bit PWM timer accumulator
    timer_acc: u32,
    /// PWM timer increment per step
    timer_increment: u32,
    /// PWM duty compare value
    duty: u16,
    waveform: DdsWaveform,
    volume: VolumeLatch,
    /// Last computed 10-bit waveform value
    wave: i32,
    /// Previous step was inside the zero-cross tolerance
    in_zero_zone: bool,
}

impl DdsChannel {
    /// Create a silent channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to power-on state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Set the phase accumulator increment
    #[inline]
    pub fn set_frequency(&mut self, increment: u32) {
        self.frequency = increment;
    }

    /// Select the waveform
    ///
    /// Both accumulators are kept; only the one matching the waveform advances.
    pub fn set_waveform(&mut self, waveform: DdsWaveform) {
        self.waveform = waveform;
    }

    /// Set the PWM timer increment
    #[inline]
    pub fn set_timer_frequency(&mut self, increment: u32) {
        self.timer_increment = increment;
    }

    /// Set the PWM duty compare value
    #[inline]
    pub fn set_duty(&mut self, duty: u16) {
        self.duty = duty;
    }

    /// Request a volume change (deferred to a zero crossing when enabled)
    #[inline]
    pub fn set_volume(&mut self, code: u8) {
        self.volume.set(code);
    }

    /// Enable or disable zero-cross deferral
    #[inline]
    pub fn set_zero_cross(&mut self, enabled: bool) {
        self.volume.set_deferred(enabled);
    }

    /// Force both accumulators back to phase zero
    pub fn phase_reset(&mut self) {
        self.acc = 0;
        self.timer_acc = 0;
    }

    /// Advance one internal step
    pub fn clock_step(&mut self, tables: &LookupTables) {
        let phase = if self.waveform == DdsWaveform::PwmFromTimer {
            if self.timer_increment == 0 {
                return;
            }
            self.timer_acc = self.timer_acc.wrapping_add(self.timer_increment) & TIMER_ACC_MASK;
            self.timer_acc
        } else {
            if self.frequency == 0 {
                return;
            }
            self.acc = self.acc.wrapping_add(self.frequency) & ACC_MASK;
            self.acc
        };

        self.wave = waveform_value(tables, self.waveform, phase, self.duty);

        let near_zero = self.wave < ZERO_CROSS_TOLERANCE;
        if near_zero && !self.in_zero_zone {
            self.volume.commit_crossing();
        }
        self.in_zero_zone = near_zero;
    }

    /// Signed channel output for the mix stage
    #[inline]
    pub fn output(&self, tables: &LookupTables) -> i32 {
        if self.waveform == DdsWaveform::None {
            return 0;
        }
        let centered = (self.wave - DDS_MIDPOINT) * DDS_OUTPUT_SCALE;
        (centered as f32 * tables.gain(self.volume.active())) as i32
    }

    /// Phase accumulator
    pub fn accumulator(&self) -> u32 {
        self.acc
    }

    /// PWM timer accumulator
    pub fn timer_accumulator(&self) -> u32 {
        self.timer_acc
    }

    /// Phase increment
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// PWM timer increment
    pub fn timer_frequency(&self) -> u32 {
        self.timer_increment
    }

    /// PWM duty
    pub fn duty(&self) -> u16 {
        self.duty
    }

    /// Selected waveform
    pub fn waveform(&self) -> DdsWaveform {
        self.waveform
    }

    /// Volume register
    pub fn volume(&self) -> &VolumeLatch {
        &self.volume
    }

    /// Last 10-bit waveform value
    pub fn wave(&self) -> i32 {
        self.wave
    }
}
