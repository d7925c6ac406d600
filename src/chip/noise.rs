//! Noise channel
//!
//! A 23-bit Fibonacci LFSR (taps at bits 22 and 17) shifted on every overflow
//! of a 30-bit MCU timer accumulator. The timer runs either from an external
//! increment or from a fixed internal rate.

use super::volume::VolumeLatch;
use crate::constants::{
    DDS_MAX, DDS_MIDPOINT, DDS_OUTPUT_SCALE, NOISE_INTERNAL_INCREMENT, NOISE_LFSR_MASK,
    NOISE_OUTPUT_BIT, TIMER_ACC_MASK, TIMER_OVERFLOW,
};
use crate::tables::LookupTables;

/// LFSR noise channel
#[derive(Clone, Debug)]
pub struct NoiseChannel {
    /// 23-bit LFSR state (never zero)
    lfsr: u32,
    /// Value restored by a phase reset
    reload: u32,
    /// 30-bit timer accumulator
    acc: u32,
    /// Increment in use
    increment: u32,
    /// External increment saved while the internal clock is selected
    shadow: u32,
    /// Current output level (0 or 1023)
    output: i32,
    internal_clock: bool,
    volume: VolumeLatch,
}

impl NoiseChannel {
    /// Create a silent channel seeded with 1
    pub fn new() -> Self {
        Self {
            lfsr: 1,
            reload: 1,
            acc: 0,
            increment: 0,
            shadow: 0,
            output: 0,
            internal_clock: false,
            volume: VolumeLatch::new(),
        }
    }

    /// Reset to power-on state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Reseed the LFSR (masked to 23 bits, zero becomes 1)
    ///
    /// Also sets the value restored by [`phase_reset`](Self::phase_reset).
    pub fn reseed(&mut self, seed: u32) {
        let seed = match seed & NOISE_LFSR_MASK {
            0 => 1,
            s => s,
        };
        self.lfsr = seed;
        self.reload = seed;
    }

    /// Set the external timer increment
    ///
    /// While the internal clock is selected the value only lands in the
    /// shadow register.
    pub fn set_frequency(&mut self, increment: u32) {
        let increment = increment.min(TIMER_OVERFLOW);
        if self.internal_clock {
            self.shadow = increment;
        } else {
            self.increment = increment;
        }
    }

    /// Select the internal fixed-rate clock or the external increment
    pub fn set_internal_clock(&mut self, internal: bool) {
        if internal == self.internal_clock {
            return;
        }
        if internal {
            self.shadow = self.increment;
            self.increment = NOISE_INTERNAL_INCREMENT;
        } else {
            self.increment = self.shadow;
        }
        self.internal_clock = internal;
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

    /// Restore the LFSR to its reload value and zero the timer
    pub fn phase_reset(&mut self) {
        self.lfsr = self.reload;
        self.acc = 0;
    }

    /// Advance one internal step
    pub fn clock_step(&mut self) {
        if self.increment == 0 {
            return;
        }

        let sum = self.acc + self.increment;
        self.acc = sum & TIMER_ACC_MASK;
        if sum < TIMER_OVERFLOW {
            return;
        }

        let bit = ((self.lfsr >> 22) ^ (self.lfsr >> 17)) & 1;
        self.lfsr = ((self.lfsr << 1) & NOISE_LFSR_MASK) | bit;

        let previous = self.output;
        self.output = if self.lfsr & NOISE_OUTPUT_BIT != 0 {
            DDS_MAX
        } else {
            0
        };
        if previous == DDS_MAX && self.output == 0 {
            self.volume.commit_crossing();
        }
    }

    /// Signed channel output for the mix stage
    #[inline]
    pub fn output(&self, tables: &LookupTables) -> i32 {
        let centered = (self.output - DDS_MIDPOINT) * DDS_OUTPUT_SCALE;
        (centered as f32 * tables.gain(self.volume.active())) as i32
    }

    /// LFSR state
    pub fn lfsr(&self) -> u32 {
        self.lfsr
    }

    /// Timer accumulator
    pub fn accumulator(&self) -> u32 {
        self.acc
    }

    /// Increment currently driving the timer
    pub fn increment(&self) -> u32 {
        self.increment
    }

    /// Whether the internal clock is selected
    pub fn is_internal_clock(&self) -> bool {
        self.internal_clock
    }

    /// Raw output level (0 or 1023)
    pub fn level(&self) -> i32 {
        self.output
    }

    /// Volume register
    pub fn volume(&self) -> &VolumeLatch {
        &self.volume
    }
}

impl Default for NoiseChannel {
    fn default() -> Self {
        Self::new()
    }
}
