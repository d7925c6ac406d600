//! Phase-reset timer
//!
//! A free-running 30-bit MCU timer that, on every overflow, forces the
//! phase of a selected set of audio channels back to zero. Used for hard
//! sync effects.

use bitflags::bitflags;

use crate::constants::{TIMER_ACC_MASK, TIMER_OVERFLOW};

bitflags! {
    /// Audio channels targeted by a phase reset (bit n = audio channel n)
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ChannelMask: u8 {
        /// DDS channel 0
        const DDS0 = 1 << 0;
        /// DDS channel 1
        const DDS1 = 1 << 1;
        /// DDS channel 2
        const DDS2 = 1 << 2;
        /// DDS channel 3
        const DDS3 = 1 << 3;
        /// Noise channel
        const NOISE = 1 << 4;
        /// DAC channel 0
        const DAC0 = 1 << 5;
        /// DAC channel 1
        const DAC1 = 1 << 6;
        /// DAC channel 2 (revision 2 only)
        const DAC2 = 1 << 7;
    }
}

impl ChannelMask {
    /// Whether audio channel `index` is selected
    #[inline]
    pub fn has_channel(self, index: usize) -> bool {
        index < 8 && self.bits() & (1 << index) != 0
    }
}

/// Phase-reset timer
#[derive(Debug, Clone, Default)]
pub struct PhaseResetTimer {
    /// 30-bit accumulator
    acc: u32,
    /// Increment per step
    increment: u32,
    /// Channels reset on overflow
    mask: ChannelMask,
    /// Is timer running?
    enabled: bool,
}

impl PhaseResetTimer {
    /// Create a stopped timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Set the channel bitmask (low 8 bits of the register value)
    pub fn set_mask(&mut self, value: u32) {
        self.mask = ChannelMask::from_bits_truncate(value as u8);
    }

    /// Get the channel bitmask
    pub fn mask(&self) -> ChannelMask {
        self.mask
    }

    /// Set the increment (clamped to one overflow per step)
    pub fn set_frequency(&mut self, increment: u32) {
        self.increment = increment.min(TIMER_OVERFLOW);
    }

    /// Get the increment
    pub fn frequency(&self) -> u32 {
        self.increment
    }

    /// Zero the accumulator
    pub fn reset_accumulator(&mut self) {
        self.acc = 0;
    }

    /// Get the accumulator
    pub fn accumulator(&self) -> u32 {
        self.acc
    }

    /// Start or stop the timer
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Is timer running?
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Clock the timer by one step
    ///
    /// # Returns
    ///
    /// The channels to reset if the timer overflowed on this step
    pub fn clock(&mut self) -> Option<ChannelMask> {
        if !self.enabled || self.increment == 0 {
            return None;
        }

        let sum = self.acc + self.increment;
        self.acc = sum & TIMER_ACC_MASK;
        (sum >= TIMER_OVERFLOW).then_some(self.mask)
    }
}
