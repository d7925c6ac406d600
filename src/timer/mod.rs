//! Phase-reset timer bank
//!
//! Five MCU timers that periodically reset the phase of selected channels.
//! The last one shares its hardware timer with the noise channel and only
//! runs while noise is clocked internally.

pub mod phase_reset;

pub use phase_reset::{ChannelMask, PhaseResetTimer};

use crate::constants::{NOISE_SHARED_TIMER, NUM_TIMERS};

/// All phase-reset timers of the chip
#[derive(Debug, Clone, Default)]
pub struct TimerBank {
    timers: [PhaseResetTimer; NUM_TIMERS],
}

impl TimerBank {
    /// Create a bank of stopped timers
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every timer
    pub fn reset(&mut self) {
        for timer in &mut self.timers {
            timer.reset();
        }
    }

    /// Timer by index
    pub fn timer(&self, index: usize) -> Option<&PhaseResetTimer> {
        self.timers.get(index)
    }

    /// Mutable timer by index
    pub fn timer_mut(&mut self, index: usize) -> Option<&mut PhaseResetTimer> {
        self.timers.get_mut(index)
    }

    /// Clock every timer by one step
    ///
    /// # Arguments
    ///
    /// * `noise_internal` - whether the noise channel runs on its internal
    ///   clock, which frees the shared timer
    ///
    /// # Returns
    ///
    /// Union of the channel masks of all timers that overflowed
    pub fn clock(&mut self, noise_internal: bool) -> ChannelMask {
        self.timers
            .iter_mut()
            .enumerate()
            .filter(|(i, _)| *i != NOISE_SHARED_TIMER || noise_internal)
            .filter_map(|(_, timer)| timer.clock())
            .fold(ChannelMask::empty(), |acc, mask| acc | mask)
    }
}
