//! Zero-cross deferred volume register
//!
//! Every audio channel owns one of these. With deferral enabled a volume
//! write only lands when the channel's waveform next crosses its zero level,
//! which is how the hardware avoids clicks on amplitude steps.

/// Volume register with optional zero-cross deferral
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VolumeLatch {
    /// Active volume code (0 = mute, 255 = full scale)
    active: u8,
    /// Volume waiting for the next zero crossing
    pending: Option<u8>,
    /// Zero-cross deferral enabled
    deferred: bool,
}

impl VolumeLatch {
    /// Create a muted latch with deferral off
    pub fn new() -> Self {
        Self::default()
    }

    /// Active volume code
    #[inline]
    pub fn active(&self) -> u8 {
        self.active
    }

    /// Volume code waiting for a zero crossing, if any
    #[inline]
    pub fn pending(&self) -> Option<u8> {
        self.pending
    }

    /// Whether zero-cross deferral is enabled
    #[inline]
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Request a new volume
    ///
    /// Applied immediately unless deferral is on, in which case it replaces
    /// any earlier pending value.
    pub fn set(&mut self, code: u8) {
        if self.deferred {
            self.pending = Some(code);
        } else {
            self.active = code;
        }
    }

    /// Enable or disable deferral
    ///
    /// Turning deferral off flushes a pending value so it is not lost.
    pub fn set_deferred(&mut self, deferred: bool) {
        self.deferred = deferred;
        if !deferred {
            if let Some(code) = self.pending.take() {
                self.active = code;
            }
        }
    }

    /// Commit the pending volume at a zero crossing
    ///
    /// Returns true if a value was committed.
    #[inline]
    pub fn commit_crossing(&mut self) -> bool {
        if !self.deferred {
            return false;
        }
        match self.pending.take() {
            Some(code) => {
                self.active = code;
                true
            }
            None => false,
        }
    }
}
