//! Lookup tables
//!
//! The sine table feeds the DDS sine waveform and the volume table maps the
//! 8-bit volume code of every channel to a linear gain.

use crate::constants::{SINE_TABLE_SIZE, VOLUME_TABLE_SIZE};

/// Amplitude attenuation per volume step below full scale, in dB
pub const VOLUME_STEP_DB: f32 = 1.0;

/// Precomputed sine and volume tables
///
/// Computed once when the chip is created and again on every reset.
#[derive(Clone)]
pub struct LookupTables {
    sine: Box<[u16; SINE_TABLE_SIZE]>,
    volume: Box<[f32; VOLUME_TABLE_SIZE]>,
}

impl LookupTables {
    /// Build both tables
    pub fn new() -> Self {
        let mut tables = Self {
            sine: Box::new([0; SINE_TABLE_SIZE]),
            volume: Box::new([0.0; VOLUME_TABLE_SIZE]),
        };
        tables.recalc();
        tables
    }

    /// Recompute both tables in place
    pub fn recalc(&mut self) {
        for (i, entry) in self.sine.iter_mut().enumerate() {
            let phase = i as f64 * 2.0 * std::f64::consts::PI / SINE_TABLE_SIZE as f64;
            *entry = (phase.sin() * 511.0 + 511.0) as u16;
        }

        for (code, gain) in self.volume.iter_mut().enumerate() {
            *gain = volume_gain(code as u8);
        }
    }

    /// Sine table entry for a 10-bit phase index (0..=1023)
    #[inline]
    pub fn sine(&self, index: usize) -> u16 {
        self.sine[index & (SINE_TABLE_SIZE - 1)]
    }

    /// Linear gain for a volume code
    #[inline]
    pub fn gain(&self, code: u8) -> f32 {
        self.volume[code as usize]
    }

    /// Whole sine table
    pub fn sine_table(&self) -> &[u16; SINE_TABLE_SIZE] {
        &self.sine
    }
}

impl Default for LookupTables {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LookupTables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupTables").finish_non_exhaustive()
    }
}

/// Gain of a volume code: 0 mutes, 255 is unity, each step below is -1 dB
pub fn volume_gain(code: u8) -> f32 {
    if code == 0 {
        return 0.0;
    }
    let attenuation_db = -VOLUME_STEP_DB * (255 - code) as f32;
    10f32.powf(attenuation_db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sine_table_shape() {
        let tables = LookupTables::new();
        assert_eq!(tables.sine(0), 511);
        assert_eq!(tables.sine(256), 1022);
        assert_eq!(tables.sine(512), 511);
        assert_eq!(tables.sine(768), 0);
        assert!(tables.sine_table().iter().all(|&v| v <= 1023));
    }

    #[test]
    fn test_sine_index_wraps() {
        let tables = LookupTables::new();
        assert_eq!(tables.sine(1024 + 5), tables.sine(5));
    }

    #[test]
    fn test_volume_mute_and_unity() {
        let tables = LookupTables::new();
        assert_eq!(tables.gain(0), 0.0);
        assert_eq!(tables.gain(255), 1.0);
    }

    #[test]
    fn test_volume_one_db_steps() {
        // 6 steps = 6 dB, roughly half amplitude
        assert_relative_eq!(volume_gain(249), 0.501_187, epsilon = 1e-5);
        assert_relative_eq!(volume_gain(235), 0.1, epsilon = 1e-6);
        // Same curve as 10^((31.5 - 0.5 * (255 - n)) / 10), normalised to unity
        for code in [1u8, 64, 128, 200] {
            let raw = 10f64.powf((31.5 - 0.5 * (255 - code) as f64) / 10.0);
            let unity = 10f64.powf(31.5 / 10.0);
            assert_relative_eq!(volume_gain(code) as f64, raw / unity, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_volume_table_monotonic() {
        for code in 1..=255u8 {
            assert!(volume_gain(code) > volume_gain(code - 1));
        }
    }
}
