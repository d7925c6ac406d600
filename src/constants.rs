//! CrapSynth Hardware Constants
//!
//! Bit widths, memory sizes and fixed rates shared across the chip components.

/// Width of the DDS phase accumulator (AD9833-style, 28 bits)
pub const ACC_BITS: u32 = 28;

/// Mask applied to the DDS phase accumulator after every step
pub const ACC_MASK: u32 = (1 << ACC_BITS) - 1;

/// Width of the MCU timer accumulators (PWM, noise, DAC and phase-reset timers)
pub const TIMER_ACC_BITS: u32 = ACC_BITS + 2;

/// Overflow threshold of a timer accumulator
pub const TIMER_OVERFLOW: u32 = 1 << TIMER_ACC_BITS;

/// Mask applied to a timer accumulator after overflow detection
pub const TIMER_ACC_MASK: u32 = TIMER_OVERFLOW - 1;

/// Number of DDS tone channels
pub const NUM_DDS_CHANNELS: usize = 4;

/// Maximum number of DAC channels (revision 2 chips)
pub const MAX_DAC_CHANNELS: usize = 3;

/// Number of phase-reset timers (the last one shares the noise timer)
pub const NUM_TIMERS: usize = 5;

/// Index of the phase-reset timer that is only usable while noise runs on its internal clock
pub const NOISE_SHARED_TIMER: usize = NUM_TIMERS - 1;

/// Maximum number of audio channels (4 DDS + noise + 3 DAC)
pub const MAX_AUDIO_CHANNELS: usize = NUM_DDS_CHANNELS + 1 + MAX_DAC_CHANNELS;

/// Audio channel index of the noise channel
pub const NOISE_CHANNEL: usize = NUM_DDS_CHANNELS;

/// Audio channel index of the first DAC channel
pub const FIRST_DAC_CHANNEL: usize = NOISE_CHANNEL + 1;

/// Flash sample bank size: 206 flash pages of 2 KiB
pub const FLASH_SAMPLE_MEM_SIZE: usize = 2048 * 206;

/// RAM sample bank size (50 KiB)
pub const RAM_SAMPLE_MEM_SIZE: usize = 1024 * 50;

/// Size of a DAC software wavetable in bytes
pub const WAVETABLE_SIZE: usize = 256;

/// Number of entries in the sine lookup table (10-bit phase)
pub const SINE_TABLE_SIZE: usize = 1024;

/// Number of volume codes
pub const VOLUME_TABLE_SIZE: usize = 256;

/// Full-scale value of the 10-bit DDS/noise DAC
pub const DDS_MAX: i32 = 1023;

/// Midpoint used to center 10-bit waveforms
pub const DDS_MIDPOINT: i32 = 511;

/// Waveform values below this count as a zero crossing for DDS channels
pub const ZERO_CROSS_TOLERANCE: i32 = 10;

/// Full-scale value of the 12-bit DAC
pub const DAC_MAX: i32 = 4095;

/// Midpoint of the 12-bit DAC (unsigned-offset output)
pub const DAC_MIDPOINT: i32 = 2047;

/// Scale from a centered 10-bit waveform to a channel output sample
pub const DDS_OUTPUT_SCALE: i32 = 8;

/// Scale from a centered 12-bit DAC value to a channel output sample
pub const DAC_OUTPUT_SCALE: i32 = 2;

/// Noise LFSR width mask (23 bits)
pub const NOISE_LFSR_MASK: u32 = 0x7f_ffff;

/// Noise LFSR output bit
pub const NOISE_OUTPUT_BIT: u32 = 1 << 22;

/// Timer increment used while the noise channel runs on its internal clock
pub const NOISE_INTERNAL_INCREMENT: u32 = 1 << 29;

/// Power-on seed of the 12-bit DAC noise LFSR
pub const DAC_LFSR_SEED: u16 = 0xAAA;

/// Largest DAC noise/triangle amplitude shift
pub const DAC_MAX_AMPLITUDE_SHIFT: u8 = 11;

/// Chip master clock (25 MHz)
pub const DEFAULT_CHIP_CLOCK: u32 = 25_000_000;

/// Internal step rate: the chip is stepped once per output sample at master / 100
pub const DEFAULT_SAMPLE_RATE: u32 = DEFAULT_CHIP_CLOCK / 100;

/// Register write FIFO capacity of the reference platform
pub const DEFAULT_QUEUE_CAPACITY: usize = 16_384;
