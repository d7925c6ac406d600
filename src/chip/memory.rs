//! Sample memory banks
//!
//! DAC channels play 8-bit unsigned samples from one of two banks: the large
//! flash bank and the smaller RAM bank. Both are filled sequentially by
//! [`SampleMemory::render`].

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::constants::{FLASH_SAMPLE_MEM_SIZE, RAM_SAMPLE_MEM_SIZE};

/// Byte returned for reads past the end of a bank (8-bit midpoint)
pub const SILENT_SAMPLE: u8 = 0x80;

/// Sample memory bank selector
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBank {
    /// Flash bank (206 pages of 2 KiB)
    #[default]
    Flash,
    /// RAM bank (50 KiB)
    Ram,
}

impl MemoryBank {
    /// Capacity of the bank in bytes
    pub const fn capacity(self) -> usize {
        match self {
            MemoryBank::Flash => FLASH_SAMPLE_MEM_SIZE,
            MemoryBank::Ram => RAM_SAMPLE_MEM_SIZE,
        }
    }

    fn index(self) -> usize {
        match self {
            MemoryBank::Flash => 0,
            MemoryBank::Ram => 1,
        }
    }
}

/// One sample to place in memory
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleData {
    /// Name used in log messages
    #[serde(default)]
    pub name: String,
    /// Target bank
    #[serde(default)]
    pub bank: MemoryBank,
    /// Unsigned 8-bit PCM
    pub data: Vec<u8>,
}

impl SampleData {
    /// Create a sample for the given bank
    pub fn new(name: impl Into<String>, bank: MemoryBank, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bank,
            data,
        }
    }
}

/// Where a sample ended up after rendering
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePlacement {
    /// Bank holding the sample
    pub bank: MemoryBank,
    /// Start address inside the bank
    pub start: u32,
    /// Stored length (may be shorter than the input if truncated, 0 if omitted)
    pub length: u32,
}

impl SamplePlacement {
    /// Value for the DAC start-address register (bit 24 selects RAM)
    pub fn start_register(&self) -> u32 {
        match self.bank {
            MemoryBank::Flash => self.start,
            MemoryBank::Ram => self.start | (1 << 24),
        }
    }
}

/// Flash and RAM sample banks
#[derive(Clone)]
pub struct SampleMemory {
    banks: [Vec<u8>; 2],
    used: [usize; 2],
}

impl SampleMemory {
    /// Create empty banks
    pub fn new() -> Self {
        Self {
            banks: [
                vec![0; FLASH_SAMPLE_MEM_SIZE],
                vec![0; RAM_SAMPLE_MEM_SIZE],
            ],
            used: [0; 2],
        }
    }

    /// Erase both banks
    pub fn clear(&mut self) {
        for bank in &mut self.banks {
            bank.fill(0);
        }
        self.used = [0; 2];
    }

    /// Read one byte, returning [`SILENT_SAMPLE`] past the end of the bank
    #[inline]
    pub fn read(&self, bank: MemoryBank, addr: u32) -> u8 {
        self.banks[bank.index()]
            .get(addr as usize)
            .copied()
            .unwrap_or(SILENT_SAMPLE)
    }

    /// Bytes occupied in a bank
    pub fn memory_usage(&self, bank: MemoryBank) -> usize {
        self.used[bank.index()]
    }

    /// Raw contents of a bank up to its usage
    pub fn contents(&self, bank: MemoryBank) -> &[u8] {
        &self.banks[bank.index()][..self.used[bank.index()]]
    }

    /// Pack samples into their banks, replacing previous contents
    ///
    /// Samples are placed back to back in input order. A sample that does not
    /// fit is truncated to the remaining space (or omitted when the bank is
    /// full) and a warning is logged.
    ///
    /// # Returns
    ///
    /// One placement per input sample, in input order
    pub fn render(&mut self, samples: &[SampleData]) -> Vec<SamplePlacement> {
        self.clear();

        let placements: Vec<SamplePlacement> = samples
            .iter()
            .map(|sample| {
                let idx = sample.bank.index();
                let start = self.used[idx];
                let free = sample.bank.capacity() - start;
                let length = sample.data.len().min(free);

                if length < sample.data.len() {
                    if length == 0 {
                        warn!(
                            "sample '{}' omitted: {:?} bank full",
                            sample.name, sample.bank
                        );
                    } else {
                        warn!(
                            "sample '{}' truncated from {} to {} bytes: {:?} bank full",
                            sample.name,
                            sample.data.len(),
                            length,
                            sample.bank
                        );
                    }
                }

                self.banks[idx][start..start + length].copy_from_slice(&sample.data[..length]);
                self.used[idx] += length;

                SamplePlacement {
                    bank: sample.bank,
                    start: start as u32,
                    length: length as u32,
                }
            })
            .collect();

        info!(
            "sample memory rendered: flash {}/{} bytes, ram {}/{} bytes",
            self.used[0], FLASH_SAMPLE_MEM_SIZE, self.used[1], RAM_SAMPLE_MEM_SIZE
        );

        placements
    }
}

impl Default for SampleMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SampleMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleMemory")
            .field("flash_used", &self.used[0])
            .field("ram_used", &self.used[1])
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_packing() {
        let mut mem = SampleMemory::new();
        let placements = mem.render(&[
            SampleData::new("a", MemoryBank::Flash, vec![1, 2, 3]),
            SampleData::new("b", MemoryBank::Ram, vec![9; 10]),
            SampleData::new("c", MemoryBank::Flash, vec![4, 5]),
        ]);

        assert_eq!(placements[0].start, 0);
        assert_eq!(placements[1].start, 0);
        assert_eq!(placements[2].start, 3);
        assert_eq!(mem.memory_usage(MemoryBank::Flash), 5);
        assert_eq!(mem.memory_usage(MemoryBank::Ram), 10);
        assert_eq!(mem.contents(MemoryBank::Flash), &[1, 2, 3, 4, 5]);
        assert_eq!(mem.read(MemoryBank::Flash, 3), 4);
    }

    #[test]
    fn test_overflow_truncates_then_omits() {
        let mut mem = SampleMemory::new();
        let placements = mem.render(&[
            SampleData::new("big", MemoryBank::Ram, vec![1; RAM_SAMPLE_MEM_SIZE - 4]),
            SampleData::new("tail", MemoryBank::Ram, vec![2; 10]),
            SampleData::new("none", MemoryBank::Ram, vec![3; 10]),
        ]);
        assert_eq!(placements[1].length, 4);
        assert_eq!(placements[2].length, 0);
        assert_eq!(mem.memory_usage(MemoryBank::Ram), RAM_SAMPLE_MEM_SIZE);
    }

    #[test]
    fn test_read_past_end_is_midpoint() {
        let mem = SampleMemory::new();
        assert_eq!(mem.read(MemoryBank::Ram, RAM_SAMPLE_MEM_SIZE as u32), SILENT_SAMPLE);
        assert_eq!(mem.read(MemoryBank::Flash, u32::MAX), SILENT_SAMPLE);
    }

    #[test]
    fn test_ram_start_register_sets_bit_24() {
        let placement = SamplePlacement {
            bank: MemoryBank::Ram,
            start: 12,
            length: 1,
        };
        assert_eq!(placement.start_register(), 12 | (1 << 24));
    }

    #[test]
    fn test_render_replaces_previous_contents() {
        let mut mem = SampleMemory::new();
        mem.render(&[SampleData::new("a", MemoryBank::Flash, vec![7; 100])]);
        mem.render(&[SampleData::new("b", MemoryBank::Flash, vec![8; 10])]);
        assert_eq!(mem.memory_usage(MemoryBank::Flash), 10);
        assert_eq!(mem.read(MemoryBank::Flash, 50), 0);
    }
}
