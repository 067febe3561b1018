//! Host-side simulation of the platform traits
//!
//! [`SimFlash`] behaves like NOR flash: erase sets a whole block to `0xFF`
//! and program ANDs the new bytes into the old ones. In strict mode a
//! program that would need a cleared bit set is rejected instead, which
//! catches callers that skip the representability check.

use alloc::vec;
use alloc::vec::Vec;

use crate::entropy::EntropySource;
use crate::flash::{FlashError, NvmFlash};
use crate::ticker::PeriodicTicker;

/// RAM-backed NOR flash
#[derive(Debug, Clone)]
pub struct SimFlash {
    base: u32,
    block_size: u32,
    mem: Vec<u8>,
    erase_counts: Vec<u32>,
    programs: u32,
    strict: bool,
    ops_until_cut: Option<u32>,
}

impl SimFlash {
    /// Create an erased device of `blocks` erase blocks starting at `base`
    ///
    /// # Panics
    /// If `block_size` is not a power of two or `base` is not block aligned.
    pub fn new(base: u32, block_size: u32, blocks: usize) -> Self {
        assert!(block_size.is_power_of_two(), "block size must be a power of two");
        assert_eq!(base % block_size, 0, "base must be block aligned");
        Self {
            base,
            block_size,
            mem: vec![0xFF; block_size as usize * blocks],
            erase_counts: vec![0; blocks],
            programs: 0,
            strict: true,
            ops_until_cut: None,
        }
    }

    /// Enable or disable rejection of programs that would set bits
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Fail every erase/program after `ops` more of them have succeeded
    pub fn cut_power_after(&mut self, ops: u32) {
        self.ops_until_cut = Some(ops);
    }

    /// Accept erase/program operations again
    pub fn restore_power(&mut self) {
        self.ops_until_cut = None;
    }

    /// First address of the device
    pub fn base(&self) -> u32 {
        self.base
    }

    /// One past the last address of the device
    pub fn end(&self) -> u32 {
        self.base + self.mem.len() as u32
    }

    /// Number of times block `block` (0-based from `base`) was erased
    pub fn erase_count(&self, block: usize) -> u32 {
        self.erase_counts[block]
    }

    /// Per-block erase counters
    pub fn erase_counts(&self) -> &[u32] {
        &self.erase_counts
    }

    /// Sum of all erase counters
    pub fn total_erases(&self) -> u32 {
        self.erase_counts.iter().sum()
    }

    /// Number of successful program operations
    pub fn program_count(&self) -> u32 {
        self.programs
    }

    /// Raw device contents
    pub fn bytes(&self) -> &[u8] {
        &self.mem
    }

    /// Raw device contents, for corrupting flash in tests
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mem
    }

    fn range(&self, addr: u32, len: usize) -> Result<core::ops::Range<usize>, FlashError> {
        let start = addr
            .checked_sub(self.base)
            .ok_or(FlashError::OutOfBounds)? as usize;
        let end = start.checked_add(len).ok_or(FlashError::OutOfBounds)?;
        if end > self.mem.len() {
            return Err(FlashError::OutOfBounds);
        }
        Ok(start..end)
    }

    fn consume_op(&mut self) -> Result<(), FlashError> {
        match self.ops_until_cut {
            Some(0) => Err(FlashError::PowerCut),
            Some(n) => {
                self.ops_until_cut = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl NvmFlash for SimFlash {
    fn erase_block_size(&self) -> u32 {
        self.block_size
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let range = self.range(addr, buf.len())?;
        buf.copy_from_slice(&self.mem[range]);
        Ok(())
    }

    fn erase_block(&mut self, addr: u32) -> Result<(), FlashError> {
        if addr % self.block_size != 0 {
            return Err(FlashError::Unaligned);
        }
        let range = self.range(addr, self.block_size as usize)?;
        self.consume_op()?;
        let block = range.start / self.block_size as usize;
        self.mem[range].fill(0xFF);
        self.erase_counts[block] += 1;
        Ok(())
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        let range = self.range(addr, data.len())?;
        if self.strict {
            let old = &self.mem[range.clone()];
            if old.iter().zip(data).any(|(&o, &n)| !o & n != 0) {
                return Err(FlashError::BitSetAttempt);
            }
        }
        self.consume_op()?;
        for (cell, &byte) in self.mem[range].iter_mut().zip(data) {
            *cell &= byte;
        }
        self.programs += 1;
        Ok(())
    }
}

/// Ticker that records how often it was paused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountingTicker {
    /// Number of `stop` calls
    pub stops: u32,
    /// Number of `start` calls
    pub starts: u32,
    running: bool,
}

impl Default for CountingTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl CountingTicker {
    /// Create a running ticker
    pub fn new() -> Self {
        Self {
            stops: 0,
            starts: 0,
            running: true,
        }
    }

    /// Whether the ticker is currently running
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl PeriodicTicker for CountingTicker {
    fn stop(&mut self) {
        self.stops += 1;
        self.running = false;
    }

    fn start(&mut self) {
        self.starts += 1;
        self.running = true;
    }
}

/// Entropy stub that always yields the same byte
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy(pub u8);

impl EntropySource for FixedEntropy {
    fn random_byte(&mut self) -> u8 {
        self.0
    }
}

/// Deterministic linear congruential byte stream
#[derive(Debug, Clone, Copy)]
pub struct LcgEntropy {
    state: u16,
}

impl LcgEntropy {
    /// Create a stream from `seed`
    pub fn new(seed: u16) -> Self {
        Self { state: seed }
    }
}

impl EntropySource for LcgEntropy {
    fn random_byte(&mut self) -> u8 {
        self.state = self.state.wrapping_mul(33).wrapping_add(509);
        (self.state >> 8) as u8
    }
}
