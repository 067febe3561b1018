//! Store configuration
//!
//! Board-specific placement of the store plus the two tuning knobs of the
//! allocator. Validated once at mount against the device's erase block
//! size.

use serde::{Deserialize, Serialize};

use crate::chunk::CHUNK_SIZE;

/// Default number of chunks the store may span (30KB)
pub const DEFAULT_MAX_CHUNKS: u8 = 240;

/// Hard cap on the chunk count
///
/// Chunk indices are stored in single bytes and 253..=255 are reserved
/// for the identity marker, `FILE_START` and `UNUSED`, so a back-pointer
/// must never take one of those values.
pub const MAX_CHUNK_COUNT: u8 = 252;

/// Default minimum number of released chunks that justifies a sweep
///
/// If this is too low, sweeps run often and cause excessive wear.
pub const DEFAULT_MIN_CHUNKS_FOR_SWEEP: u8 = 8;

/// Errors from configuration validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Device erase block size is not a power of two
    BlockSizeNotPowerOfTwo,
    /// Erase block cannot hold a whole number of chunks
    BlockSmallerThanChunk,
    /// `max_chunks` exceeds [`MAX_CHUNK_COUNT`] or is zero
    TooManyChunks,
    /// Fewer than two erase blocks fit between code and reserved regions
    NoSpace,
    /// Sweep threshold of zero would sweep with nothing to reclaim
    ZeroThreshold,
}

/// Placement and tuning of the chunk store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoreConfig {
    /// First address after code and read-only data
    pub code_end: u32,
    /// First address of the fixed regions reserved above the store
    pub reserved_start: u32,
    /// Upper bound on the number of chunks
    pub max_chunks: u8,
    /// Released chunks needed before a sweep is worth its wear
    pub min_chunks_for_sweep: u8,
}

impl StoreConfig {
    /// Create a config for the span between `code_end` and `reserved_start`
    pub const fn new(code_end: u32, reserved_start: u32) -> Self {
        Self {
            code_end,
            reserved_start,
            max_chunks: DEFAULT_MAX_CHUNKS,
            min_chunks_for_sweep: DEFAULT_MIN_CHUNKS_FOR_SWEEP,
        }
    }

    /// Limit the store to `max_chunks` chunks
    pub const fn with_max_chunks(mut self, max_chunks: u8) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Set the released-chunk threshold for sweeping
    pub const fn with_sweep_threshold(mut self, min_chunks: u8) -> Self {
        self.min_chunks_for_sweep = min_chunks;
        self
    }

    /// Check the config against a device erase block size
    pub fn validate(&self, block_size: u32) -> Result<(), ConfigError> {
        if !block_size.is_power_of_two() {
            return Err(ConfigError::BlockSizeNotPowerOfTwo);
        }
        if block_size < CHUNK_SIZE as u32 {
            return Err(ConfigError::BlockSmallerThanChunk);
        }
        if self.max_chunks == 0 || self.max_chunks > MAX_CHUNK_COUNT {
            return Err(ConfigError::TooManyChunks);
        }
        if self.min_chunks_for_sweep == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(())
    }
}
