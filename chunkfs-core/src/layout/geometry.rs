//! Store geometry
//!
//! The store spans whole erase blocks between the end of code and the
//! fixed reserved regions. One block more than the chunks need is
//! included: it holds the identity marker and is the landing space the
//! sweep shifts blocks into.

use crate::chunk::{CHUNK_SIZE, LOG_CHUNK_SIZE};
use crate::config::{ConfigError, StoreConfig};

/// Round `addr` down to a multiple of `align` (a power of two)
pub const fn round_down(addr: u32, align: u32) -> u32 {
    addr & !(align - 1)
}

/// Round `addr` up to a multiple of `align` (a power of two)
pub const fn round_up(addr: u32, align: u32) -> u32 {
    round_down(addr.saturating_add(align - 1), align)
}

/// Physical extent of the store, independent of its orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    /// Address of the lowest erase block
    low_block: u32,
    /// Address of the highest erase block
    high_block: u32,
    /// Erase block size in bytes
    block_size: u32,
    /// Usable chunks (all blocks but one)
    chunk_count: u8,
}

impl Geometry {
    /// Place the store for `config` on a device with `block_size` blocks
    ///
    /// The high block sits just below `reserved_start`; the low block is
    /// as far down as `max_chunks` allows without reaching into code.
    pub fn compute(config: &StoreConfig, block_size: u32) -> Result<Self, ConfigError> {
        config.validate(block_size)?;

        let high_block = round_down(config.reserved_start, block_size)
            .checked_sub(block_size)
            .ok_or(ConfigError::NoSpace)?;
        let span = CHUNK_SIZE as u32 * config.max_chunks as u32;
        let low_block = round_up(high_block.saturating_sub(span), block_size)
            .max(round_up(config.code_end, block_size));

        if low_block >= high_block {
            return Err(ConfigError::NoSpace);
        }

        let chunk_count = ((high_block - low_block) >> LOG_CHUNK_SIZE) as u8;
        Ok(Self {
            low_block,
            high_block,
            block_size,
            chunk_count,
        })
    }

    /// Address of the lowest erase block
    pub fn low_block(&self) -> u32 {
        self.low_block
    }

    /// Address of the highest erase block
    pub fn high_block(&self) -> u32 {
        self.high_block
    }

    /// Erase block size in bytes
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Number of usable chunks
    pub fn chunk_count(&self) -> u8 {
        self.chunk_count
    }

    /// Chunks per erase block
    pub fn chunks_per_block(&self) -> u8 {
        (self.block_size >> LOG_CHUNK_SIZE) as u8
    }

    /// Erase blocks spanned, including the identity block
    pub fn block_count(&self) -> u32 {
        (self.high_block - self.low_block) / self.block_size + 1
    }
}
