//! Chunk allocator
//!
//! Search order:
//! 1. An `UNUSED` chunk, scanning from the per-mount random start index.
//! 2. An erase block whose chunks are all `FREED`: erase it, hand out its
//!    first chunk.
//! 3. A sweep, if enough `FREED` chunks exist to make it worth the wear,
//!    then one more search.
//!
//! The random start is the wear leveling: without it the lowest chunks
//! would be reused first every time.

use chunkfs_hal::{EntropySource, NvmFlash, PeriodicTicker};

use super::ChunkStore;
use crate::chunk::Marker;
use crate::error::Error;

/// Random draws before falling back to a modulo reduction
const START_INDEX_ATTEMPTS: u32 = 64;

/// An erased chunk, just handed out by the allocator
///
/// Only the allocator creates these, so holding one proves the chunk can
/// be written without a representability check.
#[derive(Debug, PartialEq, Eq)]
pub struct FreshChunk(u8);

impl FreshChunk {
    /// Chunk index
    pub fn index(&self) -> u8 {
        self.0
    }
}

/// Outcome of one allocation search
enum Search {
    Found(FreshChunk),
    Exhausted { freed: u32 },
}

/// Pick a uniformly random chunk index in `1..=chunk_count`
///
/// Rejection-samples random bytes; a source that never produces an
/// in-range byte is reduced modulo the count instead of looping forever.
pub fn random_start_index<E: EntropySource>(entropy: &mut E, chunk_count: u8) -> u8 {
    for _ in 0..START_INDEX_ATTEMPTS {
        let byte = entropy.random_byte();
        if byte < chunk_count {
            return byte + 1;
        }
    }
    entropy.random_byte() % chunk_count + 1
}

impl<F: NvmFlash, T: PeriodicTicker> ChunkStore<F, T> {
    /// Find an erased chunk, reclaiming or sweeping if necessary
    ///
    /// Fails with [`Error::OutOfSpace`] when no chunk is free and too few
    /// are released for a sweep to be worthwhile.
    pub fn allocate(&mut self) -> Result<FreshChunk, Error> {
        let freed = match self.search()? {
            Search::Found(chunk) => return Ok(chunk),
            Search::Exhausted { freed } => freed,
        };

        if freed < self.config.min_chunks_for_sweep as u32 {
            warn!("out of space, {=u32} chunks released", freed);
            return Err(Error::OutOfSpace);
        }

        self.sweep()?;
        match self.search()? {
            Search::Found(chunk) => Ok(chunk),
            Search::Exhausted { .. } => Err(Error::OutOfSpace),
        }
    }

    fn search(&mut self) -> Result<Search, Error> {
        let start = self.start_index;

        let mut index = start;
        loop {
            if self.marker(index)? == Marker::Unused {
                trace!("unused chunk {=u8}", index);
                return Ok(Search::Found(FreshChunk(index)));
            }
            index = self.following(index);
            if index == start {
                break;
            }
        }

        let mut freed = 0u32;
        loop {
            if self.marker(index)? == Marker::Freed {
                freed += 1;
            }
            if self.layout.is_block_start(index) && self.block_released(index)? {
                debug!("reclaiming released block at chunk {=u8}", index);
                let addr = self.layout.chunk_addr(index)?;
                self.persistent.erase_block(addr)?;
                return Ok(Search::Found(FreshChunk(index)));
            }
            index = self.following(index);
            if index == start {
                break;
            }
        }

        debug!("no free chunk, {=u32} released", freed);
        Ok(Search::Exhausted { freed })
    }

    /// Whether every chunk of the block starting at chunk `first` is `FREED`
    fn block_released(&mut self, first: u8) -> Result<bool, Error> {
        for offset in 0..self.layout.chunks_per_block() {
            if self.marker(first + offset)? != Marker::Freed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn following(&self, index: u8) -> u8 {
        if index >= self.layout.chunk_count() {
            1
        } else {
            index + 1
        }
    }
}
