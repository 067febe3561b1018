//! Chunk array
//!
//! [`ChunkStore`] is the view over flash shared by the allocator, the
//! sweep and the file table. Nothing is cached: every marker and link is
//! read from flash when needed, and every index is bounds-checked against
//! the layout before it is turned into an address.

pub mod allocator;
pub mod sweep;

pub use allocator::FreshChunk;

use chunkfs_hal::{EntropySource, NvmFlash, PeriodicTicker};

use crate::chunk::{Marker, FREED_CHUNK, MARKER_OFFSET, NEXT_OFFSET};
use crate::config::StoreConfig;
use crate::error::Error;
use crate::layout::{Geometry, StoreIdentity, StoreLayout};
use crate::persistent::Persistent;

/// Chunk counts by state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoreStats {
    /// Erased chunks
    pub unused: u8,
    /// Released, not yet erased chunks
    pub freed: u8,
    /// First chunks of files
    pub files: u8,
    /// Continuation chunks of files
    pub data: u8,
}

impl StoreStats {
    /// Chunks that belong to a file
    pub fn live(&self) -> u8 {
        self.files + self.data
    }
}

/// Mounted chunk store
pub struct ChunkStore<F, T> {
    persistent: Persistent<F, T>,
    config: StoreConfig,
    layout: StoreLayout,
    start_index: u8,
}

impl<F: NvmFlash, T: PeriodicTicker> ChunkStore<F, T> {
    /// Locate the store on `flash`, initialising the identity if needed
    ///
    /// Draws the per-mount allocation start index from `entropy`.
    pub fn mount<E: EntropySource>(
        flash: F,
        ticker: T,
        entropy: &mut E,
        config: StoreConfig,
    ) -> Result<Self, Error> {
        let mut persistent = Persistent::new(flash, ticker);
        let geometry = Geometry::compute(&config, persistent.block_size())?;
        let layout = StoreLayout::bootstrap(&mut persistent, geometry)?;
        let start_index = allocator::random_start_index(entropy, layout.chunk_count());

        info!(
            "mounted {=u8} chunks, identity at {=u32:#x}, start {=u8}",
            layout.chunk_count(),
            layout.marker_block(),
            start_index
        );

        Ok(Self {
            persistent,
            config,
            layout,
            start_index,
        })
    }

    /// Current layout
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Configuration the store was mounted with
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Chunk index allocation searches start from
    pub fn start_index(&self) -> u8 {
        self.start_index
    }

    /// Underlying flash and ticker
    pub fn persistent(&self) -> &Persistent<F, T> {
        &self.persistent
    }

    /// Give back the flash device and ticker
    pub fn into_parts(self) -> (F, T) {
        self.persistent.into_parts()
    }

    /// State of chunk `index`
    pub fn marker(&mut self, index: u8) -> Result<Marker, Error> {
        let addr = self.field_addr(index, MARKER_OFFSET)?;
        Ok(Marker::from_byte(self.persistent.read_byte(addr)?))
    }

    /// Raw forward link of chunk `index`
    pub fn next_link(&mut self, index: u8) -> Result<u8, Error> {
        let addr = self.field_addr(index, NEXT_OFFSET)?;
        self.persistent.read_byte(addr)
    }

    /// Read bytes of chunk `index` starting at `offset` within the chunk
    pub fn read_chunk(&mut self, index: u8, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        let addr = self.field_addr(index, offset)?;
        self.persistent.read(addr, buf)
    }

    /// Write into a chunk the allocator just handed out
    pub(crate) fn write_fresh(
        &mut self,
        chunk: &FreshChunk,
        offset: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        self.write_erased(chunk.index(), offset, data)
    }

    /// Write bytes known to be erased (past the write position of a chunk)
    pub(crate) fn write_erased(&mut self, index: u8, offset: u32, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }
        let addr = self.field_addr(index, offset)?;
        self.persistent.write_assume_erased(addr, data)
    }

    /// Write bytes whose current content is unknown
    pub(crate) fn write_merge(&mut self, index: u8, offset: u32, data: &[u8]) -> Result<(), Error> {
        let addr = self.field_addr(index, offset)?;
        self.persistent.write_merge(addr, data)
    }

    /// Append `next` to the chain after `prev`
    ///
    /// Writes the forward link first, then the back-pointer marker.
    pub(crate) fn link(&mut self, prev: u8, next: &FreshChunk) -> Result<(), Error> {
        self.write_merge(prev, NEXT_OFFSET, &[next.index()])?;
        self.write_fresh(next, MARKER_OFFSET, &[prev])
    }

    /// Mark every chunk of the chain starting at `start` as released
    ///
    /// Stops at the first link outside the store (normally `UNUSED`).
    /// Releasing only clears bits, so no erase is ever needed.
    pub fn release_chain(&mut self, start: u8) -> Result<(), Error> {
        let mut chunk = start;
        for _ in 0..self.layout.chunk_count() {
            trace!("releasing chunk {=u8}", chunk);
            self.write_merge(chunk, MARKER_OFFSET, &[FREED_CHUNK])?;
            let next = self.next_link(chunk)?;
            if !self.layout.contains(next) {
                return Ok(());
            }
            chunk = next;
        }
        warn!("chain from chunk {=u8} does not terminate", start);
        Err(Error::Corrupt)
    }

    /// Count chunks by state
    pub fn stats(&mut self) -> Result<StoreStats, Error> {
        let mut stats = StoreStats::default();
        for index in 1..=self.layout.chunk_count() {
            match self.marker(index)? {
                Marker::Unused => stats.unused += 1,
                Marker::Freed => stats.freed += 1,
                Marker::FileStart => stats.files += 1,
                Marker::Data(_) => stats.data += 1,
            }
        }
        Ok(stats)
    }

    /// Number of sweeps recorded in the identity block
    pub fn sweep_count(&mut self) -> Result<u32, Error> {
        let block = self.layout.marker_block();
        Ok(StoreIdentity::load(&mut self.persistent, block)?
            .map(|identity| identity.sweeps)
            .unwrap_or(0))
    }

    fn field_addr(&self, index: u8, offset: u32) -> Result<u32, Error> {
        Ok(self.layout.chunk_addr(index)? + offset)
    }
}
