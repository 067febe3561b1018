//! Store layout and bootstrap
//!
//! [`Geometry`] fixes the physical span of the store. [`StoreLayout`] adds
//! the orientation found by probing both ends for the identity marker and
//! translates chunk indices to flash addresses.
//!
//! ```text
//!  marker at low end:   [ID][1..k][k+1..2k] ... [..N]
//!  marker at high end:  [1..k][k+1..2k] ... [..N][ID]
//! ```

pub mod geometry;
pub mod identity;
pub mod recovery;

pub use geometry::Geometry;
pub use identity::StoreIdentity;

use chunkfs_hal::{NvmFlash, PeriodicTicker};

use crate::chunk::{CHUNK_SIZE, STORE_MARKER};
use crate::error::Error;
use crate::persistent::Persistent;

/// Which end of the store holds the identity block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreEnd {
    /// Lowest erase block
    Low,
    /// Highest erase block
    High,
}

impl StoreEnd {
    /// The other end
    pub fn opposite(self) -> Self {
        match self {
            StoreEnd::Low => StoreEnd::High,
            StoreEnd::High => StoreEnd::Low,
        }
    }
}

/// Geometry plus orientation: the live view of the chunk array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoreLayout {
    geometry: Geometry,
    marker_end: StoreEnd,
}

impl StoreLayout {
    /// Layout with the identity block at `marker_end`
    pub fn new(geometry: Geometry, marker_end: StoreEnd) -> Self {
        Self {
            geometry,
            marker_end,
        }
    }

    /// Probe both ends for the identity marker and derive the layout
    ///
    /// With no marker at either end the store is initialised at the end
    /// chosen by [`recovery::recover_end`], which for a fresh device is
    /// the high end.
    pub fn bootstrap<F: NvmFlash, T: PeriodicTicker>(
        persistent: &mut Persistent<F, T>,
        geometry: Geometry,
    ) -> Result<Self, Error> {
        if persistent.read_byte(geometry.low_block())? == STORE_MARKER {
            debug!("store identity at low end");
            return Ok(Self::new(geometry, StoreEnd::Low));
        }
        if persistent.read_byte(geometry.high_block())? == STORE_MARKER {
            debug!("store identity at high end");
            return Ok(Self::new(geometry, StoreEnd::High));
        }

        let layout = Self::new(geometry, recovery::recover_end(persistent, &geometry)?);
        let block = layout.marker_block();
        if !block_is_erased(persistent, block, geometry.block_size())? {
            warn!("no store identity, discarding block {=u32:#x}", block);
            persistent.erase_block(block)?;
        }
        info!("initialising store identity at {=u32:#x}", block);
        StoreIdentity::new().store_erased(persistent, block)?;
        Ok(layout)
    }

    /// Physical span of the store
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// End currently holding the identity block
    pub fn marker_end(&self) -> StoreEnd {
        self.marker_end
    }

    /// Address of the identity block
    pub fn marker_block(&self) -> u32 {
        match self.marker_end {
            StoreEnd::Low => self.geometry.low_block(),
            StoreEnd::High => self.geometry.high_block(),
        }
    }

    /// Address of the block at the end opposite the identity block
    pub fn far_block(&self) -> u32 {
        match self.marker_end {
            StoreEnd::Low => self.geometry.high_block(),
            StoreEnd::High => self.geometry.low_block(),
        }
    }

    /// Number of usable chunks
    pub fn chunk_count(&self) -> u8 {
        self.geometry.chunk_count()
    }

    /// Erase block size in bytes
    pub fn block_size(&self) -> u32 {
        self.geometry.block_size()
    }

    /// Chunks per erase block
    pub fn chunks_per_block(&self) -> u8 {
        self.geometry.chunks_per_block()
    }

    /// Whether `index` names a chunk of this store
    pub fn contains(&self, index: u8) -> bool {
        index != 0 && index <= self.chunk_count()
    }

    /// Address of chunk `index`
    ///
    /// Fails with [`Error::Corrupt`] for 0 or anything past the last chunk.
    pub fn chunk_addr(&self, index: u8) -> Result<u32, Error> {
        if !self.contains(index) {
            return Err(Error::Corrupt);
        }
        Ok(self.first_chunk_addr() + (index as u32 - 1) * CHUNK_SIZE as u32)
    }

    /// Whether chunk `index` is the first chunk of an erase block
    pub fn is_block_start(&self, index: u8) -> bool {
        self.contains(index) && (index - 1) % self.chunks_per_block() == 0
    }

    fn first_chunk_addr(&self) -> u32 {
        match self.marker_end {
            StoreEnd::Low => self.geometry.low_block() + self.geometry.block_size(),
            StoreEnd::High => self.geometry.low_block(),
        }
    }
}

/// Whether every byte of the block at `block` reads as erased
pub(crate) fn block_is_erased<F: NvmFlash, T: PeriodicTicker>(
    persistent: &mut Persistent<F, T>,
    block: u32,
    block_size: u32,
) -> Result<bool, Error> {
    let mut buffer = [0u8; 32];
    let mut addr = block;
    while addr < block + block_size {
        persistent.read(addr, &mut buffer)?;
        if buffer.iter().any(|&b| b != 0xFF) {
            return Ok(false);
        }
        addr += buffer.len() as u32;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use chunkfs_hal::sim::{CountingTicker, SimFlash};

    // 6 blocks of 256 bytes: 5 data blocks (10 chunks) plus identity
    fn setup() -> (Persistent<SimFlash, CountingTicker>, Geometry) {
        let flash = SimFlash::new(0, 256, 6);
        let config = StoreConfig::new(0, flash.end());
        let geometry = Geometry::compute(&config, 256).unwrap();
        (Persistent::new(flash, CountingTicker::new()), geometry)
    }

    #[test]
    fn test_first_boot_marks_high_end() {
        let (mut p, geometry) = setup();
        assert_eq!(geometry.chunk_count(), 10);

        let layout = StoreLayout::bootstrap(&mut p, geometry).unwrap();
        assert_eq!(layout.marker_end(), StoreEnd::High);
        assert_eq!(p.read_byte(0x500).unwrap(), STORE_MARKER);
        assert_eq!(layout.chunk_addr(1).unwrap(), 0);
        assert_eq!(layout.chunk_addr(10).unwrap(), 0x480);
    }

    #[test]
    fn test_existing_marker_at_low_end() {
        let (mut p, geometry) = setup();
        p.write_byte_assume_erased(0, STORE_MARKER).unwrap();

        let layout = StoreLayout::bootstrap(&mut p, geometry).unwrap();
        assert_eq!(layout.marker_end(), StoreEnd::Low);
        assert_eq!(layout.chunk_addr(1).unwrap(), 0x100);
        assert_eq!(layout.chunk_addr(10).unwrap(), 0x580);
        assert_eq!(layout.far_block(), 0x500);
        // Nothing written during a plain mount
        assert_eq!(p.flash().program_count(), 1);
    }

    #[test]
    fn test_recovery_prefers_erased_low_end() {
        let (mut p, geometry) = setup();
        // Data at the high end, low end erased, no marker anywhere
        p.write_assume_erased(0x500, &[0xFE, 5]).unwrap();

        let layout = StoreLayout::bootstrap(&mut p, geometry).unwrap();
        assert_eq!(layout.marker_end(), StoreEnd::Low);
        assert_eq!(p.read_byte(0).unwrap(), STORE_MARKER);
        assert_eq!(p.read_byte(0x500).unwrap(), 0xFE);
    }

    #[test]
    fn test_recovery_discards_dirty_high_block() {
        let (mut p, geometry) = setup();
        p.write_assume_erased(0x000, &[0x01]).unwrap();
        p.write_assume_erased(0x510, &[0x00]).unwrap();

        let layout = StoreLayout::bootstrap(&mut p, geometry).unwrap();
        assert_eq!(layout.marker_end(), StoreEnd::High);
        assert_eq!(p.read_byte(0x500).unwrap(), STORE_MARKER);
        assert_eq!(p.read_byte(0x510).unwrap(), 0xFF);
        assert_eq!(p.read_byte(0x000).unwrap(), 0x01);
    }

    #[test]
    fn test_recovery_follows_chain_links() {
        let (mut p, geometry) = setup();
        // Both ends erased; a two-chunk file that only links up when chunk 1
        // sits at 0x100
        let mut start = [0xFFu8; CHUNK_SIZE];
        start[0] = crate::chunk::FILE_START;
        start[CHUNK_SIZE - 1] = 2;
        p.write_assume_erased(0x100, &start).unwrap();
        p.write_assume_erased(0x180, &[1]).unwrap();

        let layout = StoreLayout::bootstrap(&mut p, geometry).unwrap();
        assert_eq!(layout.marker_end(), StoreEnd::Low);
        assert_eq!(layout.chunk_addr(2).unwrap(), 0x180);
    }

    #[test]
    fn test_chunk_index_bounds() {
        let layout = StoreLayout::new(
            Geometry::compute(&StoreConfig::new(0, 0x600), 256).unwrap(),
            StoreEnd::High,
        );
        assert_eq!(layout.chunk_addr(0), Err(Error::Corrupt));
        assert_eq!(layout.chunk_addr(11), Err(Error::Corrupt));
        assert_eq!(layout.chunk_addr(0xFF), Err(Error::Corrupt));
        assert!(layout.is_block_start(1));
        assert!(!layout.is_block_start(2));
        assert!(layout.is_block_start(3));
    }
}
