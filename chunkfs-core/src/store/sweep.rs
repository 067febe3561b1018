//! Whole-store sweep
//!
//! Moves every erase block one position toward the identity end, dropping
//! released chunks on the way, then puts the identity at the opposite end.
//! Chunk indices are counted from the end without the identity, so every
//! chunk keeps its index and open descriptors stay valid.
//!
//! ```text
//!  before:  [1,2][3,4][5,6][ID]
//!  after:   [ID][1,2][3,4][5,6]
//! ```
//!
//! The identity block is the first block erased and the new identity is
//! the last thing written. A power cut in between leaves no marker at
//! either end; mounting then works out the orientation from the blocks
//! themselves, see [`crate::layout::recovery`].

use chunkfs_hal::{NvmFlash, PeriodicTicker};

use super::ChunkStore;
use crate::chunk::{survives_sweep, CHUNK_SIZE};
use crate::error::Error;
use crate::layout::{StoreEnd, StoreIdentity, StoreLayout};

impl<F: NvmFlash, T: PeriodicTicker> ChunkStore<F, T> {
    /// Compact the store, erasing every released chunk
    ///
    /// Erases each block of the store once.
    pub fn sweep(&mut self) -> Result<(), Error> {
        let identity = StoreIdentity::load(&mut self.persistent, self.layout.marker_block())?
            .unwrap_or_default();
        let block_size = self.layout.block_size();
        let from = self.layout.marker_end();
        let far = self.layout.far_block();

        let sweeps = identity.sweeps.saturating_add(1);
        info!("sweep {=u32} starting", sweeps);

        let mut dest = self.layout.marker_block();
        while dest != far {
            let src = match from {
                StoreEnd::High => dest - block_size,
                StoreEnd::Low => dest + block_size,
            };
            self.relocate_block(dest, src)?;
            dest = src;
        }

        self.persistent.erase_block(far)?;
        let identity = StoreIdentity { sweeps, ..identity };
        identity.store_erased(&mut self.persistent, far)?;
        self.layout = StoreLayout::new(*self.layout.geometry(), from.opposite());

        debug!("sweep done, identity at {=u32:#x}", far);
        Ok(())
    }

    /// Erase `dest` and copy the live and open chunks of `src` into it
    fn relocate_block(&mut self, dest: u32, src: u32) -> Result<(), Error> {
        trace!("relocating block {=u32:#x} to {=u32:#x}", src, dest);
        self.persistent.erase_block(dest)?;

        let mut chunk = [0u8; CHUNK_SIZE];
        let mut offset = 0;
        while offset < self.layout.block_size() {
            self.persistent.read(src + offset, &mut chunk)?;
            if survives_sweep(&chunk) {
                self.persistent.write_assume_erased(dest + offset, &chunk)?;
            }
            offset += CHUNK_SIZE as u32;
        }
        Ok(())
    }
}
