//! Raw program primitive
//!
//! Two ways to write flash, chosen at each call site:
//!
//! - [`Persistent::write_merge`] checks every byte against its current
//!   content. If the write only clears bits it is issued in place;
//!   otherwise the containing erase block is copied to a RAM scratch
//!   buffer, merged, erased and written back.
//! - [`Persistent::write_assume_erased`] skips the check. Only valid when
//!   the caller knows the destination is erased (fresh chunk, bytes past
//!   the write position, block erased just before).
//!
//! The periodic ticker is paused around every erase and program.

use alloc::vec::Vec;

use chunkfs_hal::{NvmFlash, PeriodicTicker};

use crate::error::Error;

/// Bytes compared per flash read when checking representability
const CHECK_SLICE: usize = 32;

/// Keeps the periodic ticker stopped while alive
struct TickerPause<'a, T: PeriodicTicker> {
    ticker: &'a mut T,
}

impl<'a, T: PeriodicTicker> TickerPause<'a, T> {
    fn new(ticker: &'a mut T) -> Self {
        ticker.stop();
        Self { ticker }
    }
}

impl<T: PeriodicTicker> Drop for TickerPause<'_, T> {
    fn drop(&mut self) {
        self.ticker.start();
    }
}

/// Flash device plus the ticker that must be paused while it is busy
pub struct Persistent<F, T> {
    flash: F,
    ticker: T,
}

impl<F: NvmFlash, T: PeriodicTicker> Persistent<F, T> {
    /// Wrap a flash device and its ticker
    pub fn new(flash: F, ticker: T) -> Self {
        Self { flash, ticker }
    }

    /// Erase block size of the device
    pub fn block_size(&self) -> u32 {
        self.flash.erase_block_size()
    }

    /// Whether `addr` is the first byte of an erase block
    pub fn is_block_aligned(&self, addr: u32) -> bool {
        addr & (self.block_size() - 1) == 0
    }

    /// Read `buf.len()` bytes at `addr`
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.flash.read(addr, buf)?;
        Ok(())
    }

    /// Read the byte at `addr`
    pub fn read_byte(&mut self, addr: u32) -> Result<u8, Error> {
        let mut byte = [0u8; 1];
        self.flash.read(addr, &mut byte)?;
        Ok(byte[0])
    }

    /// Reset the erase block at `addr` to all-ones
    pub fn erase_block(&mut self, addr: u32) -> Result<(), Error> {
        trace!("erase block {=u32:#x}", addr);
        let _pause = TickerPause::new(&mut self.ticker);
        self.flash.erase_block(addr)?;
        Ok(())
    }

    /// Program `data` at `addr` without checking the current content
    ///
    /// The destination must be erased (or only need bits cleared); any
    /// other content ends up as the AND of old and new bytes.
    pub fn write_assume_erased(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        let _pause = TickerPause::new(&mut self.ticker);
        self.flash.program(addr, data)?;
        Ok(())
    }

    /// Single-byte [`Self::write_assume_erased`]
    pub fn write_byte_assume_erased(&mut self, addr: u32, value: u8) -> Result<(), Error> {
        self.write_assume_erased(addr, &[value])
    }

    /// Program `data` at `addr` so that flash ends up holding exactly `data`
    ///
    /// Falls back to a copy-modify-erase-rewrite of each affected block
    /// when a byte would need a bit set. Fails with
    /// [`Error::AllocationFailure`] before touching flash if the scratch
    /// buffer cannot be allocated.
    pub fn write_merge(&mut self, addr: u32, data: &[u8]) -> Result<(), Error> {
        let block_size = self.block_size();
        let mut scratch: Option<Vec<u8>> = None;
        let mut dest = addr;
        let mut remaining = data;

        while !remaining.is_empty() {
            let block = dest & !(block_size - 1);
            let room = (block + block_size - dest) as usize;
            let (piece, rest) = remaining.split_at(room.min(remaining.len()));

            if self.can_write(dest, piece)? {
                self.write_assume_erased(dest, piece)?;
            } else {
                debug!("rewriting block {=u32:#x} for {=usize} bytes", block, piece.len());
                if scratch.is_none() {
                    scratch = Some(alloc_scratch(block_size as usize)?);
                }
                if let Some(buf) = scratch.as_mut() {
                    self.flash.read(block, buf)?;
                    let offset = (dest - block) as usize;
                    buf[offset..offset + piece.len()].copy_from_slice(piece);
                    self.erase_block(block)?;
                    self.write_assume_erased(block, buf)?;
                }
            }

            dest += piece.len() as u32;
            remaining = rest;
        }
        Ok(())
    }

    /// Single-byte [`Self::write_merge`]
    pub fn write_byte_merge(&mut self, addr: u32, value: u8) -> Result<(), Error> {
        self.write_merge(addr, &[value])
    }

    /// Whether `data` can be programmed at `addr` by clearing bits only
    fn can_write(&mut self, addr: u32, data: &[u8]) -> Result<bool, Error> {
        let mut current = [0u8; CHECK_SLICE];
        for (i, piece) in data.chunks(CHECK_SLICE).enumerate() {
            let existing = &mut current[..piece.len()];
            self.flash
                .read(addr + (i * CHECK_SLICE) as u32, existing)?;
            if existing.iter().zip(piece).any(|(&old, &new)| !old & new != 0) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Shared access to the flash device
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Shared access to the ticker
    pub fn ticker(&self) -> &T {
        &self.ticker
    }

    /// Give back the flash device and ticker
    pub fn into_parts(self) -> (F, T) {
        (self.flash, self.ticker)
    }
}

fn alloc_scratch(len: usize) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::AllocationFailure)?;
    buf.resize(len, 0);
    Ok(buf)
}
