//! Flash driver for RP2040
//!
//! Exposes the external QSPI NOR flash as [`NvmFlash`]. Addresses are
//! offsets from the start of flash (not XIP addresses); the store region
//! is usually placed between the end of the firmware image and any
//! partitions reserved at the top of flash.

use embassy_rp::flash::{Blocking, Error, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;

// Re-export shared types from chunkfs-hal
pub use chunkfs_hal::flash::{FlashError, NvmFlash};

/// Flash size on Pico-class boards
pub const FLASH_SIZE: usize = 2 * 1024 * 1024; // 2MB

/// Flash erase size for RP2040
pub const FLASH_ERASE_SIZE: usize = ERASE_SIZE;

/// RP2040 NOR flash in blocking mode
///
/// Blocking mode is used because every store operation runs to completion
/// on the calling context.
pub struct Rp2040Nvm<'d> {
    flash: Flash<'d, FLASH, Blocking, FLASH_SIZE>,
}

impl<'d> Rp2040Nvm<'d> {
    /// Create a new flash driver
    pub fn new(flash: Peri<'d, FLASH>) -> Self {
        Self {
            flash: Flash::new_blocking(flash),
        }
    }

    /// Get the raw flash peripheral for low-level access
    pub fn flash(&mut self) -> &mut Flash<'d, FLASH, Blocking, FLASH_SIZE> {
        &mut self.flash
    }
}

fn map_error(e: Error) -> FlashError {
    match e {
        Error::OutOfBounds => FlashError::OutOfBounds,
        Error::Unaligned => FlashError::Unaligned,
        _ => FlashError::Flash,
    }
}

impl<'d> NvmFlash for Rp2040Nvm<'d> {
    fn erase_block_size(&self) -> u32 {
        FLASH_ERASE_SIZE as u32
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        self.flash.blocking_read(addr, buf).map_err(map_error)
    }

    fn erase_block(&mut self, addr: u32) -> Result<(), FlashError> {
        if addr % FLASH_ERASE_SIZE as u32 != 0 {
            return Err(FlashError::Unaligned);
        }
        self.flash
            .blocking_erase(addr, addr + FLASH_ERASE_SIZE as u32)
            .map_err(map_error)
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        self.flash.blocking_write(addr, data).map_err(map_error)
    }
}
