//! NOR flash abstraction
//!
//! Models memory where programming can only clear bits and only a whole
//! erase block can be reset to all-ones. Addresses are absolute offsets
//! into the device as the platform sees them.

/// Errors from flash operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Flash operation failed on the device
    Flash,
    /// Address range lies outside the device
    OutOfBounds,
    /// Erase address is not aligned to an erase block
    Unaligned,
    /// A program would have needed to set a cleared bit
    ///
    /// Real hardware silently ANDs instead; only strict simulators report it.
    BitSetAttempt,
    /// Simulated power loss, no further operations are accepted
    PowerCut,
}

/// Erase-block NOR flash
///
/// Implementations perform the raw operation and nothing else: no
/// read-modify-write, no interrupt management. Callers are responsible
/// for only programming bytes whose erased state allows it.
pub trait NvmFlash {
    /// Size in bytes of the smallest erasable region
    ///
    /// Always a power of two.
    fn erase_block_size(&self) -> u32;

    /// Copy `buf.len()` bytes starting at `addr` into `buf`
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Reset the erase block starting at `addr` to all-ones
    ///
    /// Busy-waits until the device reports ready.
    fn erase_block(&mut self, addr: u32) -> Result<(), FlashError>;

    /// Program `data` at `addr`
    ///
    /// The resulting content is the bitwise AND of the old and new bytes.
    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError>;
}

impl<F: NvmFlash + ?Sized> NvmFlash for &mut F {
    fn erase_block_size(&self) -> u32 {
        (**self).erase_block_size()
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        (**self).read(addr, buf)
    }

    fn erase_block(&mut self, addr: u32) -> Result<(), FlashError> {
        (**self).erase_block(addr)
    }

    fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        (**self).program(addr, data)
    }
}
