//! Store error type
//!
//! Every operation reports its outcome as a value; nothing is logged
//! globally and nothing is silently truncated.

use chunkfs_hal::FlashError;

use crate::config::ConfigError;

/// Errors from chunk store and file operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No file with the requested name
    NotFound,
    /// No free chunk, even after reclamation and one sweep
    OutOfSpace,
    /// Name does not fit in a file header
    IllegalNameLength,
    /// Scratch buffer for a block rewrite could not be allocated
    AllocationFailure,
    /// Read, write or close on a descriptor that is already closed
    ClosedHandleUse,
    /// Descriptor opened in the other direction, or its file was removed
    BadDescriptor,
    /// Mode string is not a valid combination of `r`/`w` and `b`/`t`
    IllegalMode,
    /// Out-of-range chunk index or looping chain found in flash
    Corrupt,
    /// Store configuration is unusable for this device
    Config(ConfigError),
    /// Platform flash operation failed
    Flash(FlashError),
}

impl From<FlashError> for Error {
    fn from(e: FlashError) -> Self {
        Error::Flash(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}
