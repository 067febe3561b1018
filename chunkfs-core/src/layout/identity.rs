//! Store identity record
//!
//! The identity block starts with the [`STORE_MARKER`] byte; finding it at
//! the low or high end of the store tells which way the store currently
//! faces. The bytes after the marker carry a small postcard-encoded
//! record that survives sweeps.

use chunkfs_hal::{NvmFlash, PeriodicTicker};
use serde::{Deserialize, Serialize};

use crate::chunk::STORE_MARKER;
use crate::error::Error;
use crate::persistent::Persistent;

/// Current identity record version
pub const IDENTITY_VERSION: u8 = 1;

/// Bytes reserved for marker plus record
const IDENTITY_SIZE: usize = 16;

/// Persistent data kept in the identity block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoreIdentity {
    /// Record format version
    pub version: u8,
    /// Number of completed sweeps
    pub sweeps: u32,
}

impl Default for StoreIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreIdentity {
    /// Fresh record for a newly initialised store
    pub const fn new() -> Self {
        Self {
            version: IDENTITY_VERSION,
            sweeps: 0,
        }
    }

    /// Read the record from the block at `block`
    ///
    /// Returns `None` when the block does not start with the marker. A
    /// marker followed by an undecodable record yields a fresh record.
    pub fn load<F: NvmFlash, T: PeriodicTicker>(
        persistent: &mut Persistent<F, T>,
        block: u32,
    ) -> Result<Option<Self>, Error> {
        let mut buffer = [0u8; IDENTITY_SIZE];
        persistent.read(block, &mut buffer)?;
        if buffer[0] != STORE_MARKER {
            return Ok(None);
        }
        Ok(Some(postcard::from_bytes(&buffer[1..]).unwrap_or_default()))
    }

    /// Write marker and record into the erased block at `block`
    pub fn store_erased<F: NvmFlash, T: PeriodicTicker>(
        &self,
        persistent: &mut Persistent<F, T>,
        block: u32,
    ) -> Result<(), Error> {
        let mut buffer = [0xFFu8; IDENTITY_SIZE];
        buffer[0] = STORE_MARKER;
        let len = postcard::to_slice(self, &mut buffer[1..])
            .map_err(|_| Error::Corrupt)?
            .len();
        persistent.write_assume_erased(block, &buffer[..1 + len])
    }
}
