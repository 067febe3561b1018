//! Orientation recovery
//!
//! A sweep erases the identity block first and writes the new identity
//! last, so a power cut in between leaves no marker at either end. Each
//! end block is then compared with its inward neighbour:
//!
//! - [`EndState::Relocated`]: holds the start of a sweep's copy of the
//!   neighbour. The sweep began here, or finished copying into the
//!   neighbour; either way the block duplicates live data.
//! - [`EndState::Erased`]: nothing is lost by putting the identity here.
//! - [`EndState::Occupied`]: holds chunks found nowhere else.
//!
//! The end ranked higher in that order gets the identity. Between equal
//! ends, the orientation under which more chain links agree wins, and
//! the high end breaks a remaining tie.

use chunkfs_hal::{NvmFlash, PeriodicTicker};

use super::{Geometry, StoreEnd, StoreLayout};
use crate::chunk::{survives_sweep, Marker, CHUNK_SIZE, NEXT_OFFSET, UNUSED_CHUNK};
use crate::error::Error;
use crate::persistent::Persistent;

/// What an end block holds, compared with its inward neighbour
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EndState {
    /// Live chunks that exist nowhere else
    Occupied,
    /// Every byte erased
    Erased,
    /// A prefix of the chunks a sweep would copy out of the neighbour
    Relocated,
}

/// Pick the end for a new identity when neither end carries a marker
pub fn recover_end<F: NvmFlash, T: PeriodicTicker>(
    persistent: &mut Persistent<F, T>,
    geometry: &Geometry,
) -> Result<StoreEnd, Error> {
    let block_size = geometry.block_size();
    let low = classify(
        persistent,
        geometry.low_block(),
        geometry.low_block() + block_size,
        block_size,
    )?;
    let high = classify(
        persistent,
        geometry.high_block(),
        geometry.high_block() - block_size,
        block_size,
    )?;
    debug!("no identity: low end {}, high end {}", low, high);

    if low != high {
        return Ok(if low > high { StoreEnd::Low } else { StoreEnd::High });
    }
    if low == EndState::Occupied {
        warn!("both end blocks hold live chunks");
    }

    let low_links = agreeing_links(persistent, &StoreLayout::new(*geometry, StoreEnd::Low))?;
    let high_links = agreeing_links(persistent, &StoreLayout::new(*geometry, StoreEnd::High))?;
    Ok(if low_links > high_links {
        StoreEnd::Low
    } else {
        StoreEnd::High
    })
}

/// Compare the block at `block` with the one at `neighbour`
///
/// A sweep copies the surviving chunks of its source in order, each to the
/// same offset, and skips the rest. A cut during a chunk program leaves a
/// chunk with only some of its bits cleared; nothing follows it.
pub fn classify<F: NvmFlash, T: PeriodicTicker>(
    persistent: &mut Persistent<F, T>,
    block: u32,
    neighbour: u32,
    block_size: u32,
) -> Result<EndState, Error> {
    let mut dest = [0u8; CHUNK_SIZE];
    let mut src = [0u8; CHUNK_SIZE];
    let mut state = EndState::Erased;
    let mut copying = true;

    let mut offset = 0;
    while offset < block_size {
        persistent.read(block + offset, &mut dest)?;
        persistent.read(neighbour + offset, &mut src)?;
        offset += CHUNK_SIZE as u32;

        let erased = dest.iter().all(|&b| b == UNUSED_CHUNK);
        if !survives_sweep(&src) {
            if !erased {
                return Ok(EndState::Occupied);
            }
            continue;
        }
        if erased {
            copying = false;
        } else if !copying {
            return Ok(EndState::Occupied);
        } else if dest == src {
            state = EndState::Relocated;
        } else if dest.iter().zip(&src).all(|(&d, &s)| d & s == s) {
            state = EndState::Relocated;
            copying = false;
        } else {
            return Ok(EndState::Occupied);
        }
    }
    Ok(state)
}

/// Data chunks whose back-pointer names a chunk linking forward to them
fn agreeing_links<F: NvmFlash, T: PeriodicTicker>(
    persistent: &mut Persistent<F, T>,
    layout: &StoreLayout,
) -> Result<u32, Error> {
    let mut agreeing = 0;
    for index in 1..=layout.chunk_count() {
        let marker = Marker::from_byte(persistent.read_byte(layout.chunk_addr(index)?)?);
        let Marker::Data(prev) = marker else {
            continue;
        };
        if !layout.contains(prev) {
            continue;
        }
        if persistent.read_byte(layout.chunk_addr(prev)? + NEXT_OFFSET)? == index {
            agreeing += 1;
        }
    }
    Ok(agreeing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{FILE_START, FREED_CHUNK};
    use chunkfs_hal::sim::{CountingTicker, SimFlash};

    fn persistent() -> Persistent<SimFlash, CountingTicker> {
        Persistent::new(SimFlash::new(0, 256, 2), CountingTicker::new())
    }

    fn chunk(marker: u8, fill: u8) -> [u8; CHUNK_SIZE] {
        let mut chunk = [fill; CHUNK_SIZE];
        chunk[0] = marker;
        chunk
    }

    #[test]
    fn test_erased_block() {
        let mut p = persistent();
        p.write_assume_erased(0x100, &chunk(FILE_START, 1)).unwrap();
        assert_eq!(classify(&mut p, 0, 0x100, 256).unwrap(), EndState::Erased);
    }

    #[test]
    fn test_partial_copy_is_relocated() {
        let mut p = persistent();
        p.write_assume_erased(0x100, &chunk(FILE_START, 1)).unwrap();
        p.write_assume_erased(0x180, &chunk(3, 2)).unwrap();
        p.write_assume_erased(0x000, &chunk(FILE_START, 1)).unwrap();
        assert_eq!(classify(&mut p, 0, 0x100, 256).unwrap(), EndState::Relocated);

        p.write_assume_erased(0x080, &chunk(3, 2)).unwrap();
        assert_eq!(classify(&mut p, 0, 0x100, 256).unwrap(), EndState::Relocated);
    }

    #[test]
    fn test_torn_chunk_ends_the_copy() {
        let mut p = persistent();
        p.write_assume_erased(0x100, &chunk(FILE_START, 0x30)).unwrap();
        p.write_assume_erased(0x180, &chunk(3, 2)).unwrap();
        // Only the marker and part of the payload made it
        p.write_assume_erased(0x000, &[FILE_START, 0x30, 0x30]).unwrap();
        assert_eq!(classify(&mut p, 0, 0x100, 256).unwrap(), EndState::Relocated);

        p.write_assume_erased(0x080, &[3]).unwrap();
        assert_eq!(classify(&mut p, 0, 0x100, 256).unwrap(), EndState::Occupied);
    }

    #[test]
    fn test_released_chunks_are_not_copied() {
        let mut p = persistent();
        p.write_assume_erased(0x100, &chunk(FREED_CHUNK, 1)).unwrap();
        p.write_assume_erased(0x180, &chunk(FILE_START, 2)).unwrap();
        p.write_assume_erased(0x080, &chunk(FILE_START, 2)).unwrap();
        assert_eq!(classify(&mut p, 0, 0x100, 256).unwrap(), EndState::Relocated);

        // A released chunk in the end block was never put there by a sweep
        p.write_assume_erased(0x000, &chunk(FREED_CHUNK, 1)).unwrap();
        assert_eq!(classify(&mut p, 0, 0x100, 256).unwrap(), EndState::Occupied);
    }

    #[test]
    fn test_different_chunks_are_occupied() {
        let mut p = persistent();
        p.write_assume_erased(0x100, &chunk(FILE_START, 1)).unwrap();
        p.write_assume_erased(0x000, &chunk(FILE_START, 2)).unwrap();
        assert_eq!(classify(&mut p, 0, 0x100, 256).unwrap(), EndState::Occupied);
    }
}
