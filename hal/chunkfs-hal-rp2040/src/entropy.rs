//! Entropy from the ring oscillator
//!
//! The ROSC `RANDOMBIT` register yields one jittery bit per read. It is
//! not a cryptographic source but is plenty for spreading flash wear.

use embassy_rp::pac;

pub use chunkfs_hal::entropy::EntropySource;

/// Random bytes assembled from ROSC random bits
#[derive(Debug, Clone, Copy, Default)]
pub struct RoscEntropy;

impl EntropySource for RoscEntropy {
    fn random_byte(&mut self) -> u8 {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | pac::ROSC.randombit().read().randombit() as u8;
        }
        byte
    }
}
