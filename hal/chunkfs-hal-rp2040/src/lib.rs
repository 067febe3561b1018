//! RP2040 platform layer for chunkfs
//!
//! Implements the `chunkfs-hal` traits on top of `embassy-rp`:
//!
//! - [`flash::Rp2040Nvm`] - QSPI NOR flash in blocking mode
//! - [`ticker::IrqTicker`] - masks a timer interrupt around flash operations,
//!   leaving it off if the application had it off
//! - [`entropy::RoscEntropy`] - random bits from the ring oscillator

#![no_std]

pub mod entropy;
pub mod flash;
pub mod ticker;

pub use entropy::RoscEntropy;
pub use flash::Rp2040Nvm;
pub use ticker::{IrqTicker, NvicLine};

// Re-export shared traits from chunkfs-hal for convenience
pub use chunkfs_hal::{EntropySource, FlashError, NvmFlash, PeriodicTicker};
