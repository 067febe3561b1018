//! chunkfs Hardware Abstraction Layer
//!
//! This crate defines the platform traits the chunk store is built on.
//! Chip-specific crates (RP2040, ...) implement them; the store itself
//! never touches a peripheral directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Caller (script runtime, firmware app)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  chunkfs-core (file table, allocator)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  chunkfs-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ chunkfs-hal-  │       │  sim (RAM,    │
//! │    rp2040     │       │  host tests)  │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`flash::NvmFlash`] - Erase-block NOR flash (program clears bits only)
//! - [`ticker::PeriodicTicker`] - Periodic interrupt paused around flash operations
//! - [`entropy::EntropySource`] - Hardware random bytes for wear leveling

#![no_std]
#![deny(unsafe_code)]

#[cfg(feature = "sim")]
extern crate alloc;

pub mod entropy;
pub mod flash;
pub mod ticker;

#[cfg(feature = "sim")]
pub mod sim;

// Re-export key traits at crate root for convenience
pub use entropy::EntropySource;
pub use flash::{FlashError, NvmFlash};
pub use ticker::{InterruptMask, MaskingTicker, NoTicker, PeriodicTicker};
