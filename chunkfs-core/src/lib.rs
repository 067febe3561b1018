//! Wear-leveled chunk file store for NOR flash
//!
//! A flat namespace of named byte streams kept directly in a span of erase
//! blocks, for microcontrollers without an operating system:
//!
//! - Raw program primitive honoring "program only clears bits"
//! - Store geometry bootstrap, identity marker probing, and recovery
//!   from a sweep cut short by power loss
//! - Chunk allocator with randomized start (wear leveling)
//! - Block reclamation and whole-store sweep (compaction)
//! - File table operations: open, read, write, close, remove, list, size
//!
//! # On-flash format
//!
//! ```text
//! ┌────────┬──────────────────────────────────┬──────┐
//! │ MARKER │ PAYLOAD                          │ NEXT │
//! │ 1B     │ 126B                             │ 1B   │
//! └────────┴──────────────────────────────────┴──────┘
//! ```
//!
//! A file is a forward-linked chain of 128-byte chunks. The first chunk's
//! payload starts with a header (`end_offset`, `name_len`, name). All state
//! lives in flash; RAM holds only the layout and open descriptors.

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

#[macro_use]
mod fmt;

pub mod chunk;
pub mod config;
pub mod error;
pub mod fs;
pub mod layout;
pub mod persistent;
pub mod store;

pub use chunk::{Marker, CHUNK_SIZE, DATA_PER_CHUNK, MAX_FILENAME_LENGTH};
pub use config::{ConfigError, StoreConfig};
pub use error::Error;
pub use fs::{FileDescriptor, FileName, FileSystem, OpenMode};
pub use layout::{Geometry, StoreEnd, StoreIdentity, StoreLayout};
pub use store::{ChunkStore, StoreStats};
