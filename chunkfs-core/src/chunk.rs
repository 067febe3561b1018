//! On-flash chunk format
//!
//! Chunk layout:
//! - MARKER (1 byte): state tag, see [`Marker`]
//! - PAYLOAD (126 bytes): file data, or a file header in a `FILE_START` chunk
//! - NEXT (1 byte): index of the next chunk in the file, `0xFF` ends the chain
//!
//! File header (start of a `FILE_START` payload):
//! - END_OFFSET (1 byte): where valid data ends in the final chunk, `0xFF` while open
//! - NAME_LEN (1 byte)
//! - NAME (up to 120 bytes, not terminated; unused bytes stay erased)

/// log2 of the chunk size
pub const LOG_CHUNK_SIZE: u32 = 7;

/// Size of a chunk in bytes
pub const CHUNK_SIZE: usize = 1 << LOG_CHUNK_SIZE;

/// Payload bytes per chunk
pub const DATA_PER_CHUNK: usize = CHUNK_SIZE - 2;

/// Longest file name a header can hold
pub const MAX_FILENAME_LENGTH: usize = 120;

/// Header bytes before the name (`end_offset`, `name_len`)
pub const HEADER_SIZE: usize = 2;

/// Erased chunk, immediately allocatable
pub const UNUSED_CHUNK: u8 = 0xFF;

/// Released chunk, needs an erase before reuse
pub const FREED_CHUNK: u8 = 0x00;

/// First chunk of a file
pub const FILE_START: u8 = 0xFE;

/// First byte of the store identity block
pub const STORE_MARKER: u8 = 0xFD;

/// Offset of the marker byte within a chunk
pub const MARKER_OFFSET: u32 = 0;

/// Offset of the payload within a chunk
pub const DATA_OFFSET: u32 = 1;

/// Offset of the forward link within a chunk
pub const NEXT_OFFSET: u32 = (CHUNK_SIZE - 1) as u32;

/// Offset of the header's `end_offset` within a chunk
pub const END_OFFSET_OFFSET: u32 = DATA_OFFSET;

/// Offset of the header's `name_len` within a chunk
pub const NAME_LEN_OFFSET: u32 = DATA_OFFSET + 1;

/// Offset of the header's name within a chunk
pub const NAME_OFFSET: u32 = DATA_OFFSET + HEADER_SIZE as u32;

// The header must leave room for at least one data byte
const _: () = assert!(HEADER_SIZE + MAX_FILENAME_LENGTH < DATA_PER_CHUNK);

/// Chunk state, decoded from the marker byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Marker {
    /// Erased and free
    Unused,
    /// Released but not yet erased
    Freed,
    /// First chunk of a file, payload holds the header
    FileStart,
    /// File data; the value is the index of the preceding chunk
    Data(u8),
}

impl Marker {
    /// Decode a marker byte
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            UNUSED_CHUNK => Marker::Unused,
            FREED_CHUNK => Marker::Freed,
            FILE_START => Marker::FileStart,
            prev => Marker::Data(prev),
        }
    }

    /// Encode as a marker byte
    pub fn as_u8(self) -> u8 {
        match self {
            Marker::Unused => UNUSED_CHUNK,
            Marker::Freed => FREED_CHUNK,
            Marker::FileStart => FILE_START,
            Marker::Data(prev) => prev,
        }
    }

    /// Whether the chunk belongs to a file
    pub fn is_live(self) -> bool {
        matches!(self, Marker::FileStart | Marker::Data(_))
    }
}

/// Whether a sweep copies this chunk into the next block
///
/// Released chunks and fully erased slots are left behind.
pub fn survives_sweep(chunk: &[u8; CHUNK_SIZE]) -> bool {
    chunk[MARKER_OFFSET as usize] != FREED_CHUNK && chunk.iter().any(|&b| b != UNUSED_CHUNK)
}
