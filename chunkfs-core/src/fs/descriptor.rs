//! Open file handles

/// Handle to an open file
///
/// Holds chunk indices only. The chain on flash is the durable record;
/// dropping a descriptor without closing it leaves a file being written
/// with no recorded length, which reads back as empty.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FileDescriptor {
    pub(crate) start_chunk: u8,
    pub(crate) seek_chunk: u8,
    pub(crate) seek_offset: u8,
    pub(crate) writable: bool,
    pub(crate) open: bool,
    pub(crate) binary: bool,
}

impl FileDescriptor {
    /// Descriptor positioned on the first data byte after the header
    pub(crate) fn new(start_chunk: u8, name_len: u8, writable: bool, binary: bool) -> Self {
        Self {
            start_chunk,
            seek_chunk: start_chunk,
            seek_offset: name_len + crate::chunk::HEADER_SIZE as u8,
            writable,
            open: true,
            binary,
        }
    }

    /// Index of the file's `FILE_START` chunk
    pub fn start_chunk(&self) -> u8 {
        self.start_chunk
    }

    /// Chunk holding the current position
    pub fn seek_chunk(&self) -> u8 {
        self.seek_chunk
    }

    /// Payload offset of the current position within [`Self::seek_chunk`]
    pub fn seek_offset(&self) -> u8 {
        self.seek_offset
    }

    /// Opened for writing
    pub fn writable(&self) -> bool {
        self.writable
    }

    /// Opened in binary mode
    pub fn binary(&self) -> bool {
        self.binary
    }

    /// Not yet closed
    pub fn is_open(&self) -> bool {
        self.open
    }
}
