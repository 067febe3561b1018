//! File table operations
//!
//! Flat namespace of named byte streams on top of [`ChunkStore`]. There is
//! no directory: every lookup scans the chunk array for a `FILE_START`
//! chunk whose header carries the name.

mod descriptor;
mod io;
mod mode;

pub use descriptor::FileDescriptor;
pub use mode::OpenMode;

use alloc::vec::Vec;

use chunkfs_hal::{EntropySource, NvmFlash, PeriodicTicker};

use crate::chunk::{
    Marker, DATA_PER_CHUNK, END_OFFSET_OFFSET, FILE_START, HEADER_SIZE, MARKER_OFFSET,
    MAX_FILENAME_LENGTH, NAME_LEN_OFFSET, NAME_OFFSET, UNUSED_CHUNK,
};
use crate::config::StoreConfig;
use crate::error::Error;
use crate::store::{ChunkStore, StoreStats};

/// A file name as stored in a header
pub type FileName = heapless::Vec<u8, MAX_FILENAME_LENGTH>;

/// Header of a `FILE_START` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    /// Payload offset where data ends in the last chunk, `UNUSED_CHUNK` while open
    pub(crate) end_offset: u8,
    pub(crate) name_len: u8,
}

impl Header {
    /// Payload offset of the first data byte
    pub(crate) fn data_start(&self) -> u8 {
        self.name_len + HEADER_SIZE as u8
    }
}

/// Mounted file system
pub struct FileSystem<F, T> {
    store: ChunkStore<F, T>,
}

impl<F: NvmFlash, T: PeriodicTicker> FileSystem<F, T> {
    /// Mount the store described by `config` on `flash`
    pub fn mount<E: EntropySource>(
        flash: F,
        ticker: T,
        entropy: &mut E,
        config: StoreConfig,
    ) -> Result<Self, Error> {
        Ok(Self::new(ChunkStore::mount(flash, ticker, entropy, config)?))
    }

    /// File system over an already mounted store
    pub fn new(store: ChunkStore<F, T>) -> Self {
        Self { store }
    }

    /// Underlying chunk store
    pub fn store(&self) -> &ChunkStore<F, T> {
        &self.store
    }

    /// Give back the flash device and ticker
    ///
    /// Open descriptors become meaningless once the store is gone.
    pub fn unmount(self) -> (F, T) {
        self.store.into_parts()
    }

    /// Index of the `FILE_START` chunk of `name`
    pub fn find(&mut self, name: &[u8]) -> Result<u8, Error> {
        if name.len() > MAX_FILENAME_LENGTH {
            return Err(Error::NotFound);
        }
        let mut stored = [0u8; MAX_FILENAME_LENGTH];
        for index in 1..=self.store.layout().chunk_count() {
            if self.store.marker(index)? != Marker::FileStart {
                continue;
            }
            let header = self.header(index)?;
            if header.name_len as usize != name.len() {
                continue;
            }
            let stored = &mut stored[..name.len()];
            self.store.read_chunk(index, NAME_OFFSET, stored)?;
            if stored == name {
                trace!("found file at chunk {=u8}", index);
                return Ok(index);
            }
        }
        Err(Error::NotFound)
    }

    /// Open `name` for reading, or create it for writing
    ///
    /// Opening for write replaces any existing file of the same name.
    /// Names longer than [`MAX_FILENAME_LENGTH`] are rejected before flash
    /// is touched.
    pub fn open(&mut self, name: &[u8], write: bool, binary: bool) -> Result<FileDescriptor, Error> {
        if name.len() > MAX_FILENAME_LENGTH {
            return Err(Error::IllegalNameLength);
        }
        let name_len = name.len() as u8;

        if !write {
            let start = self.find(name)?;
            return Ok(FileDescriptor::new(start, name_len, false, binary));
        }

        match self.find(name) {
            Ok(old) => self.store.release_chain(old)?,
            Err(Error::NotFound) => {}
            Err(e) => return Err(e),
        }

        let chunk = self.store.allocate()?;
        self.store.write_fresh(&chunk, MARKER_OFFSET, &[FILE_START])?;
        self.store.write_fresh(&chunk, NAME_LEN_OFFSET, &[name_len])?;
        self.store.write_fresh(&chunk, NAME_OFFSET, name)?;
        debug!("created file at chunk {=u8}", chunk.index());

        Ok(FileDescriptor::new(chunk.index(), name_len, true, binary))
    }

    /// [`Self::open`] with a mode string, see [`OpenMode::parse`]
    pub fn open_with_mode(&mut self, name: &[u8], mode: &str) -> Result<FileDescriptor, Error> {
        let mode = OpenMode::parse(mode)?;
        self.open(name, mode.write, mode.binary)
    }

    /// Delete `name`
    ///
    /// Its chunks are released, not erased; the space comes back through
    /// block reclamation or a sweep.
    pub fn remove(&mut self, name: &[u8]) -> Result<(), Error> {
        let start = self.find(name)?;
        debug!("removing file at chunk {=u8}", start);
        self.store.release_chain(start)
    }

    /// Names of all files, in chunk order
    pub fn list(&mut self) -> Result<Vec<FileName>, Error> {
        let mut names = Vec::new();
        for index in 1..=self.store.layout().chunk_count() {
            if self.store.marker(index)? == Marker::FileStart {
                names.push(self.name_at(index)?);
            }
        }
        Ok(names)
    }

    /// Length of `name` in bytes
    ///
    /// A file still open for writing has no recorded end; its last chunk
    /// counts as empty.
    pub fn size(&mut self, name: &[u8]) -> Result<u32, Error> {
        let start = self.find(name)?;
        let header = self.header(start)?;

        let mut chunk = start;
        let mut offset = header.data_start() as u32;
        let mut len = 0u32;
        for _ in 0..self.store.layout().chunk_count() {
            match self.follow(chunk)? {
                Some(next) => {
                    len += DATA_PER_CHUNK as u32 - offset;
                    chunk = next;
                    offset = 0;
                }
                None => {
                    if header.end_offset != UNUSED_CHUNK {
                        len += (header.end_offset as u32).saturating_sub(offset);
                    }
                    return Ok(len);
                }
            }
        }
        Err(Error::Corrupt)
    }

    /// Compact the store, see [`ChunkStore::sweep`]
    pub fn sweep(&mut self) -> Result<(), Error> {
        self.store.sweep()
    }

    /// Chunk counts by state
    pub fn stats(&mut self) -> Result<StoreStats, Error> {
        self.store.stats()
    }

    /// Sweeps run over the store's lifetime
    pub fn sweep_count(&mut self) -> Result<u32, Error> {
        self.store.sweep_count()
    }

    /// Name stored in the header of chunk `start`
    fn name_at(&mut self, start: u8) -> Result<FileName, Error> {
        let header = self.header(start)?;
        let mut buffer = [0u8; MAX_FILENAME_LENGTH];
        let name = &mut buffer[..header.name_len as usize];
        self.store.read_chunk(start, NAME_OFFSET, name)?;
        FileName::from_slice(name).map_err(|_| Error::Corrupt)
    }

    /// Decode the header of chunk `start`
    pub(crate) fn header(&mut self, start: u8) -> Result<Header, Error> {
        let mut raw = [0u8; HEADER_SIZE];
        self.store.read_chunk(start, END_OFFSET_OFFSET, &mut raw)?;
        if raw[1] as usize > MAX_FILENAME_LENGTH {
            warn!("chunk {=u8} has name length {=u8}", start, raw[1]);
            return Err(Error::Corrupt);
        }
        Ok(Header {
            end_offset: raw[0],
            name_len: raw[1],
        })
    }

    /// Chunk after `index` in its chain, `None` at the end
    pub(crate) fn follow(&mut self, index: u8) -> Result<Option<u8>, Error> {
        match self.store.next_link(index)? {
            UNUSED_CHUNK => Ok(None),
            next if self.store.layout().contains(next) => Ok(Some(next)),
            next => {
                warn!("chunk {=u8} links to {=u8}", index, next);
                Err(Error::Corrupt)
            }
        }
    }
}
