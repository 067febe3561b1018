//! Reading and writing through descriptors
//!
//! A descriptor's position is a chunk index plus a payload offset. Writes
//! allocate the next chunk as soon as the current one fills up, so the
//! position of an open writer never sits at the end of a payload and the
//! recorded `end_offset` is always a valid offset.

use chunkfs_hal::{NvmFlash, PeriodicTicker};

use super::{FileDescriptor, FileName, FileSystem};
use crate::chunk::{Marker, DATA_OFFSET, DATA_PER_CHUNK, END_OFFSET_OFFSET, UNUSED_CHUNK};
use crate::error::Error;

impl<F: NvmFlash, T: PeriodicTicker> FileSystem<F, T> {
    /// Read up to `buf.len()` bytes from the current position
    ///
    /// Returns the number of bytes read, 0 at the end of the file.
    pub fn read(&mut self, fd: &mut FileDescriptor, buf: &mut [u8]) -> Result<usize, Error> {
        self.check_access(fd, false)?;

        let mut filled = 0;
        while filled < buf.len() {
            let available = self.readable_in_chunk(fd)?;
            let n = available.min(buf.len() - filled);
            if n == 0 {
                break;
            }
            let offset = DATA_OFFSET + fd.seek_offset as u32;
            self.store
                .read_chunk(fd.seek_chunk, offset, &mut buf[filled..filled + n])?;
            self.advance_read(fd, n)?;
            filled += n;
        }
        Ok(filled)
    }

    /// Read a single byte, `None` at the end of the file
    pub fn read_byte(&mut self, fd: &mut FileDescriptor) -> Result<Option<u8>, Error> {
        let mut byte = [0u8; 1];
        match self.read(fd, &mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    /// Read up to and including the next `\n`
    ///
    /// Stops early when `buf` is full or the file ends. Returns the number
    /// of bytes placed in `buf`.
    pub fn readline(&mut self, fd: &mut FileDescriptor, buf: &mut [u8]) -> Result<usize, Error> {
        let mut len = 0;
        while len < buf.len() {
            match self.read_byte(fd)? {
                Some(byte) => {
                    buf[len] = byte;
                    len += 1;
                    if byte == b'\n' {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok(len)
    }

    /// Append `data` at the current position
    ///
    /// If the store runs out of space partway through, the whole file is
    /// removed, `fd` is closed and [`Error::OutOfSpace`] is returned.
    pub fn write(&mut self, fd: &mut FileDescriptor, data: &[u8]) -> Result<usize, Error> {
        self.check_access(fd, true)?;

        let mut remaining = data;
        while !remaining.is_empty() {
            let room = DATA_PER_CHUNK - fd.seek_offset as usize;
            let (piece, rest) = remaining.split_at(room.min(remaining.len()));
            let offset = DATA_OFFSET + fd.seek_offset as u32;
            self.store.write_erased(fd.seek_chunk, offset, piece)?;
            self.advance_write(fd, piece.len())?;
            remaining = rest;
        }
        Ok(data.len())
    }

    /// Close `fd`, recording the file length if it was opened for writing
    pub fn close(&mut self, fd: &mut FileDescriptor) -> Result<(), Error> {
        if !fd.open {
            return Err(Error::ClosedHandleUse);
        }
        fd.open = false;
        if !fd.writable {
            return Ok(());
        }
        if self.store.marker(fd.start_chunk)? != Marker::FileStart {
            return Err(Error::BadDescriptor);
        }
        trace!(
            "closing chunk {=u8} at offset {=u8}",
            fd.start_chunk,
            fd.seek_offset
        );
        self.store
            .write_merge(fd.start_chunk, END_OFFSET_OFFSET, &[fd.seek_offset])
    }

    /// Name of the file `fd` refers to
    pub fn file_name(&mut self, fd: &FileDescriptor) -> Result<FileName, Error> {
        if self.store.marker(fd.start_chunk)? != Marker::FileStart {
            return Err(Error::BadDescriptor);
        }
        self.name_at(fd.start_chunk)
    }

    /// Reject closed handles, the wrong direction and removed files
    fn check_access(&mut self, fd: &FileDescriptor, write: bool) -> Result<(), Error> {
        if !fd.open {
            return Err(Error::ClosedHandleUse);
        }
        if fd.writable != write || self.store.marker(fd.start_chunk)? != Marker::FileStart {
            return Err(Error::BadDescriptor);
        }
        Ok(())
    }

    /// Bytes that can be read without leaving the current chunk
    fn readable_in_chunk(&mut self, fd: &FileDescriptor) -> Result<usize, Error> {
        let to_chunk_end = DATA_PER_CHUNK - fd.seek_offset as usize;
        if self.store.next_link(fd.seek_chunk)? != UNUSED_CHUNK {
            return Ok(to_chunk_end);
        }
        let end_offset = self.header(fd.start_chunk)?.end_offset;
        if end_offset == UNUSED_CHUNK {
            return Ok(0);
        }
        Ok(to_chunk_end.min((end_offset as usize).saturating_sub(fd.seek_offset as usize)))
    }

    fn advance_read(&mut self, fd: &mut FileDescriptor, n: usize) -> Result<(), Error> {
        let offset = fd.seek_offset as usize + n;
        if offset < DATA_PER_CHUNK {
            fd.seek_offset = offset as u8;
            return Ok(());
        }
        fd.seek_chunk = self.follow(fd.seek_chunk)?.ok_or(Error::Corrupt)?;
        fd.seek_offset = 0;
        Ok(())
    }

    fn advance_write(&mut self, fd: &mut FileDescriptor, n: usize) -> Result<(), Error> {
        let offset = fd.seek_offset as usize + n;
        if offset < DATA_PER_CHUNK {
            fd.seek_offset = offset as u8;
            return Ok(());
        }

        let next = match self.store.allocate() {
            Ok(next) => next,
            Err(Error::OutOfSpace) => {
                warn!("out of space, removing file at chunk {=u8}", fd.start_chunk);
                fd.open = false;
                self.store.release_chain(fd.start_chunk)?;
                return Err(Error::OutOfSpace);
            }
            Err(e) => return Err(e),
        };
        self.store.link(fd.seek_chunk, &next)?;
        fd.seek_chunk = next.index();
        fd.seek_offset = 0;
        Ok(())
    }
}
