use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io::SeekFrom;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

use super::{OpenMode, RandomAccess, resolve_seek};
use crate::error::{Error, Result};

enum Region {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Deref for Region {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Region::ReadOnly(map) => map,
            Region::ReadWrite(map) => map,
        }
    }
}

/// A mapped region together with the descriptor it was mapped from.
///
/// Fields drop in declaration order, so the region is unmapped before the
/// descriptor is closed. Neither is ever released on its own.
struct Mapping {
    region: Region,
    _file: File,
}

impl Drop for Mapping {
    fn drop(&mut self) {
        trace!("Unmapping region of {} bytes", self.region.len());
    }
}

/// Memory-mapped file with a read cursor.
///
/// Reads hand out slices of the mapping itself; nothing is copied. Several
/// `MappedFile`s may share one mapping (see [`MappedFile::cursor`] and
/// [`MappedFile::window`]), each with its own position. The mapping and its
/// descriptor are released when the last of them is closed or dropped.
///
/// A single `MappedFile` is not meant to be shared between concurrent
/// readers: its position is mutable. Give each reader its own cursor.
pub struct MappedFile {
    mapping: Option<Arc<Mapping>>,
    /// Offset of this view inside the mapping.
    start: usize,
    len: usize,
    pos: usize,
}

impl MappedFile {
    /// Map `file` starting at byte `base` up to its end.
    ///
    /// For [`OpenMode::ReadWrite`] the descriptor must have been opened for
    /// writing as well.
    pub fn new(file: File, base: u64, mode: OpenMode) -> Result<Self> {
        let file_len = file.metadata()?.len();
        if base > file_len {
            return Err(Error::OutOfRange {
                position: base as i128,
                len: file_len,
            });
        }
        let len = usize::try_from(file_len - base).map_err(|_| Error::OutOfRange {
            position: file_len as i128,
            len: usize::MAX as u64,
        })?;

        let mut options = MmapOptions::new();
        options.offset(base).len(len);

        // SAFETY: the archive is treated as immutable for the lifetime of the
        // mapping; truncating it underneath us is outside our contract.
        let region = match mode {
            OpenMode::ReadOnly => Region::ReadOnly(unsafe { options.map(&file)? }),
            OpenMode::ReadWrite => Region::ReadWrite(unsafe { options.map_mut(&file)? }),
        };

        debug!("Mapped {} bytes at base offset {} ({:?})", len, base, mode);

        Ok(Self {
            mapping: Some(Arc::new(Mapping {
                region,
                _file: file,
            })),
            start: 0,
            len,
            pos: 0,
        })
    }

    /// Open `path` in the given mode and map it from offset 0.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        let file = match mode {
            OpenMode::ReadOnly => File::open(path)?,
            OpenMode::ReadWrite => OpenOptions::new().read(true).write(true).open(path)?,
        };
        Self::new(file, 0, mode)
    }

    pub fn is_closed(&self) -> bool {
        self.mapping.is_none()
    }

    /// The whole region as a borrowed slice.
    pub fn bytes(&self) -> Result<&[u8]> {
        let mapping = self.mapping.as_ref().ok_or(Error::Closed)?;
        Ok(&mapping.region[self.start..self.start + self.len])
    }

    /// `len` bytes at `offset`, independent of the cursor.
    ///
    /// Fails with [`Error::OutOfRange`] unless the whole range lies inside
    /// the region.
    pub fn bytes_at(&self, offset: u64, len: usize) -> Result<&[u8]> {
        let region = self.bytes()?;
        let (start, end) = self.checked_range(offset, len as u64)?;
        Ok(&region[start..end])
    }

    /// A new `MappedFile` over `len` bytes at `offset`, sharing this mapping.
    ///
    /// The window starts with its cursor at 0 and its own base offset.
    pub fn window(&self, offset: u64, len: u64) -> Result<MappedFile> {
        let mapping = self.mapping.as_ref().ok_or(Error::Closed)?;
        let (start, end) = self.checked_range(offset, len)?;
        Ok(MappedFile {
            mapping: Some(Arc::clone(mapping)),
            start: self.start + start,
            len: end - start,
            pos: 0,
        })
    }

    /// An independent cursor over the same region, positioned at 0.
    pub fn cursor(&self) -> Result<MappedFile> {
        self.window(0, self.len as u64)
    }

    /// Bytes between the cursor and the end of the region.
    pub fn remaining(&self) -> Result<&[u8]> {
        Ok(&self.bytes()?[self.pos..])
    }

    fn checked_range(&self, offset: u64, len: u64) -> Result<(usize, usize)> {
        let out_of_range = || Error::OutOfRange {
            position: offset as i128 + len as i128,
            len: self.len as u64,
        };
        let end = offset.checked_add(len).ok_or_else(out_of_range)?;
        if end > self.len as u64 {
            return Err(out_of_range());
        }
        Ok((offset as usize, end as usize))
    }
}

impl RandomAccess for MappedFile {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        let target = resolve_seek(pos, self.pos as u64, self.len as u64)?;
        self.pos = target as usize;
        Ok(target)
    }

    fn tell(&self) -> Result<u64> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(self.pos as u64)
    }

    fn read(&mut self, n: usize) -> Result<&[u8]> {
        let mapping = self.mapping.as_ref().ok_or(Error::Closed)?;
        let from = self.pos;
        let to = from + n.min(self.len - from);
        self.pos = to;
        Ok(&mapping.region[self.start + from..self.start + to])
    }

    fn close(&mut self) {
        if self.mapping.take().is_some() {
            trace!("Closed mapped view of {} bytes", self.len);
        }
    }

    fn len(&self) -> Result<u64> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(self.len as u64)
    }
}

impl std::fmt::Debug for MappedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("pos", &self.pos)
            .field("closed", &self.is_closed())
            .finish()
    }
}
