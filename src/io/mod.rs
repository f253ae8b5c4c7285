mod mapped;
mod memory;
mod reader;

pub use mapped::MappedFile;
pub use memory::MemoryFile;
pub use reader::MappedReader;

use std::io::SeekFrom;

use crate::error::{Error, Result};

/// How the descriptor behind a mapping is opened.
///
/// `ReadWrite` opens the file read+write and maps it writable for tools that
/// insist on a writable mapping handle. Nothing in this crate ever writes
/// through it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenMode {
    #[default]
    ReadOnly,
    ReadWrite,
}

/// Random access byte source consumed by the ZIP parser.
///
/// Positions are byte offsets into the source's region, `0..=len`. Seeking
/// outside that range is an error, never a clamp.
pub trait RandomAccess {
    /// Move the cursor, returning the new absolute position.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Current cursor position.
    fn tell(&self) -> Result<u64>;

    /// Return up to `n` bytes from the cursor and advance past them.
    ///
    /// An empty slice signals end of data.
    fn read(&mut self, n: usize) -> Result<&[u8]>;

    /// Release the underlying resources. Further calls fail with
    /// [`Error::Closed`]. Closing twice is a no-op.
    fn close(&mut self);

    /// Length of the addressable region in bytes.
    fn len(&self) -> Result<u64>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Resolve a three-mode seek against a region of `len` bytes.
pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, len: u64) -> Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => offset as i128,
        SeekFrom::Current(delta) => current as i128 + delta as i128,
        SeekFrom::End(delta) => len as i128 + delta as i128,
    };

    if target < 0 || target > len as i128 {
        return Err(Error::OutOfRange {
            position: target,
            len,
        });
    }

    Ok(target as u64)
}
