use std::io::SeekFrom;

use super::{RandomAccess, resolve_seek};
use crate::error::{Error, Result};

/// In-memory [`RandomAccess`] source, mostly for feeding the parser in tests.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    data: Option<Vec<u8>>,
    pos: usize,
}

impl MemoryFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            pos: 0,
        }
    }

    fn data(&self) -> Result<&[u8]> {
        self.data.as_deref().ok_or(Error::Closed)
    }
}

impl RandomAccess for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let len = self.data()?.len() as u64;
        let target = resolve_seek(pos, self.pos as u64, len)?;
        self.pos = target as usize;
        Ok(target)
    }

    fn tell(&self) -> Result<u64> {
        self.data()?;
        Ok(self.pos as u64)
    }

    fn read(&mut self, n: usize) -> Result<&[u8]> {
        let data = self.data.as_deref().ok_or(Error::Closed)?;
        let from = self.pos;
        let to = from + n.min(data.len() - from);
        self.pos = to;
        Ok(&data[from..to])
    }

    fn close(&mut self) {
        self.data = None;
    }

    fn len(&self) -> Result<u64> {
        Ok(self.data()?.len() as u64)
    }
}
