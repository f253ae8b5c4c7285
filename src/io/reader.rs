use std::io::{self, BufRead, Read, Seek, SeekFrom};

use super::{MappedFile, RandomAccess};

/// `std::io` view over a [`MappedFile`] cursor.
///
/// `fill_buf` hands out the rest of the mapped region directly, so buffered
/// consumers (decoders, `io::copy`) read straight from the mapping.
#[derive(Debug)]
pub struct MappedReader {
    file: MappedFile,
}

impl MappedReader {
    pub fn new(file: MappedFile) -> Self {
        Self { file }
    }

    pub fn get_ref(&self) -> &MappedFile {
        &self.file
    }

    pub fn into_inner(self) -> MappedFile {
        self.file
    }
}

impl Read for MappedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let chunk = RandomAccess::read(&mut self.file, buf.len())?;
        buf[..chunk.len()].copy_from_slice(chunk);
        Ok(chunk.len())
    }
}

impl BufRead for MappedReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.file.remaining()?)
    }

    fn consume(&mut self, amt: usize) {
        // amt is bounded by what fill_buf returned
        let _ = RandomAccess::read(&mut self.file, amt);
    }
}

impl Seek for MappedReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(RandomAccess::seek(&mut self.file, pos)?)
    }
}
