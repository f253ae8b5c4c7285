use flate2::Crc;
use flate2::bufread::DeflateDecoder;
use std::borrow::Cow;
use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::io::{MappedFile, MappedReader, resolve_seek};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Deflate never expands data by more than this factor.
const MAX_DEFLATE_RATIO: u64 = 1032;

/// Upper bound on buffers sized from directory fields before any data is
/// decoded.
const PREALLOC_LIMIT: u64 = 64 << 20;

/// Buffer capacity for a member, bounded by what its compressed bytes could
/// possibly decode to.
fn capacity_for(uncompressed: u64, compressed: u64) -> usize {
    uncompressed
        .min(compressed.saturating_mul(MAX_DEFLATE_RATIO))
        .min(PREALLOC_LIMIT) as usize
}

/// Member extraction over a mapped archive.
///
/// Every call works on its own cursor, so one extractor (and the archive
/// behind it) can serve any number of threads.
pub struct ZipExtractor<'a> {
    file: &'a MappedFile,
}

impl<'a> ZipExtractor<'a> {
    pub fn new(file: &'a MappedFile) -> Self {
        Self { file }
    }

    /// Offset of a member's raw (possibly compressed) bytes, checked to lie
    /// inside the archive.
    fn locate(&self, entry: &ZipFileEntry) -> Result<u64> {
        if entry.is_encrypted() {
            return Err(Error::Encrypted(entry.file_name.clone()));
        }
        if let CompressionMethod::Unknown(method) = entry.compression_method {
            return Err(Error::UnsupportedCompression(method));
        }

        let mut cursor = self.file.cursor()?;
        let data_offset = ZipParser::new(&mut cursor)?.data_offset(entry)?;

        self.file
            .bytes_at(data_offset, entry.compressed_size as usize)
            .map_err(|e| match e {
                Error::OutOfRange { .. } => Error::Corrupt(format!(
                    "data of {} runs past the end of the archive",
                    entry.file_name
                )),
                other => other,
            })?;

        Ok(data_offset)
    }

    /// Open a streaming handle over the member's decoded content.
    pub fn open(&self, entry: &ZipFileEntry) -> Result<MemberReader> {
        let raw = self.file.window(self.locate(entry)?, entry.compressed_size)?;
        let compressed = entry.compressed_size;
        let mut size = entry.uncompressed_size;
        let inner = match entry.compression_method {
            CompressionMethod::Deflate => {
                let decoder = DeflateDecoder::new(MappedReader::new(raw.cursor()?));
                Inner::Deflated {
                    raw,
                    decoder: Box::new(decoder),
                }
            }
            _ => {
                size = entry.compressed_size;
                Inner::Stored(MappedReader::new(raw))
            }
        };

        Ok(MemberReader {
            name: entry.file_name.clone(),
            size,
            compressed,
            pos: 0,
            crc: Crc::new(),
            expected_crc: entry.crc32,
            sequential: true,
            inner,
        })
    }

    /// Read the member's whole decoded content and check its CRC-32.
    ///
    /// Stored members are returned as a slice of the mapping.
    pub fn read(&self, entry: &ZipFileEntry) -> Result<Cow<'a, [u8]>> {
        let raw = self
            .file
            .bytes_at(self.locate(entry)?, entry.compressed_size as usize)?;

        let data = match entry.compression_method {
            CompressionMethod::Deflate => {
                let mut out = Vec::with_capacity(capacity_for(
                    entry.uncompressed_size,
                    entry.compressed_size,
                ));
                DeflateDecoder::new(raw).read_to_end(&mut out).map_err(|e| {
                    Error::Corrupt(format!("error decompressing {}: {}", entry.file_name, e))
                })?;
                Cow::Owned(out)
            }
            _ => Cow::Borrowed(raw),
        };

        if data.len() as u64 != entry.uncompressed_size {
            return Err(Error::Corrupt(format!(
                "{} decoded to {} bytes, directory says {}",
                entry.file_name,
                data.len(),
                entry.uncompressed_size
            )));
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            return Err(Error::ChecksumMismatch {
                name: entry.file_name.clone(),
                expected: entry.crc32,
                actual: crc.sum(),
            });
        }

        Ok(data)
    }
}

enum Inner {
    Stored(MappedReader),
    Deflated {
        /// Compressed bytes, kept to restart the decoder on backward seeks
        raw: MappedFile,
        decoder: Box<DeflateDecoder<MappedReader>>,
    },
}

/// Readable, seekable handle over one member's decoded bytes.
///
/// The handle owns its own cursor over the archive mapping and stays valid
/// after the archive itself is closed; the mapping is released once the
/// last handle is dropped.
///
/// A pass that reads from the start to the declared size without skipping
/// verifies the CRC-32 and fails with [`io::ErrorKind::InvalidData`] on the
/// read that reaches the end.
pub struct MemberReader {
    name: String,
    size: u64,
    compressed: u64,
    pos: u64,
    crc: Crc,
    expected_crc: u32,
    /// Every byte up to `pos` went through `crc`
    sequential: bool,
    inner: Inner,
}

impl MemberReader {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decoded size of the member.
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Initial buffer size for reading the whole member.
    pub fn capacity_hint(&self) -> usize {
        capacity_for(self.size, self.compressed)
    }

    /// The whole member as a slice of the mapping, if it is stored.
    pub fn as_slice(&self) -> Option<&[u8]> {
        match &self.inner {
            Inner::Stored(reader) => reader.get_ref().bytes().ok(),
            Inner::Deflated { .. } => None,
        }
    }
}

impl Read for MemberReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match &mut self.inner {
            Inner::Stored(reader) => reader.read(buf)?,
            Inner::Deflated { decoder, .. } => {
                // Never hand out more than the directory promised
                let limit = (self.size - self.pos).min(buf.len() as u64) as usize;
                decoder.read(&mut buf[..limit])?
            }
        };
        if n == 0 && !buf.is_empty() && self.pos < self.size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} ended before its declared size", self.name),
            ));
        }

        self.pos += n as u64;
        if self.sequential {
            self.crc.update(&buf[..n]);
        }
        if self.sequential && self.pos == self.size {
            self.sequential = false;
            if self.crc.sum() != self.expected_crc {
                return Err(Error::ChecksumMismatch {
                    name: self.name.clone(),
                    expected: self.expected_crc,
                    actual: self.crc.sum(),
                }
                .into());
            }
        }
        Ok(n)
    }
}

impl Seek for MemberReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = resolve_seek(pos, self.pos, self.size)?;

        match &mut self.inner {
            Inner::Stored(reader) => {
                reader.seek(SeekFrom::Start(target))?;
            }
            Inner::Deflated { raw, decoder } => {
                if target < self.pos {
                    **decoder = DeflateDecoder::new(MappedReader::new(raw.cursor()?));
                    self.pos = 0;
                }
                let skip = target - self.pos;
                let skipped = io::copy(&mut decoder.by_ref().take(skip), &mut io::sink())?;
                if skipped < skip {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("{} ended before its declared size", self.name),
                    ));
                }
            }
        }

        if target == 0 {
            self.crc.reset();
            self.sequential = true;
        } else if target != self.pos {
            self.sequential = false;
        }
        self.pos = target;
        Ok(target)
    }
}

impl std::fmt::Debug for MemberReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberReader")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("pos", &self.pos)
            .finish()
    }
}
