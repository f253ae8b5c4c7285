//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`RandomAccess`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. For extraction, read each file's Local File Header and data
//!
//! Every offset taken from the archive is checked by seeking to it. The
//! source refuses positions outside its region, and such a refusal is
//! reported as a corrupt archive rather than silently clamped.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, SeekFrom};

use crate::error::{Error, Result};
use crate::io::RandomAccess;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Borrows the source for the duration of the parse and moves its cursor
/// freely; callers that care about the position should hand it a dedicated
/// cursor.
///
/// ## Example
///
/// ```ignore
/// let mut parser = ZipParser::new(&mut file)?;
/// let entries = parser.list_files()?;
/// for entry in &entries {
///     let offset = parser.data_offset(entry)?;
///     // Read member data from offset...
/// }
/// ```
pub struct ZipParser<'a, F: RandomAccess> {
    /// The underlying data source
    file: &'a mut F,
    /// Total size of the archive in bytes
    size: u64,
}

impl<'a, F: RandomAccess> ZipParser<'a, F> {
    /// Create a new parser for the given source.
    pub fn new(file: &'a mut F) -> Result<Self> {
        let size = file.len()?;
        Ok(Self { file, size })
    }

    /// Read exactly `len` bytes at `offset`.
    ///
    /// Out-of-range offsets and short reads both mean the archive lied about
    /// its own layout.
    fn read_at(&mut self, offset: u64, len: usize, what: &str) -> Result<&[u8]> {
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| match e {
                Error::OutOfRange { .. } => Error::Corrupt(format!(
                    "{} at offset {} lies outside the archive ({} bytes)",
                    what, offset, self.size
                )),
                other => other,
            })?;

        let data = self.file.read(len)?;
        if data.len() < len {
            return Err(Error::Corrupt(format!(
                "truncated {}: wanted {} bytes at offset {}, got {}",
                what,
                len,
                offset,
                data.len()
            )));
        }
        Ok(data)
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the ZIP file. This method
    /// handles both the simple case (no comment) and archives with
    /// comments by searching backwards for the signature.
    ///
    /// Returns the EOCD record and its offset in the file.
    pub fn find_eocd(&mut self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(Error::Corrupt("file is not a zip file".into()));
        }

        // Common case: no archive comment
        let offset = self.size - eocd_size;
        let buf = self.read_at(offset, EndOfCentralDirectory::SIZE, "end of central directory")?;
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(buf)?;
            return Ok((eocd, offset));
        }

        // The EOCD sits earlier when there is a comment; search backwards
        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;
        let buf = self.read_at(search_start, search_size as usize, "archive tail")?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length must account for every trailing byte
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;

                if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        Err(Error::Corrupt("file is not a zip file".into()))
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// The record is expected immediately before its locator, which sits
    /// immediately before the regular EOCD. Returns the record and its offset.
    pub fn read_zip64_eocd(&mut self, eocd_offset: u64) -> Result<(Zip64EOCD, u64)> {
        let too_small = || Error::Corrupt("ZIP64 end of central directory is missing".into());

        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .ok_or_else(too_small)?;
        let buf = self.read_at(locator_offset, Zip64EOCDLocator::SIZE, "ZIP64 locator")?;
        let locator = Zip64EOCDLocator::from_bytes(buf)?;
        if locator.total_disks > 1 {
            return Err(Error::Corrupt(
                "zipfiles that span multiple disks are not supported".into(),
            ));
        }

        let eocd64_offset = locator_offset
            .checked_sub(Zip64EOCD::MIN_SIZE as u64)
            .ok_or_else(too_small)?;
        let buf = self.read_at(eocd64_offset, Zip64EOCD::MIN_SIZE, "ZIP64 end of central directory")?;
        let eocd64 = Zip64EOCD::from_bytes(buf)?;

        Ok((eocd64, eocd64_offset))
    }

    /// List all members of the archive, in central directory order.
    ///
    /// Local header offsets are corrected for bytes prepended to the
    /// archive (self-extracting stubs and the like): the directory is
    /// expected to end where the end records begin, and any difference is
    /// added to every offset.
    pub fn list_files(&mut self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd()?;

        // Central Directory info, using ZIP64 if needed, and where it ends
        let (cd_offset, cd_size, total_entries, cd_end) = if eocd.is_zip64() {
            let (eocd64, eocd64_offset) = self.read_zip64_eocd(eocd_offset)?;
            (
                eocd64.cd_offset,
                eocd64.cd_size,
                eocd64.total_entries,
                eocd64_offset,
            )
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
                eocd_offset,
            )
        };

        let concat = cd_offset
            .checked_add(cd_size)
            .and_then(|claimed_end| cd_end.checked_sub(claimed_end))
            .ok_or_else(|| Error::Corrupt("bad central directory offset or size".into()))?;
        let cd_len = usize::try_from(cd_size)
            .map_err(|_| Error::Corrupt("central directory is too large to map".into()))?;

        let cd_data = self.read_at(cd_offset + concat, cd_len, "central directory")?;

        // Every header is at least CDFH_MIN_SIZE bytes
        let capacity = total_entries.min(cd_size / CDFH_MIN_SIZE as u64) as usize;
        let mut entries = Vec::with_capacity(capacity);
        let mut cursor = Cursor::new(cd_data);

        for _ in 0..total_entries {
            let mut entry = parse_cdfh(&mut cursor).map_err(|e| match e {
                Error::Io(_) => Error::Corrupt("truncated central directory".into()),
                other => other,
            })?;
            entry.lfh_offset = entry.lfh_offset.checked_add(concat).ok_or_else(|| {
                Error::Corrupt(format!("bad local header offset for {}", entry.file_name))
            })?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Get the offset where a member's (possibly compressed) data begins.
    ///
    /// The Local File Header has variable-length fields (name, extra field)
    /// that may differ from the Central Directory entry, so it is read here.
    pub fn data_offset(&mut self, entry: &ZipFileEntry) -> Result<u64> {
        let lfh = self.read_at(entry.lfh_offset, LFH_SIZE, "local file header")?;

        if &lfh[0..4] != LFH_SIGNATURE {
            return Err(Error::Corrupt(format!(
                "bad magic number for file header of {}",
                entry.file_name
            )));
        }

        let mut cursor = Cursor::new(lfh);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        let name_offset = entry.lfh_offset + LFH_SIZE as u64;
        let name = self.read_at(name_offset, file_name_length as usize, "local file name")?;
        if String::from_utf8_lossy(name) != entry.file_name {
            return Err(Error::Corrupt(format!(
                "file name in directory {:?} and header {:?} differ",
                entry.file_name,
                String::from_utf8_lossy(name)
            )));
        }

        Ok(name_offset + file_name_length as u64 + extra_field_length)
    }
}

/// Parse a Central Directory File Header from a cursor.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(Error::Corrupt("bad magic number for central directory".into()));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();
    let is_directory = file_name.ends_with('/');

    let extra_field_end = cursor.position() + extra_field_length as u64;
    if extra_field_end > cursor.get_ref().len() as u64 {
        return Err(Error::Corrupt(format!("truncated extra field for {}", file_name)));
    }

    while cursor.position() + 4 <= extra_field_end {
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()?;
        let field_end = cursor.position() + field_size as u64;

        if header_id == ZIP64_EXTRA_ID {
            // Values are present only for header fields saturated at 0xFFFFFFFF
            if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                uncompressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                compressed_size = cursor.read_u64::<LittleEndian>()?;
            }
            if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                lfh_offset = cursor.read_u64::<LittleEndian>()?;
            }
        }
        cursor.set_position(field_end.min(extra_field_end));
    }

    cursor.set_position(extra_field_end + file_comment_length as u64);

    Ok(ZipFileEntry {
        file_name,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        flags,
        lfh_offset,
        last_mod_time,
        last_mod_date,
        is_directory,
    })
}
