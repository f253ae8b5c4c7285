//! A single ZIP archive served from a memory mapping.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::io::{MappedFile, OpenMode, RandomAccess};
use crate::zip::{MemberReader, ZipExtractor, ZipFileEntry, ZipParser};

/// Read access by member name, shared by single archives and shard
/// collections.
pub trait ArchiveRead {
    /// Member names in archive order.
    fn namelist(&self) -> &[String];

    /// Directory entry for `name`.
    fn getinfo(&self, name: &str) -> Result<&ZipFileEntry>;

    /// Streaming handle over the member's decoded bytes.
    fn open(&self, name: &str) -> Result<MemberReader>;

    /// The member's whole decoded content.
    fn read(&self, name: &str) -> Result<Cow<'_, [u8]>>;
}

impl<T: ArchiveRead + ?Sized> ArchiveRead for &T {
    fn namelist(&self) -> &[String] {
        (**self).namelist()
    }

    fn getinfo(&self, name: &str) -> Result<&ZipFileEntry> {
        (**self).getinfo(name)
    }

    fn open(&self, name: &str) -> Result<MemberReader> {
        (**self).open(name)
    }

    fn read(&self, name: &str) -> Result<Cow<'_, [u8]>> {
        (**self).read(name)
    }
}

/// A ZIP archive whose central directory is parsed once from a mapping.
///
/// All lookups take `&self` and work on private cursors, so an archive can
/// be shared between threads. Closing releases the mapping; the parsed
/// directory stays available until the archive is dropped.
pub struct MappedArchive {
    path: PathBuf,
    file: MappedFile,
    entries: Vec<ZipFileEntry>,
    names: Vec<String>,
    /// Name to position in `entries`. A later duplicate shadows an earlier one.
    index: HashMap<String, usize>,
}

impl MappedArchive {
    /// Open and map `path` read-only.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_mode(path, OpenMode::ReadOnly)
    }

    /// Open and map `path` with the given descriptor mode.
    pub fn with_mode(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        Self::load(path, mode).map_err(|e| Error::open(path, e))
    }

    fn load(path: &Path, mode: OpenMode) -> Result<Self> {
        let mut file = MappedFile::open(path, mode)?;
        let entries = ZipParser::new(&mut file)?.list_files()?;

        let names: Vec<String> = entries.iter().map(|e| e.file_name.clone()).collect();
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        debug!(
            "Opened archive {} ({} members, {} bytes)",
            path.display(),
            entries.len(),
            file.len()?
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            entries,
            names,
            index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Member names in central directory order.
    pub fn namelist(&self) -> &[String] {
        &self.names
    }

    /// Parsed directory entries in central directory order.
    pub fn filelist(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    pub fn getinfo(&self, name: &str) -> Result<&ZipFileEntry> {
        self.index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| Error::NameNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Open a readable, seekable handle over exactly one member's bytes.
    pub fn open(&self, name: &str) -> Result<MemberReader> {
        self.ensure_open()?;
        let entry = self.getinfo(name)?;
        ZipExtractor::new(&self.file).open(entry)
    }

    /// Read a member's full content.
    ///
    /// Stored members borrow directly from the mapping; deflated ones are
    /// inflated into an owned buffer. The CRC-32 is verified either way.
    pub fn read(&self, name: &str) -> Result<Cow<'_, [u8]>> {
        self.ensure_open()?;
        let entry = self.getinfo(name)?;
        ZipExtractor::new(&self.file).read(entry)
    }

    /// The mapping behind this archive.
    pub fn file(&self) -> &MappedFile {
        &self.file
    }

    /// Release the mapping and descriptor. Idempotent.
    ///
    /// Member handles opened earlier keep their part of the mapping alive
    /// until they are dropped.
    pub fn close(&mut self) {
        if !self.file.is_closed() {
            debug!("Closing archive {}", self.path.display());
            self.file.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_closed()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

impl ArchiveRead for MappedArchive {
    fn namelist(&self) -> &[String] {
        MappedArchive::namelist(self)
    }

    fn getinfo(&self, name: &str) -> Result<&ZipFileEntry> {
        MappedArchive::getinfo(self, name)
    }

    fn open(&self, name: &str) -> Result<MemberReader> {
        MappedArchive::open(self, name)
    }

    fn read(&self, name: &str) -> Result<Cow<'_, [u8]>> {
        MappedArchive::read(self, name)
    }
}

impl std::fmt::Debug for MappedArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedArchive")
            .field("path", &self.path)
            .field("members", &self.entries.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
