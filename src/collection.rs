//! Several archive shards presented as one namespace.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::archive::{ArchiveRead, MappedArchive};
use crate::error::{Error, Result};
use crate::io::OpenMode;
use crate::zip::{MemberReader, ZipFileEntry};

/// An ordered group of [`MappedArchive`] shards behind a name index.
///
/// The index is built once at construction: for every shard in order, every
/// one of its names is mapped to that shard. When a name appears in more than
/// one shard the **last** shard wins. Such collisions are counted (see
/// [`ArchiveCollection::collisions`]) and logged.
pub struct ArchiveCollection {
    shards: Vec<MappedArchive>,
    /// Member name to shard index
    index: HashMap<String, usize>,
    /// Distinct names, in order of first appearance
    names: Vec<String>,
    collisions: usize,
    closed: bool,
}

impl ArchiveCollection {
    /// Open every path as a read-only shard, in order.
    pub fn new<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::with_mode(paths, OpenMode::ReadOnly)
    }

    /// Open every path as a shard with the given descriptor mode.
    ///
    /// Fails as a whole if any shard fails; shards opened before the failing
    /// one are closed before the error is returned.
    pub fn with_mode<I, P>(paths: I, mode: OpenMode) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let shards = paths
            .into_iter()
            .map(|path| MappedArchive::with_mode(path, mode))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_shards(shards))
    }

    /// Build the name index over already opened shards.
    pub fn from_shards(shards: Vec<MappedArchive>) -> Self {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut names = Vec::new();
        let mut collisions = 0;

        for (shard_index, shard) in shards.iter().enumerate() {
            for name in shard.namelist() {
                match index.insert(name.clone(), shard_index) {
                    None => names.push(name.clone()),
                    Some(previous) if previous != shard_index => {
                        collisions += 1;
                        debug!(
                            "{} from shard {} shadows shard {}",
                            name, shard_index, previous
                        );
                    }
                    // Duplicate inside one shard
                    Some(_) => {}
                }
            }
        }

        if collisions > 0 {
            warn!(
                "{} member names occur in more than one shard; the later shard wins",
                collisions
            );
        }
        debug!(
            "Indexed {} names across {} shards",
            names.len(),
            shards.len()
        );

        Self {
            shards,
            index,
            names,
            collisions,
            closed: false,
        }
    }

    /// Every distinct member name, each exactly once.
    pub fn namelist(&self) -> &[String] {
        &self.names
    }

    /// Concatenation of every shard's directory entries, in shard order.
    ///
    /// Shadowed entries are included.
    pub fn filelist(&self) -> Vec<&ZipFileEntry> {
        self.shards.iter().flat_map(|s| s.filelist()).collect()
    }

    /// Index of the shard that serves `name`.
    pub fn shard_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::NameNotFound(name.to_string()))
    }

    fn owner(&self, name: &str) -> Result<&MappedArchive> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(&self.shards[self.shard_index(name)?])
    }

    pub fn getinfo(&self, name: &str) -> Result<&ZipFileEntry> {
        self.shards[self.shard_index(name)?].getinfo(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn open(&self, name: &str) -> Result<MemberReader> {
        self.owner(name)?.open(name)
    }

    pub fn read(&self, name: &str) -> Result<Cow<'_, [u8]>> {
        self.owner(name)?.read(name)
    }

    pub fn shard(&self, index: usize) -> Option<&MappedArchive> {
        self.shards.get(index)
    }

    pub fn shards(&self) -> &[MappedArchive] {
        &self.shards
    }

    /// Number of shards.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Number of names whose earlier mapping was overwritten by a later shard.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    /// Close every shard. Idempotent.
    pub fn close(&mut self) {
        for shard in &mut self.shards {
            shard.close();
        }
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ArchiveRead for ArchiveCollection {
    fn namelist(&self) -> &[String] {
        ArchiveCollection::namelist(self)
    }

    fn getinfo(&self, name: &str) -> Result<&ZipFileEntry> {
        ArchiveCollection::getinfo(self, name)
    }

    fn open(&self, name: &str) -> Result<MemberReader> {
        ArchiveCollection::open(self, name)
    }

    fn read(&self, name: &str) -> Result<Cow<'_, [u8]>> {
        ArchiveCollection::read(self, name)
    }
}

impl std::fmt::Debug for ArchiveCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveCollection")
            .field("shards", &self.shards)
            .field("names", &self.names.len())
            .field("collisions", &self.collisions)
            .field("closed", &self.closed)
            .finish()
    }
}
