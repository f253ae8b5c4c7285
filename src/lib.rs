//! # mmzip
//!
//! Zero-copy random access to the members of ZIP archives through memory
//! mapping, for datasets packaged as millions of small files in one or more
//! archives.
//!
//! Rather than extracting the archive, its central directory is parsed once
//! straight out of a mapped region and members are served from the same
//! region. The operating system's page cache is shared by every process that
//! maps the file, so many data-loading workers can read concurrently without
//! each keeping its own buffers.
//!
//! ## Layers
//!
//! - [`MappedFile`]: a memory-mapped file with a seek/tell/read cursor
//! - [`MappedArchive`]: one archive, its directory parsed from a `MappedFile`
//! - [`ArchiveCollection`]: several archive shards behind one name index
//! - [`LabeledDataset`]: `(bytes, label)` samples over either of the above
//!
//! Members meant for this access path should be stored uncompressed
//! (`zip -0`). Deflated members are still readable, just not zero-copy.
//!
//! ## Example
//!
//! ```no_run
//! use mmzip::ArchiveCollection;
//!
//! fn main() -> mmzip::Result<()> {
//!     let shards = ArchiveCollection::new(["shard0.zip", "shard1.zip"])?;
//!
//!     for name in shards.namelist() {
//!         println!("{}", name);
//!     }
//!
//!     // Borrowed straight from the mapping for stored members
//!     let bytes = shards.read("cats/1.jpg")?;
//!     println!("{} bytes from shard {}", bytes.len(), shards.shard_index("cats/1.jpg")?);
//!
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod collection;
pub mod dataset;
pub mod error;
pub mod io;
pub mod zip;

pub use archive::{ArchiveRead, MappedArchive};
pub use cli::Cli;
pub use collection::ArchiveCollection;
pub use dataset::{LabeledDataset, ReadMethod, Sample};
pub use error::{Error, Result};
pub use io::{MappedFile, MappedReader, MemoryFile, OpenMode, RandomAccess};
pub use zip::{MemberReader, ZipFileEntry};
