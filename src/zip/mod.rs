//! ZIP archive parsing and member extraction.
//!
//! This is the archive format layer the mapped archives sit on. It reads
//! from any [`RandomAccess`](crate::io::RandomAccess) source and extracts
//! members from a [`MappedFile`](crate::io::MappedFile).
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Parsing of the end records and the central directory
//! - [`extractor`]: Member handles and whole-member reads
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 end of central directory records and extra fields
//! - Archives with prepended data (self-extracting stubs)
//! - STORED (no compression) method, served straight from the mapping
//! - DEFLATE compression method
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod extractor;
mod parser;
mod structures;

pub use extractor::{MemberReader, ZipExtractor};
pub use parser::ZipParser;
pub use structures::*;
