//! Error types for mapped archive access

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to open archive {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("Corrupt archive: {0}")]
    Corrupt(String),

    #[error("There is no item named {0:?} in the archive")]
    NameNotFound(String),

    #[error("Position {position} is outside the mapped region of {len} bytes")]
    OutOfRange { position: i128, len: u64 },

    #[error("I/O operation on closed archive")]
    Closed,

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("Encrypted member is not supported: {0}")]
    Encrypted(String),

    #[error("Bad CRC-32 for {name}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("Sample index {index} out of range for dataset of {len} samples")]
    SampleOutOfRange { index: usize, len: usize },
}

impl Error {
    pub(crate) fn open(path: impl Into<PathBuf>, source: Error) -> Self {
        Error::Open {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through [`Error::Open`] wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Open { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.root(), Error::Closed)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NameNotFound(_))
    }

    pub fn is_out_of_range(&self) -> bool {
        matches!(self.root(), Error::OutOfRange { .. })
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self.root(), Error::Corrupt(_))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::NameNotFound(_) => io::Error::new(io::ErrorKind::NotFound, err),
            Error::OutOfRange { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
            Error::Corrupt(_) | Error::ChecksumMismatch { .. } => {
                io::Error::new(io::ErrorKind::InvalidData, err)
            }
            other => io::Error::other(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
