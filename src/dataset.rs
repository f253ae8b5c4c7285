//! Labelled samples laid out as `<...>/<split>/<label>/<file>` inside an
//! archive or a shard collection.
//!
//! Decoding and tensor transforms are left to the caller: a sample is handed
//! out as raw member bytes plus an integer label.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::str::FromStr;

use crate::archive::ArchiveRead;
use crate::error::{Error, Result};

/// How sample bytes are fetched from the archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadMethod {
    /// Stream through a member handle.
    #[default]
    Open,
    /// Read the whole member at once, borrowing from the mapping when stored.
    Read,
}

impl FromStr for ReadMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "open" => Ok(ReadMethod::Open),
            "read" => Ok(ReadMethod::Read),
            other => Err(format!("unknown read method {:?} (expected open or read)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub name: String,
    pub label: usize,
}

/// Sample index over an [`ArchiveRead`] source.
#[derive(Debug)]
pub struct LabeledDataset<S> {
    source: S,
    samples: Vec<Sample>,
    labels: Vec<String>,
    method: ReadMethod,
}

impl<S: ArchiveRead> LabeledDataset<S> {
    /// Select members that have a `split` path component and end with
    /// `extension`.
    ///
    /// Labels are the sorted distinct parent directory names of every file
    /// in the source, so a label keeps the same index in every split.
    pub fn new(source: S, split: &str, extension: &str) -> Self {
        let files: Vec<(&str, &str)> = source
            .namelist()
            .iter()
            .filter(|name| !name.ends_with('/'))
            .filter_map(|name| parent_dir(name).map(|label| (name.as_str(), label)))
            .collect();

        let index: BTreeMap<&str, usize> = files
            .iter()
            .map(|&(_, label)| label)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .enumerate()
            .map(|(i, label)| (label, i))
            .collect();

        let samples = files
            .iter()
            .filter(|(name, _)| name.ends_with(extension))
            .filter(|(name, _)| name.split('/').any(|component| component == split))
            .map(|&(name, label)| Sample {
                name: name.to_string(),
                label: index[label],
            })
            .collect();

        let labels = index.keys().map(|label| label.to_string()).collect();

        Self {
            source,
            samples,
            labels,
            method: ReadMethod::default(),
        }
    }

    pub fn with_method(mut self, method: ReadMethod) -> Self {
        self.method = method;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Label names; a sample's label is an index into this list.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Bytes and label of sample `index`.
    pub fn get(&self, index: usize) -> Result<(Cow<'_, [u8]>, usize)> {
        let sample = self.samples.get(index).ok_or(Error::SampleOutOfRange {
            index,
            len: self.samples.len(),
        })?;

        let bytes = match self.method {
            ReadMethod::Read => self.source.read(&sample.name)?,
            ReadMethod::Open => {
                let mut reader = self.source.open(&sample.name)?;
                let mut buf = Vec::with_capacity(reader.capacity_hint());
                reader.read_to_end(&mut buf)?;
                Cow::Owned(buf)
            }
        };

        Ok((bytes, sample.label))
    }
}

/// Name of the directory directly containing `name`.
fn parent_dir(name: &str) -> Option<&str> {
    let mut components = name.rsplit('/');
    components.next()?;
    components.next().filter(|dir| !dir.is_empty())
}
