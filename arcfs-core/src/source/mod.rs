//! Decoded archive containers: an entry list plus a way to stream each entry.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use memmap2::Mmap;

use crate::compression::Compression;
use crate::{Error, Result};

#[cfg(test)]
pub(crate) mod memory;
mod squashfs;
mod zipfile;

pub use self::squashfs::SquashfsSource;
pub use self::zipfile::ZipSource;

/// Archive bytes shared between the decoder and every open entry stream.
#[derive(Clone)]
pub struct SharedBytes(Arc<dyn AsRef<[u8]> + Send + Sync>);

impl SharedBytes {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        SharedBytes(Arc::new(bytes))
    }

    pub fn from_mmap(mmap: Mmap) -> Self {
        SharedBytes(Arc::new(mmap))
    }

    pub fn len(&self) -> usize {
        self.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        (*self.0).as_ref()
    }
}

impl fmt::Debug for SharedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedBytes").field(&self.len()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Squashfs,
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ArchiveFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Squashfs => "squashfs",
        }
    }

    /// Picks a format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<ArchiveFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match &*ext {
            "zip" => Some(ArchiveFormat::Zip),
            "sqfs" | "squashfs" => Some(ArchiveFormat::Squashfs),
            _ => None,
        }
    }

    pub fn can_write(&self) -> bool {
        matches!(self, ArchiveFormat::Zip)
    }
}

impl std::str::FromStr for ArchiveFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match &*s.to_ascii_lowercase() {
            "zip" => Ok(ArchiveFormat::Zip),
            "sqfs" | "squashfs" => Ok(ArchiveFormat::Squashfs),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// Index of an entry within its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry as the container describes it, before normalization.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: SystemTime,
    pub compression: Compression,
    pub crc32: Option<u32>,
    pub id: EntryId,
}

pub trait EntrySource: fmt::Debug + Send + Sync {
    fn format(&self) -> ArchiveFormat;

    fn entries(&self) -> &[RawEntry];

    /// Opens a fresh, independent stream of the entry's decoded content.
    fn open_entry(&self, id: EntryId) -> std::io::Result<Box<dyn Read + Send>>;
}

/// Decodes `bytes` as an archive of the given format.
pub fn open_source(
    format: ArchiveFormat,
    bytes: SharedBytes,
    verify_checksums: bool,
) -> Result<Arc<dyn EntrySource>> {
    match format {
        ArchiveFormat::Zip => Ok(Arc::new(ZipSource::new(bytes, verify_checksums)?)),
        ArchiveFormat::Squashfs => Ok(Arc::new(SquashfsSource::new(bytes)?)),
    }
}

pub(crate) fn entry_not_found(id: EntryId) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("no entry with index {}", id.0),
    )
}
