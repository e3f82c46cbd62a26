use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::checksum::{format_crc32, HashType};
use crate::compression::Compression;
use crate::path::ArchivePath;
use crate::source::{EntryId, EntrySource};

/// A child of a directory in the namespace.
#[derive(Debug, Clone)]
pub enum Record {
    File(FileRecord),
    Directory(DirectoryRecord),
}

impl Record {
    #[inline(always)]
    pub fn as_file(&self) -> Option<&FileRecord> {
        match self {
            Record::File(file) => Some(file),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_directory(&self) -> Option<&DirectoryRecord> {
        match self {
            Record::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn path(&self) -> &ArchivePath {
        match self {
            Record::File(file) => &file.path,
            Record::Directory(dir) => &dir.path,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        self.path().filename()
    }

    #[inline(always)]
    pub fn modified(&self) -> SystemTime {
        match self {
            Record::File(file) => file.modified,
            Record::Directory(dir) => dir.modified,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryRecord {
    /// Path relative to the root of the view.
    pub path: ArchivePath,

    /// Taken from the archive's own directory entry, or the Unix epoch when
    /// the directory was only implied by its contents.
    pub modified: SystemTime,

    /// True when no entry in the archive named this directory.
    pub synthesized: bool,
}

/// A regular file in the namespace, carrying everything needed to stream it.
#[derive(Clone)]
pub struct FileRecord {
    /// Path relative to the root of the view.
    pub path: ArchivePath,

    /// Uncompressed length in bytes.
    pub size: u64,

    pub modified: SystemTime,

    /// How the content is stored in the container.
    pub compression: Compression,

    /// CRC-32 of the uncompressed content, when the container records one.
    pub crc32: Option<u32>,

    pub(crate) id: EntryId,
    pub(crate) source: Arc<dyn EntrySource>,
}

impl FileRecord {
    #[inline(always)]
    pub fn name(&self) -> &str {
        self.path.filename()
    }

    /// The entry's digest in lowercase hex, or `None` when this hash is
    /// unsupported for the entry.
    pub fn hash(&self, ty: HashType) -> Option<String> {
        match ty {
            HashType::Crc32 => self.crc32.map(format_crc32),
        }
    }

    #[inline(always)]
    pub fn id(&self) -> EntryId {
        self.id
    }
}

impl fmt::Debug for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileRecord")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("modified", &self.modified)
            .field("compression", &self.compression)
            .field("crc32", &self.crc32)
            .field("id", &self.id)
            .finish()
    }
}
