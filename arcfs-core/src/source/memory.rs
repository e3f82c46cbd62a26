use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{entry_not_found, ArchiveFormat, EntryId, EntryKind, EntrySource, RawEntry};
use crate::compression::Compression;

/// An entry list held in memory, for exercising namespace and reader logic.
#[derive(Debug, Default)]
pub(crate) struct MemorySource {
    entries: Vec<RawEntry>,
    contents: Vec<Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, name: &str, content: &[u8]) -> Self {
        self.push(name, EntryKind::File, content.to_vec());
        self
    }

    pub fn dir(mut self, name: &str) -> Self {
        self.push(name, EntryKind::Directory, vec![]);
        self
    }

    pub fn into_source(self) -> Arc<dyn EntrySource> {
        Arc::new(self)
    }

    fn push(&mut self, name: &str, kind: EntryKind, content: Vec<u8>) {
        let id = EntryId(self.entries.len());
        self.entries.push(RawEntry {
            name: name.to_string(),
            kind,
            size: content.len() as u64,
            modified: Self::modified(id.0),
            compression: Compression::Stored,
            crc32: Some(crc32fast::hash(&content)),
            id,
        });
        self.contents.push(content);
    }

    pub fn modified(id: usize) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_600_000_000 + id as u64 * 2)
    }
}

impl EntrySource for MemorySource {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn entries(&self) -> &[RawEntry] {
        &self.entries
    }

    fn open_entry(&self, id: EntryId) -> std::io::Result<Box<dyn Read + Send>> {
        let content = self.contents.get(id.0).ok_or_else(|| entry_not_found(id))?;
        Ok(Box::new(Cursor::new(content.clone())))
    }
}
