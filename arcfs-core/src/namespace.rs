//! The directory tree an archive presents once its entries are normalized.

use std::collections::{btree_map::Entry, BTreeMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::path::{ArchivePath, RootConfig};
use crate::record::{DirectoryRecord, FileRecord, Record};
use crate::source::{EntryKind, EntrySource, RawEntry};
use crate::{Error, Result};

/// An immutable directory tree over one archive source.
///
/// Every directory, including the root and every ancestor of an entry, maps
/// to its direct children ordered by name. Lookups are exact: the caller
/// supplies paths without leading or trailing separators.
#[derive(Debug)]
pub struct Namespace {
    dirs: BTreeMap<ArchivePath, Vec<Record>>,
    single_object: bool,
}

impl Namespace {
    /// Normalizes every entry of `source` through `config` and builds the tree.
    pub fn build(source: &Arc<dyn EntrySource>, config: &RootConfig) -> Result<Namespace> {
        let mut builder = Builder::default();

        for raw in source.entries() {
            let placed = match config.normalize(&raw.name) {
                Ok(Some(placed)) => placed,
                Ok(None) => {
                    tracing::trace!(name = %raw.name, root = %config.root(), "entry outside root");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(name = ?raw.name, error = %e, "skipping entry with unrepresentable name");
                    continue;
                }
            };

            if raw.kind == EntryKind::Directory || (placed.is_root() && raw.name_is_root()) {
                builder.add_directory(placed, raw.modified)?;
                continue;
            }

            if placed.is_root() {
                // The root names this file: present it alone.
                let name = ArchivePath::new_entry(config.single_object_name())
                    .map_err(|e| Error::invalid_path(config.single_object_name(), e))?;
                tracing::debug!(%name, "root is a single file");
                let mut single = Builder::default();
                single.add_file(file_record(name, raw, source))?;
                return single.finish(true);
            }

            builder.add_file(file_record(placed, raw, source))?;
        }

        builder.finish(false)
    }

    /// True when the configured root named a file rather than a directory.
    #[inline(always)]
    pub fn is_single_object(&self) -> bool {
        self.single_object
    }

    /// The direct children of `dir`, ordered by name.
    pub fn list(&self, dir: &str) -> Result<&[Record]> {
        self.dirs
            .get(dir)
            .map(|x| &x[..])
            .ok_or_else(|| Error::DirectoryNotFound(dir.to_string()))
    }

    /// Finds the file at `path` by scanning its parent directory.
    pub fn resolve(&self, path: &str) -> Result<&FileRecord> {
        let (parent, name) = match path.rfind('/') {
            Some(idx) => (&path[..idx], &path[idx + 1..]),
            None => ("", path),
        };

        if self.dirs.contains_key(path) {
            return Err(Error::NotAFile(path.to_string()));
        }

        self.dirs
            .get(parent)
            .and_then(|children| children.iter().find(|x| x.name() == name))
            .and_then(Record::as_file)
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.dirs.values().flatten().filter_map(Record::as_file)
    }
}

impl RawEntry {
    /// Entries such as `./` or `/` name the archive root itself.
    fn name_is_root(&self) -> bool {
        ArchivePath::new(&self.name).map_or(false, |x| x.is_root())
    }
}

fn file_record(path: ArchivePath, raw: &RawEntry, source: &Arc<dyn EntrySource>) -> FileRecord {
    FileRecord {
        path,
        size: raw.size,
        modified: raw.modified,
        compression: raw.compression,
        crc32: raw.crc32,
        id: raw.id,
        source: Arc::clone(source),
    }
}

/// Arena of accepted entries keyed by path. Explicit directories and files
/// are recorded as they arrive; missing ancestors are filled in by `finish`.
#[derive(Default)]
struct Builder {
    dirs: BTreeMap<ArchivePath, DirectoryRecord>,
    files: BTreeMap<ArchivePath, FileRecord>,
}

impl Builder {
    /// Repeated markers for one directory keep the first one seen.
    fn add_directory(&mut self, path: ArchivePath, modified: SystemTime) -> Result<()> {
        self.insert_directory(path, modified, false)
    }

    fn add_file(&mut self, record: FileRecord) -> Result<()> {
        if self.files.contains_key(&record.path) || self.dirs.contains_key(&record.path) {
            return Err(Error::PathConflict { path: record.path });
        }
        self.files.insert(record.path.clone(), record);
        Ok(())
    }

    fn insert_directory(&mut self, path: ArchivePath, modified: SystemTime, synthesized: bool) -> Result<()> {
        if self.files.contains_key(&path) {
            return Err(Error::PathConflict { path });
        }
        if let Entry::Vacant(slot) = self.dirs.entry(path) {
            let path = slot.key().clone();
            slot.insert(DirectoryRecord {
                path,
                modified,
                synthesized,
            });
        }
        Ok(())
    }

    /// Inserts the root and every ancestor not already present.
    fn synthesize_ancestors(&mut self) -> Result<()> {
        let mut missing = vec![ArchivePath::root()];
        for path in self.dirs.keys().chain(self.files.keys()) {
            missing.extend(path.ancestors().filter(|x| !self.dirs.contains_key(x)));
        }

        for path in missing {
            self.insert_directory(path, UNIX_EPOCH, true)?;
        }
        Ok(())
    }

    fn finish(mut self, single_object: bool) -> Result<Namespace> {
        self.synthesize_ancestors()?;

        let mut tree: BTreeMap<ArchivePath, Vec<Record>> = self
            .dirs
            .keys()
            .map(|x| (x.clone(), vec![]))
            .collect();

        let children = self
            .dirs
            .into_values()
            .map(Record::Directory)
            .chain(self.files.into_values().map(Record::File));

        for record in children {
            if let Some(parent) = record.path().parent() {
                if let Some(siblings) = tree.get_mut(&parent) {
                    siblings.push(record);
                }
            }
        }

        for children in tree.values_mut() {
            children.sort_by(|a, b| a.name().cmp(b.name()));
        }

        tracing::debug!(dirs = tree.len(), single_object, "built namespace");

        Ok(Namespace {
            dirs: tree,
            single_object,
        })
    }
}
