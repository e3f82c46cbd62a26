//! An archive file presented to a host as a directory tree.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::checksum::HashType;
use crate::fs::{Host, Stat, WriteSeek};
use crate::namespace::Namespace;
use crate::path::{ArchivePath, RootConfig, PATH_ARCHIVE_SEP};
use crate::reader::{self, Range};
use crate::record::{FileRecord, Record};
use crate::source::{open_source, ArchiveFormat, EntrySource};
use crate::writer::{ArchiveWriter, EntryInfo, SinkFactory, WrittenEntry};
use crate::{Error, Result};

/// Modification times closer together than this compare equal.
pub const PRECISION: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Where the archive's contents appear in the host's path space.
    pub prefix: String,
    /// The directory inside the archive (after `prefix` is applied) to present.
    pub root: String,
    /// Overrides detection from the archive's file extension.
    pub format: Option<ArchiveFormat>,
    /// Check each zip entry's CRC-32 once it has been read to the end.
    pub verify_checksums: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        ArchiveOptions {
            prefix: String::new(),
            root: String::new(),
            format: None,
            verify_checksums: true,
        }
    }
}

impl ArchiveOptions {
    fn root_config(&self) -> Result<RootConfig> {
        RootConfig::new(&self.prefix, &self.root).map_err(|e| {
            let path = format!("prefix {:?}, root {:?}", self.prefix, self.root);
            Error::invalid_path(&path, e)
        })
    }
}

/// What a host may expect of an `ArchiveFs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub read: bool,
    pub write: bool,
    pub case_insensitive: bool,
    pub duplicate_files: bool,
    pub can_have_empty_directories: bool,
}

/// Creates the destination archive through the host on first write.
pub struct HostSink {
    host: Arc<dyn Host>,
    remote: PathBuf,
}

impl SinkFactory for HostSink {
    type Sink = Box<dyn WriteSeek>;

    fn create(&mut self) -> io::Result<Self::Sink> {
        tracing::debug!(remote = %self.remote.display(), "creating archive");
        self.host.create_sink(&self.remote)
    }
}

enum View {
    Read(Namespace),
    Write(ArchiveWriter<HostSink>),
}

/// One archive, either read through its namespace or written as a new file.
///
/// An archive that exists when the adapter is created is read-only. A zip
/// path that does not exist yet is write-only: entries are appended with
/// `put` and the file is completed by `finish`. Reading from an archive while
/// it is being written is not supported.
pub struct ArchiveFs {
    name: String,
    config: RootConfig,
    format: ArchiveFormat,
    view: View,
}

impl std::fmt::Debug for ArchiveFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveFs")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("config", &self.config)
            .field("read_only", &matches!(self.view, View::Read(_)))
            .finish()
    }
}

impl std::fmt::Display for ArchiveFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.format, self.name)
    }
}

impl ArchiveFs {
    pub fn new(host: Arc<dyn Host>, remote: &Path, options: &ArchiveOptions) -> Result<ArchiveFs> {
        tracing::debug!(
            remote = %remote.display(),
            prefix = %options.prefix,
            root = %options.root,
            "new archive view"
        );

        let name = remote.display().to_string();
        let format = options
            .format
            .or_else(|| ArchiveFormat::from_path(remote))
            .ok_or_else(|| Error::UnknownFormat(name.clone()))?;
        let config = options.root_config()?;

        match host.stat(remote)? {
            Some(stat) if stat.is_dir => Err(Error::NotAFile(name)),
            Some(Stat { len: None, .. }) => Err(Error::UnknownSize(name)),
            Some(_) => {
                let bytes = host.open_source(remote)?;
                let source = open_source(format, bytes, options.verify_checksums)?;
                Self::read_view(name, source, config)
            }
            None if format.can_write() => Ok(ArchiveFs {
                name,
                config,
                format,
                view: View::Write(ArchiveWriter::new(HostSink {
                    host,
                    remote: remote.to_path_buf(),
                })),
            }),
            None => Err(Error::NotFound(name)),
        }
    }

    /// A read-only view over an already decoded source.
    pub fn from_source(
        name: impl Into<String>,
        source: Arc<dyn EntrySource>,
        options: &ArchiveOptions,
    ) -> Result<ArchiveFs> {
        Self::read_view(name.into(), source, options.root_config()?)
    }

    fn read_view(name: String, source: Arc<dyn EntrySource>, config: RootConfig) -> Result<ArchiveFs> {
        let namespace = Namespace::build(&source, &config)?;
        Ok(ArchiveFs {
            name,
            format: source.format(),
            config,
            view: View::Read(namespace),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &ArchivePath {
        self.config.prefix()
    }

    pub fn root(&self) -> &ArchivePath {
        self.config.root()
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn features(&self) -> Features {
        let read = matches!(self.view, View::Read(_));
        Features {
            read,
            write: !read,
            case_insensitive: false,
            duplicate_files: false,
            can_have_empty_directories: true,
        }
    }

    /// True when the configured root is a file; the view then holds that one
    /// file at its top level.
    pub fn is_single_object(&self) -> bool {
        match &self.view {
            View::Read(namespace) => namespace.is_single_object(),
            View::Write(_) => false,
        }
    }

    pub fn precision(&self) -> Duration {
        PRECISION
    }

    pub fn hashes(&self) -> &'static [HashType] {
        match self.format {
            ArchiveFormat::Zip => &[HashType::Crc32],
            ArchiveFormat::Squashfs => &[],
        }
    }

    fn namespace(&self) -> Result<&Namespace> {
        match &self.view {
            View::Read(namespace) => Ok(namespace),
            View::Write(_) => Err(Error::WriteInProgress),
        }
    }

    pub fn list(&self, dir: &str) -> Result<&[Record]> {
        tracing::trace!(dir, "list");
        self.namespace()?.list(dir)
    }

    pub fn resolve(&self, path: &str) -> Result<&FileRecord> {
        tracing::trace!(path, "resolve");
        self.namespace()?.resolve(path)
    }

    pub fn open(&self, path: &str, offset: u64, limit: Option<u64>) -> Result<Box<dyn Read + Send>> {
        reader::open(self.resolve(path)?, offset, limit)
    }

    pub fn open_range(&self, path: &str, range: Range) -> Result<Box<dyn Read + Send>> {
        reader::open_range(self.resolve(path)?, range)
    }

    pub fn put<R: Read>(&self, info: &EntryInfo, content: R) -> Result<WrittenEntry> {
        tracing::trace!(name = %info.name, size = ?info.size, "put");
        match &self.view {
            View::Write(writer) => writer.put(info, content),
            View::Read(_) => Err(Error::WriteNotSupported("adding to an existing archive")),
        }
    }

    /// Completes the archive being written. Returns the number of entries
    /// written, or `None` if there was nothing to finish. Safe to call more
    /// than once, and a no-op for read-only views.
    pub fn finish(&self) -> Result<Option<usize>> {
        match &self.view {
            View::Write(writer) => Ok(writer.finish()?.map(|finished| finished.entries)),
            View::Read(_) => Ok(None),
        }
    }

    /// Directories exist implicitly, so there is nothing to create.
    pub fn mkdir(&self, dir: &str) -> Result<()> {
        tracing::trace!(dir, "mkdir");
        Ok(())
    }

    pub fn rmdir(&self, _dir: &str) -> Result<()> {
        Err(Error::WriteNotSupported("removing directories"))
    }

    pub fn set_modified(&self, path: &str, _modified: SystemTime) -> Result<()> {
        tracing::debug!(path, "can't set modification time inside an archive; ignoring");
        Ok(())
    }

    pub fn update<R: Read>(&self, _path: &str, _info: &EntryInfo, _content: R) -> Result<WrittenEntry> {
        Err(Error::WriteNotSupported("updating entries"))
    }

    pub fn remove(&self, _path: &str) -> Result<()> {
        Err(Error::WriteNotSupported("removing entries"))
    }

    /// Translates a host path under the prefix into a path inside the archive.
    pub fn strip(&self, remote: &str) -> Result<ArchivePath> {
        let prefix = self.config.prefix().as_str();
        if remote == prefix {
            return Ok(ArchivePath::root());
        }
        let rest = match remote.strip_prefix(prefix) {
            Some(rest) if prefix.is_empty() => rest,
            Some(rest) => match rest.strip_prefix(PATH_ARCHIVE_SEP) {
                Some(rest) => rest,
                None => return Err(Error::PathOutsideRoot(remote.to_string())),
            },
            None => return Err(Error::PathOutsideRoot(remote.to_string())),
        };
        ArchivePath::new(rest).map_err(|e| Error::invalid_path(remote, e))
    }
}

/// Compares modification times at the adapter's precision.
pub fn times_equal(a: SystemTime, b: SystemTime) -> bool {
    let delta = match a.duration_since(b) {
        Ok(delta) => delta,
        Err(e) => e.duration(),
    };
    delta < PRECISION
}
