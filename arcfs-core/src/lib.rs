//! Present zip archives and squashfs images as a read-only directory tree, and
//! write new zip archives as an append-only stream. Other formats can be
//! plugged in through [`EntrySource`].

mod archive;
mod checksum;
mod compression;
mod error;
pub mod fs;
mod namespace;
pub mod path;
mod reader;
mod record;
pub mod source;
mod writer;

pub use archive::{times_equal, ArchiveFs, ArchiveOptions, Features, HostSink, PRECISION};
pub use checksum::{format_crc32, Crc32Reader, HashType};
pub use compression::{Compression, STORE_THRESHOLD};
pub use error::{Error, Result};
pub use namespace::Namespace;
pub use path::{ArchivePath, RootConfig};
pub use reader::{open, open_range, Range};
pub use record::{DirectoryRecord, FileRecord, Record};
pub use source::{ArchiveFormat, EntryId, EntryKind, EntrySource, RawEntry, SharedBytes};
pub use writer::{
    ArchiveWriter, EntryInfo, Finished, OpenSession, SessionState, SinkFactory, WrittenEntry,
};
