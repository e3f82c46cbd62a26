//! The host's side of the adapter: reading archive bytes and creating sinks.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Seek, Write};
use std::path::Path;

use memmap2::Mmap;

use crate::source::SharedBytes;

/// A seekable output an archive can be written into.
pub trait WriteSeek: Write + Seek + Send {}

impl<T: Write + Seek + Send> WriteSeek for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub is_dir: bool,
    /// `None` when the host cannot tell the length up front.
    pub len: Option<u64>,
}

/// Storage the archive file itself lives on.
pub trait Host: Send + Sync {
    /// `Ok(None)` when nothing exists at `path`.
    fn stat(&self, path: &Path) -> io::Result<Option<Stat>>;

    fn open_source(&self, path: &Path) -> io::Result<SharedBytes>;

    /// Creates `path`, truncating anything already there.
    fn create_sink(&self, path: &Path) -> io::Result<Box<dyn WriteSeek>>;
}

/// The local filesystem. Archives are memory-mapped for reading.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl Host for LocalFs {
    fn stat(&self, path: &Path) -> io::Result<Option<Stat>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(Stat {
                is_dir: meta.is_dir(),
                len: Some(meta.len()),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn open_source(&self, path: &Path) -> io::Result<SharedBytes> {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Ok(SharedBytes::from_vec(vec![]));
        }
        // The mapping is only valid while nobody truncates the file underneath us.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(SharedBytes::from_mmap(mmap))
    }

    fn create_sink(&self, path: &Path) -> io::Result<Box<dyn WriteSeek>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }
}
