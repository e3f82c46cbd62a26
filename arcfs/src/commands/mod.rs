mod cat;
mod list;
mod pack;

use std::path::PathBuf;
use std::sync::Arc;

use arcfs_core::fs::LocalFs;
use arcfs_core::{ArchiveFormat, ArchiveFs, ArchiveOptions};
use structopt::StructOpt;

use crate::error::{Error, Result};

pub use cat::cat;
pub use list::list;
pub use pack::pack;

/// How to present an existing archive.
#[derive(Debug, StructOpt)]
pub struct ViewArgs {
    #[structopt(name = "archive", parse(from_os_str), help = "Path to the archive")]
    pub path: PathBuf,

    #[structopt(long, default_value = "", help = "Path the archive's contents appear under")]
    pub prefix: String,

    #[structopt(
        long,
        default_value = "",
        help = "Directory or file inside the archive to present as the top level"
    )]
    pub root: String,

    #[structopt(long, help = "Archive format (zip, squashfs) [default: from extension]")]
    pub format: Option<ArchiveFormat>,

    #[structopt(long, help = "Skip CRC-32 checks when reading entries")]
    pub no_verify: bool,
}

impl ViewArgs {
    fn options(&self) -> ArchiveOptions {
        ArchiveOptions {
            prefix: self.prefix.clone(),
            root: self.root.clone(),
            format: self.format,
            verify_checksums: !self.no_verify,
        }
    }

    /// Opens the archive for reading. A path that does not exist is an error
    /// here rather than the start of a new archive.
    fn open(&self) -> Result<ArchiveFs> {
        let fs = ArchiveFs::new(Arc::new(LocalFs), &self.path, &self.options()).map_err(
            |source| Error::OpenArchive {
                path: self.path.clone(),
                source,
            },
        )?;

        if !fs.features().read {
            return Err(Error::OpenArchive {
                path: self.path.clone(),
                source: arcfs_core::Error::NotFound(fs.name().to_string()),
            });
        }

        tracing::debug!(archive = %fs, "opened");
        Ok(fs)
    }
}
