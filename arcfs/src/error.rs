use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot open archive `{}`", .path.display())]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: arcfs_core::Error,
    },

    #[error("Cannot list `{dir}`")]
    List {
        dir: String,
        #[source]
        source: arcfs_core::Error,
    },

    #[error("Cannot read `{path}` from archive")]
    ReadEntry {
        path: String,
        #[source]
        source: arcfs_core::Error,
    },

    #[error("Cannot write to standard output")]
    WriteOutput {
        #[source]
        source: std::io::Error,
    },

    #[error("Archive already exists: `{}` (use -f/--force to overwrite)", path.display())]
    ArchiveExists { path: PathBuf },

    #[error("Cannot remove existing archive `{}`", path.display())]
    RemoveArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cowardly refusing to archive `{}` into itself", path.display())]
    ArchiveSelf { path: PathBuf },

    #[error("Cannot process directory entry")]
    ProcessDirEntry {
        #[source]
        source: jwalk::Error,
    },

    #[error("Cannot open file `{}`", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot add file to archive `{}`", path.display())]
    AddFile {
        path: PathBuf,
        #[source]
        source: arcfs_core::Error,
    },

    #[error("Cannot finish archive `{}`", path.display())]
    FinishArchive {
        path: PathBuf,
        #[source]
        source: arcfs_core::Error,
    },
}
