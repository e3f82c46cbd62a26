use crate::path::{ArchivePath, IntoArchivePathError};
use crate::source::ArchiveFormat;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("directory not found: `{0}`")]
    DirectoryNotFound(String),

    #[error("object not found: `{0}`")]
    NotFound(String),

    #[error("not a file: `{0}`")]
    NotAFile(String),

    #[error("cannot decode {format} archive")]
    UnsupportedFormat {
        format: ArchiveFormat,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("no archive format is known for `{0}`")]
    UnknownFormat(String),

    #[error("size of `{0}` must be known before it can be added to an archive")]
    UnknownSize(String),

    #[error("short read on `{path}`: expected {expected} bytes, got {actual}")]
    ShortRead {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("short write on `{path}`: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("{0} is not supported by this archive")]
    WriteNotSupported(&'static str),

    #[error("`{0}` is outside the archive root")]
    PathOutsideRoot(String),

    #[error("`{path}` is already present in the archive")]
    PathConflict { path: ArchivePath },

    #[error("cannot query an archive that is open for writing")]
    WriteInProgress,

    #[error("write session failed on an earlier entry and accepts no more writes")]
    SessionFailed,

    #[error("cannot handle path `{path}`")]
    InvalidPath {
        path: String,
        #[source]
        source: IntoArchivePathError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    pub(crate) fn invalid_path(path: &str, source: IntoArchivePathError) -> Self {
        Error::InvalidPath {
            path: path.to_string(),
            source,
        }
    }
}
