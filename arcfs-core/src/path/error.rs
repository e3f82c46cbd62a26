use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntoArchivePathError {
    UnrepresentableStr,
    EmptyPath,
}

impl std::error::Error for IntoArchivePathError {}

impl fmt::Display for IntoArchivePathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl IntoArchivePathError {
    pub fn as_str(&self) -> &str {
        match self {
            IntoArchivePathError::UnrepresentableStr => "unrepresentable string found in path",
            IntoArchivePathError::EmptyPath => "path names the archive root",
        }
    }

    pub fn as_io_error(&self) -> std::io::Error {
        use std::io::{Error, ErrorKind};
        Error::new(ErrorKind::InvalidInput, self.as_str())
    }
}
