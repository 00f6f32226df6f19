use std::fmt;
use std::io;

/// Error returned by every public volume operation.
///
/// Everything except [`FsError::Corrupted`] is recoverable at the call site.
/// `Corrupted` means an on-disk invariant no longer holds (a cluster index
/// out of bounds, a chain that never terminates) and the volume contents
/// must no longer be trusted.
#[derive(Debug)]
pub enum FsError {
    AlreadyExists,
    NotFound,
    NotDirectory,
    NotAFile,
    DirectoryNotEmpty,
    NameTooLong,
    InvalidName,
    PathTooDeep,
    OutOfSpace,
    TruncatedFile,
    Corrupted(&'static str),
    Io(io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// True for errors that invalidate the whole volume, not just the call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FsError::Corrupted(_))
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::AlreadyExists => write!(f, "already exists"),
            FsError::NotFound => write!(f, "not found"),
            FsError::NotDirectory => write!(f, "not a directory"),
            FsError::NotAFile => write!(f, "is a directory"),
            FsError::DirectoryNotEmpty => write!(f, "directory not empty"),
            FsError::NameTooLong => write!(f, "name too long"),
            FsError::InvalidName => write!(f, "invalid name"),
            FsError::PathTooDeep => write!(f, "path has too many components"),
            FsError::OutOfSpace => write!(f, "no space left on volume"),
            FsError::TruncatedFile => write!(f, "file chain ends before its recorded size"),
            FsError::Corrupted(what) => write!(f, "volume corrupted: {what}"),
            FsError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FsError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for FsError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists,
            io::ErrorKind::NotFound => FsError::NotFound,
            _ => FsError::Io(e),
        }
    }
}
