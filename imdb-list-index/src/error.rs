use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// A type alias for handling errors throughout imdb-list-index.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while building or querying a list archive.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Return a reference to the kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Transfer ownership of the kind of this error.
    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// Returns true if and only if this error corresponds to an expired
    /// search deadline. Service wrappers catch this case and report it
    /// separately from real failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    pub(crate) fn archive_invalid<T: AsRef<str>>(msg: T) -> Error {
        Error { kind: ErrorKind::ArchiveInvalid(msg.as_ref().to_string()) }
    }

    pub(crate) fn archive_exists<P: AsRef<Path>>(path: P) -> Error {
        Error { kind: ErrorKind::ArchiveExists(path.as_ref().to_path_buf()) }
    }

    pub(crate) fn unsupported<T: AsRef<str>>(msg: T) -> Error {
        Error { kind: ErrorKind::Unsupported(msg.as_ref().to_string()) }
    }

    pub(crate) fn parse<T: AsRef<str>>(msg: T) -> Error {
        Error { kind: ErrorKind::Parse(msg.as_ref().to_string()) }
    }

    pub(crate) fn source_missing<P: AsRef<Path>>(path: P) -> Error {
        Error { kind: ErrorKind::SourceMissing(path.as_ref().to_path_buf()) }
    }

    pub(crate) fn timeout() -> Error {
        Error { kind: ErrorKind::Timeout }
    }

    pub(crate) fn bug<T: AsRef<str>>(msg: T) -> Error {
        Error { kind: ErrorKind::Bug(msg.as_ref().to_string()) }
    }

    pub(crate) fn io(err: io::Error) -> Error {
        Error { kind: ErrorKind::Io { err, path: None } }
    }

    pub(crate) fn io_path<P: AsRef<Path>>(err: io::Error, path: P) -> Error {
        Error {
            kind: ErrorKind::Io {
                err,
                path: Some(path.as_ref().to_path_buf()),
            },
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind {
            ErrorKind::Io { ref err, .. } => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.kind.fmt(f)
    }
}

/// The specific kind of error that can occur.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The archive is neither a valid zip container nor a valid gzip stream,
    /// or a sub-stream that must exist is absent.
    ArchiveInvalid(String),
    /// A rebuild was requested but the archive file already exists. Rebuilds
    /// always start from scratch; delete the archive first.
    ArchiveExists(PathBuf),
    /// The requested operation is not available on this handle, e.g. seeking
    /// backwards on a gzip-wrapped stream.
    Unsupported(String),
    /// A line did not match the schema its list file promises. Fatal while
    /// ingesting a list, skipped while answering a point lookup.
    Parse(String),
    /// A raw `*.list.gz` input was not found.
    SourceMissing(PathBuf),
    /// A search deadline expired. The scan is aborted and partial results
    /// are discarded.
    Timeout,
    /// An unexpected error occurred while reading index structures that
    /// should not have occurred. Generally, these errors correspond to bugs
    /// in this library.
    Bug(String),
    /// An unexpected I/O error occurred.
    Io {
        /// The underlying I/O error.
        err: io::Error,
        /// A file path, if the I/O error occurred in the context of a named
        /// file.
        path: Option<PathBuf>,
    },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ErrorKind::ArchiveInvalid(ref msg) => {
                write!(f, "invalid archive: {}", msg)
            }
            ErrorKind::ArchiveExists(ref p) => {
                write!(f, "archive {} already exists", p.display())
            }
            ErrorKind::Unsupported(ref msg) => {
                write!(f, "unsupported operation: {}", msg)
            }
            ErrorKind::Parse(ref msg) => write!(f, "{}", msg),
            ErrorKind::SourceMissing(ref p) => {
                write!(f, "missing list file {}", p.display())
            }
            ErrorKind::Timeout => write!(f, "search timed out"),
            ErrorKind::Bug(ref msg) => write!(f, "BUG: {}", msg),
            ErrorKind::Io { path: None, ref err } => {
                write!(f, "I/O error: {}", err)
            }
            ErrorKind::Io { path: Some(ref p), ref err } => {
                write!(f, "{}: {}", p.display(), err)
            }
        }
    }
}
