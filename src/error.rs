//! Library-wide error and result types.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout pakscan.
pub type Result<T> = std::result::Result<T, Error>;

/// Which bound a hard validation check enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Offset,
    Length,
    Range,
    FileCount,
    NameLength,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bound::Offset => "offset",
            Bound::Length => "length",
            Bound::Range => "range end",
            Bound::FileCount => "file count",
            Bound::NameLength => "name length",
        })
    }
}

/// All errors the library can produce.
///
/// Errors fall into three groups that callers usually treat differently:
///
/// * detection outcomes - [`Error::NotRecognized`] (wrong tool) versus
///   [`Error::Corrupt`] (right tool, damaged file);
/// * directory validation failures raised while a plugin parses
///   ([`Error::OutOfBounds`], [`Error::InvalidName`], [`Error::Mismatch`] and
///   the low-level read errors), which the engine wraps in `Corrupt`;
/// * extraction failures scoped to a single resource
///   ([`Error::UnsupportedTransform`], [`Error::Truncated`]).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// No registered plugin scored above the acceptance threshold.
    #[error("no registered format recognized '{path}'")]
    NotRecognized { path: PathBuf },

    /// A plugin matched with confidence but its directory could not be read.
    #[error("'{path}' looks like {format} (score {score}) but its directory is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        format: &'static str,
        score: u8,
        #[source]
        source: Box<Error>,
    },

    /// A directory value fell outside its valid bounds.
    #[error("{bound} value {value} out of bounds (limit {limit})")]
    OutOfBounds { bound: Bound, value: i128, limit: u64 },

    /// A stored name is empty, overlong or contains control characters.
    #[error("implausible file name {name:?}")]
    InvalidName { name: String },

    /// A field that restates another value disagrees with it.
    #[error("{field} mismatch: expected {expected}, found {found}")]
    Mismatch {
        field: &'static str,
        expected: u64,
        found: u64,
    },

    /// A magic/signature field did not match the expected value.
    #[error("bad magic value")]
    BadMagic,

    /// The stream ended before all expected bytes could be read.
    #[error("unexpected end of file")]
    UnexpectedEof,

    /// A null-terminated string had no null terminator within the buffer.
    #[error("unterminated string")]
    UnterminatedName,

    /// An offset or size field would read outside the valid region.
    #[error("invalid offset or size")]
    InvalidRange,

    /// A structural constraint was violated (message describes which one).
    #[error("parse error: {0}")]
    Parse(&'static str),

    /// A resource names a decode transform that has no implementation.
    #[error("no decoder available for transform '{kind}'")]
    UnsupportedTransform { kind: String },

    /// Extraction produced fewer bytes than the resource declares.
    #[error("resource '{name}' truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// The caller cancelled the operation through its [`crate::Control`].
    #[error("operation cancelled")]
    Cancelled,

    /// The archive's format does not declare write support.
    #[error("{format} archives cannot be patched")]
    ReadOnly { format: &'static str },

    /// A patch could not be encoded into the recorded directory fields.
    #[error("cannot patch: {0}")]
    Patch(&'static str),

    /// Failed to open an input file.
    #[error("failed to open '{path}': {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An underlying I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// LZ4 decompression failed.
    #[cfg(feature = "compression")]
    #[error("lz4 decompression failed")]
    Lz4,
}

impl Error {
    pub(crate) fn out_of_bounds(bound: Bound, value: impl Into<i128>, limit: u64) -> Self {
        Self::OutOfBounds {
            bound,
            value: value.into(),
            limit,
        }
    }

    pub(crate) fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedTransform { kind: kind.into() }
    }

    /// True when no plugin claimed the file.
    pub fn is_not_recognized(&self) -> bool {
        matches!(self, Self::NotRecognized { .. })
    }

    /// True when a plugin claimed the file but failed to read its directory.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }

    /// Wrap this error so it can travel through a [`std::io::Read`] impl.
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::other(self)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof && e.get_ref().is_none() {
            return Error::UnexpectedEof;
        }
        if e.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return match e.into_inner().map(|inner| inner.downcast::<Error>()) {
                Some(Ok(inner)) => *inner,
                _ => Error::Parse("lost tunnelled error"),
            };
        }
        Error::Io(e)
    }
}
