//! Library-wide error and result types.

use std::fmt;
use std::io;

/// Result alias used throughout nitrokit.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context should wrap `Error` in their own type.
#[derive(Debug)]
pub enum Error {
    /// A magic/signature field did not match the expected value.
    BadMagic,
    /// A resource version is present in the data but not supported by this
    /// parser.
    UnsupportedVersion(u16),
    /// The stream ended before all expected bytes could be read.
    UnexpectedEof,
    /// An offset or size field would read outside the valid region.
    InvalidRange,
    /// A structural constraint was violated (message describes which one).
    Parse(&'static str),
    /// Externally supplied data disagrees with the parsed structure
    /// (message describes which constraint).
    Consistency(&'static str),
    /// No decoder is registered for this magic tag.
    UnknownFormat([u8; 4]),
    /// A compressed blob could not be decompressed.
    Decompress,
    /// An underlying I/O operation failed.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadMagic => write!(f, "bad magic value"),
            Error::UnsupportedVersion(v) => write!(f, "unsupported version: {v:#06x}"),
            Error::UnexpectedEof => write!(f, "unexpected end of file"),
            Error::InvalidRange => write!(f, "invalid offset or size"),
            Error::Parse(s) => write!(f, "parse error: {s}"),
            Error::Consistency(s) => write!(f, "consistency error: {s}"),
            Error::UnknownFormat(tag) => {
                write!(f, "unknown format tag: {}", String::from_utf8_lossy(tag))
            }
            Error::Decompress => write!(f, "decompression failed"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Error::Io(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        // read_exact reports a short read as ErrorKind::UnexpectedEof.
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof
        } else {
            Error::Io(e)
        }
    }
}
