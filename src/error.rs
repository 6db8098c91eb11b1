//! Error Types
//!
//! Every fallible library operation returns [`Result`]. The binary wraps these
//! errors with `anyhow` context before reporting them.

use std::path::PathBuf;

/// Errors raised while fetching, parsing or writing gene/pathway data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A local input file does not exist.
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// An argument failed validation before any I/O was attempted.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A remote endpoint answered with a non-success status or was unreachable.
    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    /// The output path already exists and overwriting is not allowed.
    #[error("file already exists: {}", .0.display())]
    FileExists(PathBuf),

    /// Text input did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("plot rendering failed: {0}")]
    Plot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
