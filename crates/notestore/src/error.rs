//! Error types for notestore

use std::io;

use thiserror::Error;

use crate::note::NoteId;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for store operations
#[derive(Debug, Error)]
pub enum Error {
    /// No live note with this id
    #[error("note not found: {0}")]
    NotFound(NoteId),

    /// Transport or storage fault in the backend
    #[error("store unavailable: {0}")]
    Unavailable(#[from] io::Error),

    /// A stored document could not be decoded
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Encoded record exceeds the 1 MB limit
    #[error("record too large: {0} bytes (max 1 MB)")]
    RecordTooLarge(usize),

    /// Journal record counter is exhausted
    #[error("journal is full ({0} records)")]
    JournalFull(u32),

    /// Store has been closed
    #[error("store is closed")]
    Closed,
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Malformed(err.to_string())
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => Error::Malformed("truncated journal".to_string()),
            nom::Err::Error(e) | nom::Err::Failure(e) => Error::Malformed(format!(
                "{:?} with {} bytes remaining",
                e.code,
                e.input.len()
            )),
        }
    }
}
