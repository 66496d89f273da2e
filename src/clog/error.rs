//! CLOG codec error types

use thiserror::Error;

/// Errors raised while reading or writing a CLOG-2 event log
#[derive(Error, Debug)]
pub enum ClogError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Preamble could not be decoded
    #[error("Invalid preamble: {0}")]
    InvalidPreamble(String),

    /// A record inside a block could not be decoded; the stream is abandoned
    #[error("Malformed record in block {block} at offset {offset}: {reason}")]
    Malformed {
        block: u64,
        offset: usize,
        reason: String,
    },

    /// Record type code outside the known set
    #[error("Unknown record type: {0}")]
    UnknownRecordType(i32),

    /// Record (plus block terminator) does not fit in one block
    #[error("Record of {size} bytes does not fit in a {block_size}-byte block")]
    RecordTooLarge { size: usize, block_size: usize },
}

impl ClogError {
    /// Attach the stream position to a decode failure
    pub(crate) fn at(self, block: u64, offset: usize) -> Self {
        match self {
            ClogError::Malformed { reason, .. } => ClogError::Malformed {
                block,
                offset,
                reason,
            },
            ClogError::UnknownRecordType(code) => ClogError::Malformed {
                block,
                offset,
                reason: format!("unknown record type {}", code),
            },
            other => other,
        }
    }
}

/// Result type alias for CLOG operations
pub type ClogResult<T> = Result<T, ClogError>;
