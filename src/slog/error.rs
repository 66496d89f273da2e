//! SLOG-2 file error types

use crate::model::ModelError;
use crate::slog::treenode::TreeNodeID;
use thiserror::Error;

/// Errors raised while writing or reading a SLOG-2 file
#[derive(Error, Debug)]
pub enum SlogError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Checksum mismatch or impossible block pointer
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// Header is not a SLOG-2 header
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// File was written by an unknown format version
    #[error("Incompatible SLOG-2 version: {0}")]
    IncompatibleVersion(String),

    /// Requested tree node is not in the directory
    #[error("Tree node not found: {0}")]
    NodeNotFound(TreeNodeID),

    /// Tree or writer configuration rejected
    #[error("Configuration error: {0}")]
    Config(String),

    /// Drawable or category model error
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl From<bincode::Error> for SlogError {
    fn from(err: bincode::Error) -> Self {
        SlogError::Serialization(err.to_string())
    }
}

/// Result type alias for SLOG-2 operations
pub type SlogResult<T> = Result<T, SlogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SlogError::NodeNotFound(TreeNodeID::new(2, 5));
        assert_eq!(err.to_string(), "Tree node not found: (2, 5)");

        let err = SlogError::IncompatibleVersion("SLOG 2.0.1".into());
        assert_eq!(err.to_string(), "Incompatible SLOG-2 version: SLOG 2.0.1");
    }

    #[test]
    fn test_conversions() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(SlogError::from(io_err), SlogError::Io(_)));

        let model_err = ModelError::UnknownCategory(3);
        assert!(matches!(SlogError::from(model_err), SlogError::Model(_)));
    }
}
