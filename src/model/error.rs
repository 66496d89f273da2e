//! Data model error types

use crate::model::info::InfoType;
use thiserror::Error;

/// Errors raised while building or resolving drawables
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Value representation does not match the declared info type
    #[error("Info type mismatch: declared {declared}, got {actual}")]
    TypeMismatch { declared: InfoType, actual: InfoType },

    /// Info slot index past the category's schema
    #[error("Info slot {index} out of range ({len} slots declared)")]
    InfoIndexOutOfRange { index: usize, len: usize },

    /// Drawable references a category missing from the map
    #[error("Unknown category index: {0}")]
    UnknownCategory(i32),

    /// Composite built from primitives of different categories or none at all
    #[error("Invalid composite: {0}")]
    InvalidComposite(String),
}

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelError::TypeMismatch {
            declared: InfoType::I32,
            actual: InfoType::Str,
        };
        assert_eq!(err.to_string(), "Info type mismatch: declared int32, got string");

        let err = ModelError::UnknownCategory(7);
        assert_eq!(err.to_string(), "Unknown category index: 7");
    }
}
