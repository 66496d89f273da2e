//! Conversion error types

use crate::clog::ClogError;
use crate::model::ModelError;
use crate::slog::SlogError;
use thiserror::Error;

/// Errors that abort a CLOG → SLOG-2 or SLOG-2 → SLOG-2 conversion
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Reading the event log failed
    #[error("CLOG error: {0}")]
    Clog(#[from] ClogError),

    /// Writing or reading the SLOG-2 file failed
    #[error("SLOG-2 error: {0}")]
    Slog(#[from] SlogError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A drawable ended before the one written just before it
    #[error(
        "Drawable {index} ends at {current_end} before the previous end {previous_end}: {drawable}"
    )]
    OrderViolation {
        index: u64,
        previous_end: f64,
        current_end: f64,
        drawable: String,
    },

    /// Input version unknown and conversion was not forced
    #[error("Incompatible input: {0}")]
    IncompatibleInput(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// Result type alias for conversions
pub type ConvertResult<T> = Result<T, ConvertError>;
