//! Error types for velgrid

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for velgrid operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Fit failed: {0}")]
    Fit(String),

    #[error("Interpolation failed: {0}")]
    Interpolation(String),

    #[error("Grid size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    DimensionMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Index out of bounds: ({row}, {col}) in grid of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Coarse error category handed across the library boundary.
///
/// Front ends match on the kind to pick a remediation hint; the message
/// carries the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Io,
    Geometry,
    Parse,
    Fit,
    Interpolation,
    DimensionMismatch,
    InvalidParameter,
    Config,
    Cancelled,
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Geometry(_) => ErrorKind::Geometry,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Fit(_) => ErrorKind::Fit,
            Error::Interpolation(_) => ErrorKind::Interpolation,
            Error::DimensionMismatch { .. } | Error::IndexOutOfBounds { .. } => {
                ErrorKind::DimensionMismatch
            }
            Error::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Error::Config(_) => ErrorKind::Config,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether this is the cancellation signal rather than a real failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    pub(crate) fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for velgrid operations
pub type Result<T> = std::result::Result<T, Error>;
