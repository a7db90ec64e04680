//! Error types for the backend layer.
//!
//! Uses [`thiserror`] for derivation. [`BackendError`] wraps lopdf, image, and
//! I/O failures and converts into [`RedactError`] at the facade boundary.

use blackout_core::RedactError;
use thiserror::Error;

/// Error type for backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Error from PDF parsing (structure, syntax, object resolution).
    #[error("PDF parse error: {0}")]
    Parse(String),

    /// The document is encrypted and no password was supplied.
    #[error("document is encrypted")]
    PasswordRequired,

    /// The supplied password was rejected.
    #[error("incorrect password")]
    InvalidPassword,

    /// Error decoding or encoding raster data.
    #[error("image error: {0}")]
    Image(String),

    /// Error while rewriting page content.
    #[error("content error: {0}")]
    Content(String),

    /// Error writing the output document.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Error reading data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A core library error.
    #[error(transparent)]
    Core(#[from] RedactError),
}

impl From<lopdf::Error> for BackendError {
    fn from(err: lopdf::Error) -> Self {
        BackendError::Parse(err.to_string())
    }
}

impl From<image::ImageError> for BackendError {
    fn from(err: image::ImageError) -> Self {
        BackendError::Image(err.to_string())
    }
}

impl BackendError {
    /// Convert an error raised while opening a document.
    pub fn into_load_error(self) -> RedactError {
        match self {
            BackendError::PasswordRequired => RedactError::PasswordRequired,
            BackendError::InvalidPassword => RedactError::DecryptionFailed,
            BackendError::Core(e) => e,
            BackendError::Io(e) => RedactError::Io(e.to_string()),
            other => RedactError::CorruptDocument(other.to_string()),
        }
    }

    /// Convert an error raised while burning redactions.
    pub fn into_burn_error(self) -> RedactError {
        match self {
            BackendError::PasswordRequired | BackendError::InvalidPassword => {
                RedactError::DecryptionFailed
            }
            BackendError::Core(e) => e,
            BackendError::Io(e) => RedactError::Io(e.to_string()),
            other => RedactError::BurnFailure(other.to_string()),
        }
    }
}
