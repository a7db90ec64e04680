//! Error taxonomy shared by every blackout layer.

use thiserror::Error;

/// Fatal error for a load, render, or export operation.
///
/// Every variant maps to a short sentence suitable for an end user through
/// [`RedactError::user_message`]; the `Display` text is the technical form
/// used in logs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RedactError {
    /// The file extension is not one of pdf, jpg, jpeg, png, gif.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    /// The document could not be parsed or decoded.
    #[error("corrupt document: {0}")]
    CorruptDocument(String),
    /// The PDF is encrypted and no password has been supplied.
    #[error("document is encrypted and requires a password")]
    PasswordRequired,
    /// The supplied password did not unlock the document.
    #[error("the supplied password is incorrect")]
    DecryptionFailed,
    /// A page could not be rasterized.
    #[error("failed to render page {page}: {reason}")]
    RenderFailure {
        /// 1-based page number.
        page: usize,
        reason: String,
    },
    /// Redactions could not be written into the output.
    #[error("failed to apply redactions: {0}")]
    BurnFailure(String),
    /// The requested redaction mode is reserved but not implemented.
    #[error("redaction mode not supported: {0}")]
    UnsupportedMode(String),
    /// The operation is not valid in the session's current state.
    #[error("`{operation}` is not valid while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    /// A newer request replaced the one this result belongs to.
    #[error("operation superseded by a newer request")]
    Superseded,
    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for RedactError {
    fn from(err: std::io::Error) -> Self {
        RedactError::Io(err.to_string())
    }
}

impl RedactError {
    /// Front-end wording for this error.
    pub fn user_message(&self) -> String {
        match self {
            RedactError::UnsupportedFileType(_) => {
                "Unsupported file type. Please upload a PDF or image file (JPG, PNG, GIF).".into()
            }
            RedactError::CorruptDocument(_) => {
                "Failed to load the PDF file. The file may be corrupted or in an unsupported format."
                    .into()
            }
            RedactError::PasswordRequired => {
                "This PDF is password protected. Please enter the password.".into()
            }
            RedactError::DecryptionFailed => "Incorrect password. Please try again.".into(),
            RedactError::RenderFailure { .. } => "Failed to render page. Please try again.".into(),
            RedactError::BurnFailure(_) => "Failed to apply redactions. Please try again.".into(),
            RedactError::UnsupportedMode(mode) => {
                format!("{mode} redaction is not available yet.")
            }
            RedactError::InvalidState { .. } => {
                "That action is not available right now.".into()
            }
            RedactError::Superseded => "The request was replaced by a newer one.".into(),
            RedactError::Io(msg) => format!("Could not read or write the file: {msg}"),
        }
    }

    /// True for errors the user can resolve without reloading the file.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RedactError::PasswordRequired
                | RedactError::DecryptionFailed
                | RedactError::RenderFailure { .. }
                | RedactError::UnsupportedMode(_)
                | RedactError::Superseded
        )
    }

    /// True for the password-related variants.
    pub fn is_password_error(&self) -> bool {
        matches!(
            self,
            RedactError::PasswordRequired | RedactError::DecryptionFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_technical() {
        let err = RedactError::RenderFailure {
            page: 3,
            reason: "bad stream".into(),
        };
        assert_eq!(err.to_string(), "failed to render page 3: bad stream");
    }

    #[test]
    fn user_messages() {
        assert_eq!(
            RedactError::UnsupportedFileType("txt".into()).user_message(),
            "Unsupported file type. Please upload a PDF or image file (JPG, PNG, GIF)."
        );
        assert_eq!(
            RedactError::BurnFailure("x".into()).user_message(),
            "Failed to apply redactions. Please try again."
        );
    }

    #[test]
    fn password_errors_are_recoverable() {
        assert!(RedactError::DecryptionFailed.is_recoverable());
        assert!(RedactError::PasswordRequired.is_password_error());
        assert!(!RedactError::CorruptDocument("x".into()).is_recoverable());
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: RedactError = io.into();
        assert!(matches!(err, RedactError::Io(ref m) if m.contains("missing")));
    }
}
