//! Export jobs: a self-contained snapshot of everything a burn needs.

use blackout_core::{
    DocumentKind, ExportedFile, Password, RedactError, RedactOptions, Redaction, SourceFile,
    export_file_name,
};
use tracing::info;

use crate::applier::RedactionApplier;

/// Inputs of one export, detached from the session.
///
/// The job holds a clone of the shared source buffer and a copy of the
/// redactions, so the session may move on (or be cleared) while it runs.
#[derive(Debug, Clone)]
pub struct BurnJob {
    pub source: SourceFile,
    pub kind: DocumentKind,
    pub redactions: Vec<Redaction>,
    pub password: Option<Password>,
    pub remove_encryption: bool,
    pub options: RedactOptions,
}

impl BurnJob {
    /// Burn the redactions and name the result.
    ///
    /// # Errors
    ///
    /// See [`RedactionApplier::burn`].
    pub fn run(&self) -> Result<ExportedFile, RedactError> {
        let bytes = RedactionApplier::burn(
            self.source.bytes(),
            &self.redactions,
            self.kind,
            self.password.as_ref(),
            self.remove_encryption,
            &self.options,
        )?;
        let file = exported_file(self.source.name(), self.kind, bytes);
        info!(
            file_name = %file.file_name,
            media_type = file.media_type,
            size = file.bytes.len(),
            "export ready"
        );
        Ok(file)
    }
}

/// Wrap burned bytes with the download name and media type.
pub fn exported_file(original_name: &str, kind: DocumentKind, bytes: Vec<u8>) -> ExportedFile {
    ExportedFile {
        file_name: export_file_name(original_name),
        bytes,
        media_type: kind.output_media_type(),
    }
}
