//! Burning pending redactions into a new document.

use std::collections::BTreeMap;

use blackout_core::{
    Document, DocumentKind, OriginMode, Password, Rect, RedactError, RedactOptions, Redaction,
};
use blackout_parse::{
    BackendError, DocumentBackend, LopdfBackend, RasterBackend, SaveOptions, ScrubReport,
};
use tracing::{info, instrument, warn};

/// Writes redactions into a fresh copy of the source document.
///
/// The source bytes are only read. Each redaction is mapped with the surface
/// size it was drawn against and the page's current document size, the
/// content under it is removed, and the region is filled opaque.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedactionApplier;

impl RedactionApplier {
    /// Produce the redacted document.
    ///
    /// `password` is the one the session was unlocked with. PDFs are written
    /// without encryption when `remove_encryption` is set; otherwise an
    /// encrypted source is re-encrypted as it was. Images only honour
    /// redactions on page 0 and are written as PNG when `kind` says PNG,
    /// JPEG otherwise, whatever the bytes hold.
    ///
    /// # Errors
    ///
    /// [`RedactError::DecryptionFailed`] when the password does not open the
    /// source, [`RedactError::BurnFailure`] for any other failure.
    #[instrument(skip_all, fields(kind = %kind, redactions = redactions.len()))]
    pub fn burn(
        bytes: &[u8],
        redactions: &[Redaction],
        kind: DocumentKind,
        password: Option<&Password>,
        remove_encryption: bool,
        options: &RedactOptions,
    ) -> Result<Vec<u8>, RedactError> {
        let save = SaveOptions {
            remove_encryption,
            jpeg_quality: options.jpeg_quality,
            declared_format: match kind {
                DocumentKind::Pdf => None,
                DocumentKind::Image(format) => Some(format),
            },
        };
        let origin = kind.origin_mode();
        let (out, report) = match kind {
            DocumentKind::Pdf => {
                burn_with::<LopdfBackend>(bytes, redactions, origin, password, &save, options)
            }
            DocumentKind::Image(_) => {
                burn_with::<RasterBackend>(bytes, redactions, origin, None, &save, options)
            }
        }
        .map_err(BackendError::into_burn_error)?;
        info!(
            bytes_out = out.len(),
            glyphs_removed = report.glyphs_removed,
            images_rewritten = report.images_rewritten,
            images_removed = report.images_removed,
            inline_images_removed = report.inline_images_removed,
            forms_removed = report.forms_removed,
            annotations_removed = report.annotations_removed,
            "burned redactions"
        );
        Ok(out)
    }
}

/// Group redactions by page index, keeping insertion order within a page.
fn by_page(redactions: &[Redaction]) -> BTreeMap<usize, Vec<&Redaction>> {
    let mut pages: BTreeMap<usize, Vec<&Redaction>> = BTreeMap::new();
    for r in redactions {
        pages.entry(r.page_index()).or_default().push(r);
    }
    pages
}

fn burn_with<B: DocumentBackend>(
    bytes: &[u8],
    redactions: &[Redaction],
    origin: OriginMode,
    password: Option<&Password>,
    save: &SaveOptions,
    options: &RedactOptions,
) -> Result<(Vec<u8>, ScrubReport), BackendError> {
    let mut doc = B::open(bytes, password)?;
    let page_count = B::page_count(&doc);
    let mut report = ScrubReport::default();

    for (index, items) in by_page(redactions) {
        if index >= page_count {
            warn!(
                page_index = index,
                page_count,
                skipped = items.len(),
                "ignoring redactions outside the document"
            );
            continue;
        }
        let page = B::page(&doc, index)?;
        let regions: Vec<Rect<Document>> = items
            .iter()
            .map(|r| {
                page.geometry
                    .surface_to_native(r.rect(), r.surface_size(), origin)
            })
            .collect();
        report.merge(B::redact_page(&mut doc, &page, &regions, options)?);
    }

    let out = B::save(doc, save)?;
    Ok((out, report))
}
