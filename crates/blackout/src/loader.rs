//! Probe and decode collaborators for the session.
//!
//! Both functions are blocking and take the shared [`SourceFile`] by
//! reference, so a probe followed by a decode reads the same unconsumed
//! buffer.

use std::sync::Arc;

use blackout_core::{DocumentKind, Password, RedactError, SourceFile};
use blackout_parse::{
    BackendError, DocumentBackend, LopdfBackend, PageHandle, RasterBackend,
};
use image::RgbaImage;
use tracing::debug;

/// A decoded document, ready for navigation and rendering.
#[derive(Clone)]
pub struct LoadedDocument {
    kind: DocumentKind,
    pages: Vec<PageHandle>,
    encrypted: bool,
    raster: Option<Arc<RgbaImage>>,
}

impl LoadedDocument {
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page by 0-based index.
    pub fn page(&self, index: usize) -> Option<&PageHandle> {
        self.pages.get(index)
    }

    pub fn pages(&self) -> &[PageHandle] {
        &self.pages
    }

    /// Whether the source was encrypted (and therefore opened with a password).
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Decoded pixels of an image document. `None` for PDFs.
    pub fn raster(&self) -> Option<&RgbaImage> {
        self.raster.as_deref()
    }
}

impl std::fmt::Debug for LoadedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedDocument")
            .field("kind", &self.kind)
            .field("page_count", &self.pages.len())
            .field("encrypted", &self.encrypted)
            .finish_non_exhaustive()
    }
}

/// Lightweight encryption check. Images are never encrypted.
///
/// # Errors
///
/// [`RedactError::CorruptDocument`] if the bytes are not a parseable PDF.
pub fn probe(source: &SourceFile, kind: DocumentKind) -> Result<bool, RedactError> {
    match kind {
        DocumentKind::Pdf => {
            LopdfBackend::probe_encrypted(source.bytes()).map_err(BackendError::into_load_error)
        }
        DocumentKind::Image(_) => Ok(false),
    }
}

/// Fully decode `source`, decrypting with `password` when given.
///
/// # Errors
///
/// [`RedactError::PasswordRequired`] or [`RedactError::DecryptionFailed`]
/// for encrypted PDFs, [`RedactError::CorruptDocument`] otherwise.
pub fn decode(
    source: &SourceFile,
    kind: DocumentKind,
    password: Option<&Password>,
) -> Result<LoadedDocument, RedactError> {
    let loaded = match kind {
        DocumentKind::Pdf => {
            let doc = LopdfBackend::open(source.bytes(), password)
                .map_err(BackendError::into_load_error)?;
            let pages = collect_pages::<LopdfBackend>(&doc)?;
            LoadedDocument {
                kind,
                pages,
                encrypted: LopdfBackend::is_encrypted(&doc),
                raster: None,
            }
        }
        DocumentKind::Image(_) => {
            let doc = RasterBackend::open(source.bytes(), None)
                .map_err(BackendError::into_load_error)?;
            let pages = collect_pages::<RasterBackend>(&doc)?;
            LoadedDocument {
                kind,
                pages,
                encrypted: false,
                raster: Some(Arc::new(doc.pixels().clone())),
            }
        }
    };
    debug!(
        name = source.name(),
        kind = %kind,
        pages = loaded.page_count(),
        "decoded document"
    );
    Ok(loaded)
}

fn collect_pages<B: DocumentBackend>(doc: &B::Document) -> Result<Vec<PageHandle>, RedactError> {
    (0..B::page_count(doc))
        .map(|i| B::page(doc, i).map_err(BackendError::into_load_error))
        .collect()
}
