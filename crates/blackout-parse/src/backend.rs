//! Document backend trait.
//!
//! Defines the [`DocumentBackend`] trait that abstracts the operations the
//! redaction pipeline needs from a document format: probing for encryption,
//! opening, reading page geometry, removing content under redactions, and
//! writing the result.

use blackout_core::{Document, ImageFormat, Password, Rect, RedactOptions, Size};

use crate::error::BackendError;
use crate::page_geometry::PageGeometry;
pub use crate::scrub::ScrubReport;

/// A reference to one page of an opened document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHandle {
    /// 0-based page index.
    pub index: usize,
    pub geometry: PageGeometry,
}

impl PageHandle {
    /// Displayed page size in document units, rotation applied.
    pub fn doc_size(&self) -> Size<Document> {
        self.geometry.visible_size()
    }

    /// 1-based page number.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Output settings for [`DocumentBackend::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Write the output unencrypted even if the source was encrypted.
    pub remove_encryption: bool,
    /// JPEG quality (1-100) for lossy raster output.
    pub jpeg_quality: u8,
    /// Raster format named by the source file. Decides the output encoding
    /// of images; when absent the format sniffed from the bytes is used.
    pub declared_format: Option<ImageFormat>,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            remove_encryption: true,
            jpeg_quality: 92,
            declared_format: None,
        }
    }
}

impl From<&RedactOptions> for SaveOptions {
    fn from(options: &RedactOptions) -> Self {
        Self {
            remove_encryption: options.remove_encryption,
            jpeg_quality: options.jpeg_quality,
            declared_format: None,
        }
    }
}

/// Trait abstracting a document format.
///
/// Backends are used through associated functions:
///
/// ```ignore
/// let mut doc = MyBackend::open(bytes, Some(&password))?;
/// let page = MyBackend::page(&doc, 0)?;
/// MyBackend::redact_page(&mut doc, &page, &regions, &options)?;
/// let out = MyBackend::save(doc, &SaveOptions::default())?;
/// ```
pub trait DocumentBackend {
    /// The opened document type.
    type Document;

    /// Whether `bytes` hold an encrypted document that needs a password.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be parsed at all.
    fn probe_encrypted(bytes: &[u8]) -> Result<bool, BackendError>;

    /// Open a document, decrypting it with `password` when given.
    ///
    /// # Errors
    ///
    /// [`BackendError::PasswordRequired`] when the document is encrypted and
    /// no password was supplied, [`BackendError::InvalidPassword`] when the
    /// password is wrong, and a parse error for malformed input.
    fn open(bytes: &[u8], password: Option<&Password>) -> Result<Self::Document, BackendError>;

    /// Number of pages.
    fn page_count(doc: &Self::Document) -> usize;

    /// Whether the source was encrypted.
    fn is_encrypted(doc: &Self::Document) -> bool;

    /// Access a page by 0-based index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range or the page is malformed.
    fn page(doc: &Self::Document, index: usize) -> Result<PageHandle, BackendError>;

    /// Remove everything under `regions` on one page and paint the regions
    /// with the fill colour. Regions are in the backend's native coordinates
    /// (see [`PageGeometry::surface_to_native`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the page content cannot be rewritten.
    fn redact_page(
        doc: &mut Self::Document,
        page: &PageHandle,
        regions: &[Rect<Document>],
        options: &RedactOptions,
    ) -> Result<ScrubReport, BackendError>;

    /// Serialize the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be produced.
    fn save(doc: Self::Document, options: &SaveOptions) -> Result<Vec<u8>, BackendError>;
}
