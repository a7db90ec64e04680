//! Document identity: kind detection, source bytes, passwords, export naming.

use std::fmt;
use std::sync::Arc;

use crate::error::RedactError;
use crate::mapper::OriginMode;

/// Raster formats accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    /// Format used when writing the redacted image.
    ///
    /// PNG stays PNG; every other input is re-encoded as JPEG.
    pub fn output_format(self) -> ImageFormat {
        match self {
            ImageFormat::Png => ImageFormat::Png,
            ImageFormat::Jpeg | ImageFormat::Gif => ImageFormat::Jpeg,
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
        }
    }
}

/// What kind of document a session holds. Decided once, at load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DocumentKind {
    Pdf,
    Image(ImageFormat),
}

impl DocumentKind {
    /// Resolve the kind from a file name's extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Result<Self, RedactError> {
        let ext = extension(name)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "jpg" | "jpeg" => Ok(DocumentKind::Image(ImageFormat::Jpeg)),
            "png" => Ok(DocumentKind::Image(ImageFormat::Png)),
            "gif" => Ok(DocumentKind::Image(ImageFormat::Gif)),
            _ => Err(RedactError::UnsupportedFileType(name.to_string())),
        }
    }

    pub fn origin_mode(self) -> OriginMode {
        match self {
            DocumentKind::Pdf => OriginMode::BottomLeft,
            DocumentKind::Image(_) => OriginMode::TopLeft,
        }
    }

    /// Media type of the exported file.
    pub fn output_media_type(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Image(format) => format.output_format().media_type(),
        }
    }

    pub fn is_pdf(self) -> bool {
        matches!(self, DocumentKind::Pdf)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Pdf => f.write_str("PDF"),
            DocumentKind::Image(ImageFormat::Png) => f.write_str("PNG image"),
            DocumentKind::Image(ImageFormat::Jpeg) => f.write_str("JPEG image"),
            DocumentKind::Image(ImageFormat::Gif) => f.write_str("GIF image"),
        }
    }
}

/// How redactions are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RedactionMode {
    /// Axis-aligned rectangles drawn by the user.
    #[default]
    Rectangle,
    /// Reserved for content-aware detection. Not implemented.
    TextDetection,
}

impl fmt::Display for RedactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedactionMode::Rectangle => f.write_str("Rectangle"),
            RedactionMode::TextDetection => f.write_str("Text detection"),
        }
    }
}

/// An input file: its name and an immutable, shareable byte buffer.
///
/// Cloning is cheap; every task that probes, decodes, or burns the file
/// reads the same buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &Arc<[u8]> {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A document password. `Debug` never reveals it.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn extension(name: &str) -> Option<&str> {
    let file = file_part(name);
    let (_, ext) = file.rsplit_once('.')?;
    Some(ext)
}

fn file_part(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Name of the exported file: `<base>_redacted.<ext>`.
///
/// The base keeps every dot except the one before the extension. A name
/// without an extension gets `_redacted` appended. Directory components are
/// dropped.
pub fn export_file_name(original: &str) -> String {
    let file = file_part(original);
    match file.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => format!("{base}_redacted.{ext}"),
        _ => format!("{file}_redacted"),
    }
}

/// The exported result of a burn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
}
