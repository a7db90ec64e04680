//! blackout-core: Backend-independent data types for the redaction engine.
//!
//! This crate provides frame-tagged geometry ([`Rect`], [`Point`], [`Size`]),
//! the coordinate [`mapper`] that moves rectangles between display, surface,
//! and document space, the [`RedactionStore`] of pending redactions, drag
//! gesture tracking, document identity, options, and the [`RedactError`]
//! taxonomy. It performs no I/O.

pub mod document;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod mapper;
pub mod options;
pub mod redaction;

pub use document::{
    DocumentKind, ExportedFile, ImageFormat, Password, RedactionMode, SourceFile,
    export_file_name,
};
pub use error::RedactError;
pub use geometry::{Ctm, Display, Document, Frame, Point, Rect, Size, Surface};
pub use gesture::{DragGesture, PointerButton};
pub use mapper::OriginMode;
pub use options::{ImageScrubPolicy, RedactOptions};
pub use redaction::{MIN_REDACTION_EXTENT, Redaction, RedactionStore};
