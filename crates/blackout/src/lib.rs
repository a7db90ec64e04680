//! blackout: Cover regions of PDFs and images and export them permanently
//! redacted.
//!
//! This is the public API facade crate. It re-exports types from
//! blackout-core and uses blackout-parse to open, scrub, and write documents.
//!
//! # Architecture
//!
//! - **blackout-core**: Backend-independent geometry, redaction store, and errors
//! - **blackout-parse**: PDF and image backends, content-stream scrubbing
//! - **blackout** (this crate): Session state machine, async driver, burn
//!
//! # Example
//!
//! ```ignore
//! use blackout::{Rect, Redactor, SourceFile, Size};
//!
//! let mut redactor = Redactor::default();
//! redactor.load(SourceFile::new("scan.png", bytes)).await?;
//! redactor.add_redaction_from_drag(Rect::new(10.0, 10.0, 80.0, 20.0), Size::new(640.0, 480.0))?;
//! let exported = redactor.export().await?;
//! std::fs::write(&exported.file_name, &exported.bytes)?;
//! ```

pub mod applier;
pub mod export;
pub mod loader;
pub mod redactor;
pub mod render;
pub mod session;

#[cfg(test)]
mod test_fixtures;

pub use blackout_core;
pub use blackout_parse;

pub use applier::RedactionApplier;
pub use blackout_core::{
    Display, DocumentKind, DragGesture, ExportedFile, ImageFormat, ImageScrubPolicy, Password,
    Point, PointerButton, Rect, RedactError, RedactOptions, Redaction, RedactionMode,
    RedactionStore, Size, SourceFile, Surface, export_file_name, mapper,
};
pub use blackout_parse::PageHandle;
pub use export::BurnJob;
pub use loader::LoadedDocument;
pub use redactor::{
    ExportCompletion, ExportTicket, LoadCompletion, LoadStatus, LoadTicket, Redactor,
    UnlockCompletion, UnlockTicket,
};
pub use render::{DefaultRenderer, PageRenderer, RenderMetrics, RenderSurface, draw_overlay};
pub use session::{DecodeJob, DocumentSession, Encryption, RenderRequest, SessionState, Step};
