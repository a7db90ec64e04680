//! blackout-parse: Document backends and content scrubbing.
//!
//! This crate opens PDFs (via lopdf) and raster images (via image), maps page
//! geometry, and removes content under redactions: glyphs are cut out of
//! content streams, image pixels are overwritten, and intersecting
//! annotations are dropped. It depends on blackout-core for shared types.

pub mod backend;
pub mod content_state;
pub mod error;
pub mod font_metrics;
mod image_data;
pub mod lopdf_backend;
pub mod page_geometry;
pub mod raster_backend;
mod scrub;
mod standard_widths;
pub mod tokenizer;

pub use backend::{DocumentBackend, PageHandle, SaveOptions, ScrubReport};
pub use blackout_core;
pub use error::BackendError;
pub use lopdf_backend::{LopdfBackend, LopdfDocument};
pub use page_geometry::{PageBox, PageGeometry};
pub use raster_backend::{RasterBackend, RasterDocument};
