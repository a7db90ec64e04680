//! Conversions between display, surface, and document frames.
//!
//! Every function here is pure and total: out-of-range input maps to
//! out-of-range output instead of failing, and a zero or non-finite divisor
//! falls back to a scale of 1.

use crate::geometry::{Display, Document, Point, Rect, Size, Surface};

/// Vertical orientation of the document frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OriginMode {
    /// y grows upward from the bottom edge (PDF user space).
    BottomLeft,
    /// y grows downward from the top edge (image pixel grids).
    TopLeft,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 && den.is_finite() && num.is_finite() {
        num / den
    } else {
        1.0
    }
}

/// Scale a display-space rectangle onto the rendering surface.
pub fn display_to_surface(
    rect: Rect<Display>,
    display: Size<Display>,
    surface: Size<Surface>,
) -> Rect<Surface> {
    let sx = ratio(surface.width, display.width);
    let sy = ratio(surface.height, display.height);
    Rect::new(
        rect.x() * sx,
        rect.y() * sy,
        rect.width() * sx,
        rect.height() * sy,
    )
}

/// Scale a display-space point onto the rendering surface.
pub fn display_point_to_surface(
    point: Point<Display>,
    display: Size<Display>,
    surface: Size<Surface>,
) -> Point<Surface> {
    Point::new(
        point.x * ratio(surface.width, display.width),
        point.y * ratio(surface.height, display.height),
    )
}

/// Inverse of [`display_to_surface`].
pub fn surface_to_display(
    rect: Rect<Surface>,
    surface: Size<Surface>,
    display: Size<Display>,
) -> Rect<Display> {
    let sx = ratio(display.width, surface.width);
    let sy = ratio(display.height, surface.height);
    Rect::new(
        rect.x() * sx,
        rect.y() * sy,
        rect.width() * sx,
        rect.height() * sy,
    )
}

/// Map a surface rectangle into the document frame.
///
/// With [`OriginMode::BottomLeft`] the result's `y` is the distance of the
/// rectangle's lower edge from the bottom of the page:
/// `doc_y = doc_h - y * y_scale - h * y_scale`.
pub fn surface_to_document(
    rect: Rect<Surface>,
    surface: Size<Surface>,
    doc: Size<Document>,
    origin: OriginMode,
) -> Rect<Document> {
    let x_scale = ratio(doc.width, surface.width);
    let y_scale = ratio(doc.height, surface.height);
    let x = rect.x() * x_scale;
    let width = rect.width() * x_scale;
    let height = rect.height() * y_scale;
    let y = match origin {
        OriginMode::TopLeft => rect.y() * y_scale,
        OriginMode::BottomLeft => doc.height - rect.y() * y_scale - height,
    };
    Rect::new(x, y, width, height)
}

/// Inverse of [`surface_to_document`].
pub fn document_to_surface(
    rect: Rect<Document>,
    doc: Size<Document>,
    surface: Size<Surface>,
    origin: OriginMode,
) -> Rect<Surface> {
    let x_scale = ratio(surface.width, doc.width);
    let y_scale = ratio(surface.height, doc.height);
    let top = match origin {
        OriginMode::TopLeft => rect.y(),
        OriginMode::BottomLeft => doc.height - rect.y() - rect.height(),
    };
    Rect::new(
        rect.x() * x_scale,
        top * y_scale,
        rect.width() * x_scale,
        rect.height() * y_scale,
    )
}
