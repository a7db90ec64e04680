//! Page boxes and rotation.
//!
//! A page is shown through its visible box (the CropBox clipped to the
//! MediaBox, or the MediaBox alone) turned clockwise by `/Rotate`. Redactions
//! are drawn on that visible page, so before burning they have to be carried
//! back into unrotated user space.

use blackout_core::mapper::{self, OriginMode};
use blackout_core::{Document, Rect, Size, Surface};

/// A PDF rectangle `[x0 y0 x1 y1]` in user space, normalised so that
/// `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PageBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    fn intersect(&self, other: &PageBox) -> Option<PageBox> {
        let b = PageBox {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        };
        (b.width() > 0.0 && b.height() > 0.0).then_some(b)
    }
}

/// Visible box plus rotation of one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    visible: PageBox,
    rotation: i32,
}

impl PageGeometry {
    /// `rotation` is normalised to 0, 90, 180 or 270; other values count as 0.
    pub fn new(media_box: PageBox, crop_box: Option<PageBox>, rotation: i32) -> Self {
        let visible = crop_box
            .and_then(|c| c.intersect(&media_box))
            .unwrap_or(media_box);
        let rotation = match rotation.rem_euclid(360) {
            r @ (90 | 180 | 270) => r,
            _ => 0,
        };
        Self { visible, rotation }
    }

    /// An unrotated page of the given size with its origin at zero. Used for
    /// raster images.
    pub fn unrotated(width: f64, height: f64) -> Self {
        Self::new(PageBox::new(0.0, 0.0, width, height), None, 0)
    }

    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    pub fn visible_box(&self) -> PageBox {
        self.visible
    }

    /// Size of the page as displayed (after rotation).
    pub fn visible_size(&self) -> Size<Document> {
        let (w, h) = (self.visible.width(), self.visible.height());
        match self.rotation {
            90 | 270 => Size::new(h, w),
            _ => Size::new(w, h),
        }
    }

    /// Carry a rectangle on the displayed page (top-left origin, rotated)
    /// into user space. The result's `y` is its lower edge.
    pub fn visible_to_native(&self, rect: Rect<Document>) -> Rect<Document> {
        let (w, h) = (self.visible.width(), self.visible.height());
        let map = |dx: f64, dy: f64| -> (f64, f64) {
            match self.rotation {
                90 => (dy, dx),
                180 => (w - dx, dy),
                270 => (w - dy, h - dx),
                _ => (dx, h - dy),
            }
        };
        let (ax, ay) = map(rect.x(), rect.y());
        let (bx, by) = map(rect.right(), rect.bottom());
        Rect::new(
            ax.min(bx) + self.visible.x0,
            ay.min(by) + self.visible.y0,
            (ax - bx).abs(),
            (ay - by).abs(),
        )
    }

    /// Inverse of [`visible_to_native`](Self::visible_to_native).
    pub fn native_to_visible(&self, rect: Rect<Document>) -> Rect<Document> {
        let (w, h) = (self.visible.width(), self.visible.height());
        let map = |x: f64, y: f64| -> (f64, f64) {
            let (x, y) = (x - self.visible.x0, y - self.visible.y0);
            match self.rotation {
                90 => (y, x),
                180 => (w - x, y),
                270 => (h - y, w - x),
                _ => (x, h - y),
            }
        };
        let (ax, ay) = map(rect.x(), rect.y());
        let (bx, by) = map(rect.right(), rect.bottom());
        Rect::new(ax.min(bx), ay.min(by), (ax - bx).abs(), (ay - by).abs())
    }

    /// Map a redaction drawn on a rendering surface of this page into the
    /// coordinates the backend burns in.
    ///
    /// Top-left documents (images) use the plain surface-to-document
    /// mapping. Unrotated PDF pages use the bottom-left flip shifted by the
    /// visible box origin; rotated pages go through the displayed page.
    pub fn surface_to_native(
        &self,
        rect: Rect<Surface>,
        surface: Size<Surface>,
        origin: OriginMode,
    ) -> Rect<Document> {
        let doc = self.visible_size();
        match origin {
            OriginMode::TopLeft => mapper::surface_to_document(rect, surface, doc, origin),
            OriginMode::BottomLeft if self.rotation == 0 => {
                mapper::surface_to_document(rect, surface, doc, origin)
                    .translate(self.visible.x0, self.visible.y0)
            }
            OriginMode::BottomLeft => self.visible_to_native(mapper::surface_to_document(
                rect,
                surface,
                doc,
                OriginMode::TopLeft,
            )),
        }
    }
}
