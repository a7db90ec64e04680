//! Render collaborator and the pending-redaction overlay.
//!
//! A [`PageRenderer`] rasterizes one page into a [`RenderSurface`] and
//! reports the surface and document sizes it used. The overlay is composited
//! onto a copy of the rendered surface; it is never written into the cached
//! render.

use blackout_core::{DocumentKind, RedactError, Redaction, RedactOptions, Size, Surface};
use blackout_parse::PageHandle;
use image::{Rgba, RgbaImage};

use crate::loader::LoadedDocument;

/// Pixel buffer a page is rendered into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderSurface {
    pixels: RgbaImage,
}

impl RenderSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn set_pixels(&mut self, pixels: RgbaImage) {
        self.pixels = pixels;
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> Size<Surface> {
        Size::new(f64::from(self.width()), f64::from(self.height()))
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }
}

/// What a render produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderMetrics {
    pub surface_width: u32,
    pub surface_height: u32,
    pub doc_width: f64,
    pub doc_height: f64,
}

impl RenderMetrics {
    pub fn surface_size(&self) -> Size<Surface> {
        Size::new(f64::from(self.surface_width), f64::from(self.surface_height))
    }
}

/// Rasterizes pages of a loaded document.
pub trait PageRenderer {
    /// Render `page` into `target`, replacing its contents.
    ///
    /// # Errors
    ///
    /// [`RedactError::RenderFailure`] for the page; the session stays usable.
    fn render_page(
        &mut self,
        document: &LoadedDocument,
        page: &PageHandle,
        target: &mut RenderSurface,
    ) -> Result<RenderMetrics, RedactError>;
}

/// Renderer used when no rasterizer is plugged in.
///
/// Images are copied at one surface pixel per image pixel. PDF pages become
/// a blank white sheet of the page's displayed size times `pdf_scale`, which
/// is enough to place redactions against; glyph rasterization belongs to an
/// external renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultRenderer {
    pub pdf_scale: f64,
}

impl Default for DefaultRenderer {
    fn default() -> Self {
        Self {
            pdf_scale: RedactOptions::default().render_scale,
        }
    }
}

impl DefaultRenderer {
    pub fn new(options: &RedactOptions) -> Self {
        Self {
            pdf_scale: options.render_scale,
        }
    }
}

impl PageRenderer for DefaultRenderer {
    fn render_page(
        &mut self,
        document: &LoadedDocument,
        page: &PageHandle,
        target: &mut RenderSurface,
    ) -> Result<RenderMetrics, RedactError> {
        let failure = |reason: &str| RedactError::RenderFailure {
            page: page.number(),
            reason: reason.to_string(),
        };
        let doc = page.doc_size();
        let pixels = match document.kind() {
            DocumentKind::Image(_) => document
                .raster()
                .cloned()
                .ok_or_else(|| failure("image pixels are not available"))?,
            DocumentKind::Pdf => {
                let scale = if self.pdf_scale > 0.0 && self.pdf_scale.is_finite() {
                    self.pdf_scale
                } else {
                    1.0
                };
                let width = (doc.width * scale).floor();
                let height = (doc.height * scale).floor();
                let limit = f64::from(u16::MAX);
                if !(1.0..=limit).contains(&width) || !(1.0..=limit).contains(&height) {
                    return Err(failure("page size is out of range"));
                }
                RgbaImage::from_pixel(width as u32, height as u32, Rgba([255, 255, 255, 255]))
            }
        };
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(failure("empty surface"));
        }
        target.set_pixels(pixels);
        Ok(RenderMetrics {
            surface_width: target.width(),
            surface_height: target.height(),
            doc_width: doc.width,
            doc_height: doc.height,
        })
    }
}

/// Blend pending redactions onto `surface`.
///
/// Each redaction is scaled from the surface size it was drawn on to the
/// size of `surface`, so a render at another scale still lines up.
pub fn draw_overlay<'a>(
    surface: &mut RenderSurface,
    redactions: impl IntoIterator<Item = &'a Redaction>,
    options: &RedactOptions,
) {
    let alpha = options.overlay_alpha.clamp(0.0, 1.0);
    let fill = options.fill_color.map(f32::from);
    let (width, height) = (surface.width(), surface.height());
    for redaction in redactions {
        let drawn = redaction.surface_size();
        let sx = if drawn.width > 0.0 {
            f64::from(width) / drawn.width
        } else {
            1.0
        };
        let sy = if drawn.height > 0.0 {
            f64::from(height) / drawn.height
        } else {
            1.0
        };
        let r = redaction.rect();
        let x0 = (r.x() * sx).floor().max(0.0) as u32;
        let y0 = (r.y() * sy).floor().max(0.0) as u32;
        let x1 = ((r.right() * sx).ceil().max(0.0) as u32).min(width);
        let y1 = ((r.bottom() * sy).ceil().max(0.0) as u32).min(height);
        for py in y0..y1 {
            for px in x0..x1 {
                let p = surface.pixels.get_pixel_mut(px, py);
                for c in 0..3 {
                    let under = f32::from(p.0[c]);
                    p.0[c] = (fill[c] * alpha + under * (1.0 - alpha)).round() as u8;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader;
    use blackout_core::{ImageFormat, Rect, RedactionStore, SourceFile};

    fn white(width: u32, height: u32) -> RenderSurface {
        let mut s = RenderSurface::new();
        s.set_pixels(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])));
        s
    }

    #[test]
    fn overlay_blends_at_seventy_percent() {
        let mut store = RedactionStore::new();
        store.add(0, Rect::new(0.0, 0.0, 10.0, 10.0), 20, 20);
        let mut surface = white(20, 20);
        draw_overlay(&mut surface, store.for_page(0), &RedactOptions::default());
        let covered = surface.pixels().get_pixel(5, 5).0[0];
        assert!((76..=77).contains(&covered), "got {covered}");
        assert_eq!(surface.pixels().get_pixel(15, 15).0[0], 255);
    }

    #[test]
    fn overlay_rescales_to_current_surface() {
        let mut store = RedactionStore::new();
        store.add(0, Rect::new(10.0, 10.0, 10.0, 10.0), 40, 40);
        let mut surface = white(20, 20);
        draw_overlay(&mut surface, store.for_page(0), &RedactOptions::default());
        assert_ne!(surface.pixels().get_pixel(5, 5).0[0], 255);
        assert_eq!(surface.pixels().get_pixel(4, 4).0[0], 255);
        assert_eq!(surface.pixels().get_pixel(10, 10).0[0], 255);
    }

    #[test]
    fn image_renders_at_pixel_scale() {
        let img = RgbaImage::from_pixel(24, 16, Rgba([1, 2, 3, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let source = SourceFile::new("a.png", png);
        let doc = loader::decode(&source, DocumentKind::Image(ImageFormat::Png), None).unwrap();
        let mut surface = RenderSurface::new();
        let metrics = DefaultRenderer::default()
            .render_page(&doc, doc.page(0).unwrap(), &mut surface)
            .unwrap();
        assert_eq!((metrics.surface_width, metrics.surface_height), (24, 16));
        assert_eq!((metrics.doc_width, metrics.doc_height), (24.0, 16.0));
        assert_eq!(surface.pixels().get_pixel(0, 0), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn pdf_page_renders_blank_at_scale() {
        let mut renderer = DefaultRenderer::default();
        assert_eq!(renderer.pdf_scale, 1.5);
        let doc = loader::decode(
            &SourceFile::new("a.pdf", crate::test_fixtures::letter_pdf("Hello")),
            DocumentKind::Pdf,
            None,
        )
        .unwrap();
        let mut surface = RenderSurface::new();
        let metrics = renderer
            .render_page(&doc, doc.page(0).unwrap(), &mut surface)
            .unwrap();
        assert_eq!((metrics.surface_width, metrics.surface_height), (918, 1188));
        assert_eq!(surface.size().width, 918.0);
    }

    #[test]
    fn fractional_page_size_truncates_to_whole_pixels() {
        let doc = loader::decode(
            &SourceFile::new("a4.pdf", crate::test_fixtures::sized_pdf("Hi", 595.28, 841.89)),
            DocumentKind::Pdf,
            None,
        )
        .unwrap();
        let mut surface = RenderSurface::new();
        let metrics = DefaultRenderer::default()
            .render_page(&doc, doc.page(0).unwrap(), &mut surface)
            .unwrap();
        assert_eq!((metrics.surface_width, metrics.surface_height), (892, 1262));
    }
}
