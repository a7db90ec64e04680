//! Raster image backend.
//!
//! PNG, JPEG, and GIF files open as a single page whose document units are
//! pixels with a top-left origin. Redaction paints the covered pixels
//! directly; PNG sources are written back as PNG and everything else as JPEG.
//! The source format is the one the file name declares when the caller
//! passes it in [`SaveOptions::declared_format`].

use std::io::Cursor;

use blackout_core::{Document, Password, Rect, RedactOptions};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use crate::backend::{DocumentBackend, PageHandle, SaveOptions};
use crate::error::BackendError;
use crate::page_geometry::PageGeometry;
use crate::scrub::ScrubReport;

/// A decoded raster image.
pub struct RasterDocument {
    pixels: RgbaImage,
    source_format: ImageFormat,
}

impl RasterDocument {
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Format the image will be written in.
    pub fn output_format(&self) -> ImageFormat {
        match self.source_format {
            ImageFormat::Png => ImageFormat::Png,
            _ => ImageFormat::Jpeg,
        }
    }
}

impl std::fmt::Debug for RasterDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterDocument")
            .field("width", &self.pixels.width())
            .field("height", &self.pixels.height())
            .field("source_format", &self.source_format)
            .finish()
    }
}

/// The image-crate-backed raster backend.
pub struct RasterBackend;

fn encoder_format(format: blackout_core::ImageFormat) -> ImageFormat {
    match format {
        blackout_core::ImageFormat::Png => ImageFormat::Png,
        blackout_core::ImageFormat::Jpeg => ImageFormat::Jpeg,
        blackout_core::ImageFormat::Gif => ImageFormat::Gif,
    }
}

/// Paint the pixels covered by `rect` (top-left origin, pixel units).
/// Returns whether any pixel was inside the image.
pub(crate) fn fill_pixels(img: &mut RgbaImage, rect: &Rect<Document>, rgb: [u8; 3]) -> bool {
    let x0 = rect.x().floor().max(0.0) as u32;
    let y0 = rect.y().floor().max(0.0) as u32;
    let x1 = (rect.right().ceil().max(0.0) as u32).min(img.width());
    let y1 = (rect.bottom().ceil().max(0.0) as u32).min(img.height());
    if x0 >= x1 || y0 >= y1 {
        return false;
    }
    let colour = Rgba([rgb[0], rgb[1], rgb[2], 255]);
    for py in y0..y1 {
        for px in x0..x1 {
            img.put_pixel(px, py, colour);
        }
    }
    true
}

impl DocumentBackend for RasterBackend {
    type Document = RasterDocument;

    fn probe_encrypted(bytes: &[u8]) -> Result<bool, BackendError> {
        image::guess_format(bytes)?;
        Ok(false)
    }

    fn open(bytes: &[u8], _password: Option<&Password>) -> Result<Self::Document, BackendError> {
        let source_format = image::guess_format(bytes)?;
        let pixels = image::load_from_memory_with_format(bytes, source_format)?.to_rgba8();
        debug!(
            width = pixels.width(),
            height = pixels.height(),
            format = ?source_format,
            "opened image"
        );
        Ok(RasterDocument {
            pixels,
            source_format,
        })
    }

    fn page_count(_doc: &Self::Document) -> usize {
        1
    }

    fn is_encrypted(_doc: &Self::Document) -> bool {
        false
    }

    fn page(doc: &Self::Document, index: usize) -> Result<PageHandle, BackendError> {
        if index != 0 {
            return Err(BackendError::Parse(format!(
                "page index {index} out of range (0..1)"
            )));
        }
        Ok(PageHandle {
            index,
            geometry: PageGeometry::unrotated(
                f64::from(doc.pixels.width()),
                f64::from(doc.pixels.height()),
            ),
        })
    }

    fn redact_page(
        doc: &mut Self::Document,
        page: &PageHandle,
        regions: &[Rect<Document>],
        options: &RedactOptions,
    ) -> Result<ScrubReport, BackendError> {
        if page.index != 0 {
            return Err(BackendError::Parse(format!(
                "page index {} out of range (0..1)",
                page.index
            )));
        }
        let mut report = ScrubReport::default();
        let mut touched = false;
        for region in regions {
            touched |= fill_pixels(&mut doc.pixels, region, options.fill_color);
        }
        if touched {
            report.images_rewritten = 1;
        }
        Ok(report)
    }

    fn save(doc: Self::Document, options: &SaveOptions) -> Result<Vec<u8>, BackendError> {
        let format = match options.declared_format {
            Some(declared) => encoder_format(declared.output_format()),
            None => doc.output_format(),
        };
        if let Some(declared) = options.declared_format {
            if encoder_format(declared) != doc.source_format {
                debug!(
                    declared = ?declared,
                    sniffed = ?doc.source_format,
                    "file name and image data disagree; following the file name"
                );
            }
        }
        let mut buf = Vec::new();
        match format {
            ImageFormat::Png => {
                DynamicImage::ImageRgba8(doc.pixels)
                    .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
            }
            _ => {
                let rgb = DynamicImage::ImageRgba8(doc.pixels).to_rgb8();
                JpegEncoder::new_with_quality(&mut buf, options.jpeg_quality.clamp(1, 100))
                    .encode_image(&rgb)?;
            }
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn gif(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Gif)
            .unwrap();
        buf
    }

    #[test]
    fn image_is_one_unrotated_page() {
        let doc = RasterBackend::open(&png(40, 20), None).unwrap();
        assert_eq!(RasterBackend::page_count(&doc), 1);
        assert!(!RasterBackend::is_encrypted(&doc));
        let page = RasterBackend::page(&doc, 0).unwrap();
        assert_eq!(page.doc_size().width, 40.0);
        assert_eq!(page.doc_size().height, 20.0);
        assert!(RasterBackend::page(&doc, 1).is_err());
    }

    #[test]
    fn never_needs_a_password() {
        assert!(!RasterBackend::probe_encrypted(&png(2, 2)).unwrap());
        assert!(RasterBackend::probe_encrypted(b"plain text").is_err());
    }

    #[test]
    fn fill_is_clipped_to_image() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        assert!(fill_pixels(&mut img, &Rect::new(2.5, -3.0, 10.0, 5.0), [0, 0, 0]));
        for (x, y, p) in img.enumerate_pixels() {
            let covered = x >= 2 && y < 2;
            assert_eq!(p.0[0] == 0, covered, "pixel ({x}, {y})");
        }
        assert!(!fill_pixels(&mut img, &Rect::new(10.0, 10.0, 5.0, 5.0), [0, 0, 0]));
    }

    #[test]
    fn png_round_trips_as_png() {
        let mut doc = RasterBackend::open(&png(10, 10), None).unwrap();
        let page = RasterBackend::page(&doc, 0).unwrap();
        let report = RasterBackend::redact_page(
            &mut doc,
            &page,
            &[Rect::new(0.0, 0.0, 5.0, 5.0)],
            &RedactOptions::default(),
        )
        .unwrap();
        assert_eq!(report.images_rewritten, 1);
        let out = RasterBackend::save(doc, &SaveOptions::default()).unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);
        let decoded = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
        assert_eq!(decoded.get_pixel(8, 8), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn gif_is_written_as_jpeg() {
        let doc = RasterBackend::open(&gif(16, 16), None).unwrap();
        assert_eq!(doc.output_format(), ImageFormat::Jpeg);
        let out = RasterBackend::save(doc, &SaveOptions::default()).unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn declared_format_decides_the_encoding() {
        let source = RgbImage::from_pixel(8, 8, Rgb([250, 250, 250]));
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 92)
            .encode_image(&source)
            .unwrap();

        let doc = RasterBackend::open(&jpeg, None).unwrap();
        let options = SaveOptions {
            declared_format: Some(blackout_core::ImageFormat::Png),
            ..SaveOptions::default()
        };
        let out = RasterBackend::save(doc, &options).unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Png);

        let doc = RasterBackend::open(&png(8, 8), None).unwrap();
        let options = SaveOptions {
            declared_format: Some(blackout_core::ImageFormat::Gif),
            ..SaveOptions::default()
        };
        let out = RasterBackend::save(doc, &options).unwrap();
        assert_eq!(image::guess_format(&out).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn jpeg_fill_survives_lossy_encoding() {
        let source = RgbImage::from_pixel(32, 32, Rgb([250, 250, 250]));
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 92)
            .encode_image(&source)
            .unwrap();
        let mut doc = RasterBackend::open(&jpeg, None).unwrap();
        let page = RasterBackend::page(&doc, 0).unwrap();
        RasterBackend::redact_page(
            &mut doc,
            &page,
            &[Rect::new(0.0, 0.0, 16.0, 32.0)],
            &RedactOptions::default(),
        )
        .unwrap();
        let out = RasterBackend::save(doc, &SaveOptions::default()).unwrap();
        let decoded = image::load_from_memory(&out).unwrap().to_rgb8();
        assert!(decoded.get_pixel(4, 16).0.iter().all(|&c| c < 24));
        assert!(decoded.get_pixel(28, 16).0.iter().all(|&c| c > 230));
    }
}
