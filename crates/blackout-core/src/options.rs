//! Tunables for rendering and export.

/// What happens to a PDF image XObject that lies under a redaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ImageScrubPolicy {
    /// Overwrite the covered pixels in a page-private copy of the image.
    /// Images that cannot be decoded are removed instead.
    #[default]
    Pixels,
    /// Remove every intersecting image from the page.
    Remove,
}

/// Options shared by the renderer, the overlay, and the applier.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RedactOptions {
    /// Surface pixels per document unit when rasterizing a page.
    pub render_scale: f64,
    /// JPEG quality (1-100) for re-encoded images.
    pub jpeg_quality: u8,
    /// RGB colour of burned regions.
    pub fill_color: [u8; 3],
    /// Opacity of the pending-redaction overlay drawn on renders.
    pub overlay_alpha: f32,
    /// Strip encryption from exported PDFs.
    pub remove_encryption: bool,
    pub image_policy: ImageScrubPolicy,
}

impl Default for RedactOptions {
    fn default() -> Self {
        Self {
            render_scale: 1.5,
            jpeg_quality: 92,
            fill_color: [0, 0, 0],
            overlay_alpha: 0.7,
            remove_encryption: true,
            image_policy: ImageScrubPolicy::Pixels,
        }
    }
}

impl RedactOptions {
    /// Fill colour as PDF `rg` operands in `0.0..=1.0`.
    pub fn fill_rgb(&self) -> [f32; 3] {
        self.fill_color.map(|c| f32::from(c) / 255.0)
    }
}
