//! Redaction plans: `--rect` specs and JSON plan files.

use blackout::blackout_core::{Document, OriginMode};
use blackout::{Rect, RedactOptions, Size, Surface, mapper};
use serde::Deserialize;

/// A plan file.
///
/// ```json
/// {"options": {"remove_encryption": false},
///  "redactions": [{"page": 1, "x": 72, "y": 60, "width": 120, "height": 18}]}
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RedactionPlan {
    #[serde(default)]
    pub options: Option<RedactOptions>,
    #[serde(default)]
    pub redactions: Vec<PlannedRect>,
}

/// One rectangle on a 1-based page.
///
/// Without surface sizes the rectangle is in top-left document units (PDF
/// points or image pixels). With them it is in pixels of a rendering surface
/// of that size, as a front end would record it.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PlannedRect {
    pub page: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub surface_width: Option<u32>,
    #[serde(default)]
    pub surface_height: Option<u32>,
}

impl PlannedRect {
    fn validate(self) -> Result<Self, String> {
        let values = [self.x, self.y, self.width, self.height];
        if values.iter().any(|v| !v.is_finite()) {
            return Err("coordinates must be finite numbers".into());
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err("width and height must be positive".into());
        }
        if self.page == 0 {
            return Err("pages are numbered from 1".into());
        }
        Ok(self)
    }

    /// The rectangle on a rendering surface, with that surface's size.
    ///
    /// Document-unit rectangles go onto a surface the size of the page,
    /// rounded to whole pixels.
    pub fn to_surface(&self, page: Size<Document>) -> (Rect<Surface>, u32, u32) {
        if let (Some(w), Some(h)) = (self.surface_width, self.surface_height) {
            return (Rect::new(self.x, self.y, self.width, self.height), w, h);
        }
        let w = page.width.round().max(1.0) as u32;
        let h = page.height.round().max(1.0) as u32;
        let surface = Size::new(f64::from(w), f64::from(h));
        let rect = mapper::document_to_surface(
            Rect::new(self.x, self.y, self.width, self.height),
            page,
            surface,
            OriginMode::TopLeft,
        );
        (rect, w, h)
    }
}

/// Parse `PAGE:X,Y,W,H`.
pub fn parse_rect(spec: &str) -> Result<PlannedRect, String> {
    let bad = || format!("invalid rectangle '{spec}': expected PAGE:X,Y,W,H");
    let (page, coords) = spec.split_once(':').ok_or_else(bad)?;
    let page: usize = page.trim().parse().map_err(|_| bad())?;
    let nums: Vec<f64> = coords
        .split(',')
        .map(|n| n.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| bad())?;
    let [x, y, width, height] = nums[..] else {
        return Err(bad());
    };
    PlannedRect {
        page,
        x,
        y,
        width,
        height,
        surface_width: None,
        surface_height: None,
    }
    .validate()
    .map_err(|e| format!("invalid rectangle '{spec}': {e}"))
}

/// Parse a JSON plan.
pub fn parse_plan(json: &str) -> Result<RedactionPlan, String> {
    let plan: RedactionPlan =
        serde_json::from_str(json).map_err(|e| format!("invalid plan: {e}"))?;
    for r in &plan.redactions {
        r.validate().map_err(|e| format!("invalid plan: {e}"))?;
        if r.surface_width.is_some() != r.surface_height.is_some() {
            return Err("invalid plan: give both surface_width and surface_height or neither".into());
        }
    }
    Ok(plan)
}
