//! Glyph metrics for locating text on a page.
//!
//! Reads `/Widths` + `/FirstChar` for simple fonts and `/DW` + `/W` from the
//! descendant of Type0 fonts, plus ascent and descent from the font
//! descriptor. The scrubber needs only advance widths and a vertical extent,
//! so no glyph outlines or encodings are decoded.

use std::collections::HashMap;

use crate::standard_widths;

const DEFAULT_ASCENT: f64 = 750.0;
const DEFAULT_DESCENT: f64 = -250.0;
const DEFAULT_WIDTH: f64 = 600.0;
const DEFAULT_CID_WIDTH: f64 = 1000.0;

/// Advance widths and vertical extent of one font, in glyph space units
/// (1/1000 of text space).
#[derive(Debug, Clone)]
pub struct FontMetrics {
    /// Type0 fonts are read as two-byte codes (Identity encodings).
    two_byte: bool,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: HashMap<u32, f64>,
    missing_width: f64,
    ascent: f64,
    descent: f64,
    /// Glyph-space to text-space factor relative to 1/1000 (Type3 fonts).
    unit_scale: f64,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            two_byte: false,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            missing_width: DEFAULT_WIDTH,
            ascent: DEFAULT_ASCENT,
            descent: DEFAULT_DESCENT,
            unit_scale: 1.0,
        }
    }
}

impl FontMetrics {
    /// Metrics from a resolved font dictionary.
    pub fn from_font_dict(doc: &lopdf::Document, font: &lopdf::Dictionary) -> Self {
        let subtype = font
            .get(b"Subtype")
            .and_then(lopdf::Object::as_name)
            .unwrap_or(b"");
        if subtype == b"Type0" {
            return Self::composite(doc, font);
        }

        let mut metrics = Self {
            first_char: number(doc, font.get(b"FirstChar").ok()).map_or(0, |v| v as u32),
            widths: number_array(doc, font.get(b"Widths").ok()),
            ..Self::default()
        };

        if metrics.widths.is_empty() {
            let base = font
                .get(b"BaseFont")
                .and_then(lopdf::Object::as_name)
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .unwrap_or_default();
            if let Some(table) = standard_widths::lookup(&base) {
                metrics.first_char = 0;
                metrics.widths = table.iter().map(|&w| f64::from(w)).collect();
            }
        }

        if subtype == b"Type3" {
            let matrix = number_array(doc, font.get(b"FontMatrix").ok());
            if let Some(&a) = matrix.first() {
                metrics.unit_scale = a * 1000.0;
            }
        }

        if let Some(desc) = resolve_dict(doc, font.get(b"FontDescriptor").ok()) {
            metrics.apply_descriptor(doc, desc);
        }
        metrics
    }

    fn composite(doc: &lopdf::Document, font: &lopdf::Dictionary) -> Self {
        let mut metrics = Self {
            two_byte: true,
            missing_width: DEFAULT_CID_WIDTH,
            ..Self::default()
        };

        let descendant = font
            .get(b"DescendantFonts")
            .ok()
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .and_then(|arr| arr.first())
            .and_then(|o| resolve_dict(doc, Some(o)));
        let Some(cid_font) = descendant else {
            return metrics;
        };

        if let Some(dw) = number(doc, cid_font.get(b"DW").ok()) {
            metrics.missing_width = dw;
        }
        if let Ok(w) = cid_font.get(b"W") {
            if let Ok(items) = resolve(doc, w).as_array() {
                metrics.cid_widths = parse_cid_widths(doc, items);
            }
        }
        if let Some(desc) = resolve_dict(doc, cid_font.get(b"FontDescriptor").ok()) {
            metrics.apply_descriptor(doc, desc);
            // Composite fonts default to /DW, not /MissingWidth.
            if let Some(dw) = number(doc, cid_font.get(b"DW").ok()) {
                metrics.missing_width = dw;
            } else {
                metrics.missing_width = DEFAULT_CID_WIDTH;
            }
        }
        metrics
    }

    fn apply_descriptor(&mut self, doc: &lopdf::Document, desc: &lopdf::Dictionary) {
        if let Some(ascent) = number(doc, desc.get(b"Ascent").ok()) {
            if ascent > 0.0 {
                self.ascent = ascent;
            }
        }
        if let Some(descent) = number(doc, desc.get(b"Descent").ok()) {
            if descent < 0.0 {
                self.descent = descent;
            }
        }
        if let Some(mw) = number(doc, desc.get(b"MissingWidth").ok()) {
            if mw > 0.0 {
                self.missing_width = mw;
            }
        }
    }

    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    /// Advance width of a character code, in glyph space units.
    pub fn width(&self, code: u32) -> f64 {
        let raw = if self.two_byte {
            self.cid_widths.get(&code).copied()
        } else {
            code.checked_sub(self.first_char)
                .and_then(|i| self.widths.get(i as usize).copied())
        };
        raw.unwrap_or(self.missing_width) * self.unit_scale
    }

    pub fn ascent(&self) -> f64 {
        self.ascent
    }

    pub fn descent(&self) -> f64 {
        self.descent
    }

    /// Split a shown string into `(code, byte_len)` pairs.
    pub fn codes(&self, bytes: &[u8]) -> Vec<(u32, usize)> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|c| {
                    let code = c.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
                    (code, c.len())
                })
                .collect()
        } else {
            bytes.iter().map(|&b| (u32::from(b), 1)).collect()
        }
    }

    /// Word spacing applies only to the single-byte code 32.
    pub fn is_word_space(&self, code: u32, byte_len: usize) -> bool {
        code == 32 && byte_len == 1
    }
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` and `c_first c_last w` runs.
fn parse_cid_widths(doc: &lopdf::Document, items: &[lopdf::Object]) -> HashMap<u32, f64> {
    let mut out = HashMap::new();
    let mut i = 0;
    while i < items.len() {
        let Some(first) = number(doc, Some(&items[i])) else {
            break;
        };
        let first = first as u32;
        match items.get(i + 1).map(|o| resolve(doc, o)) {
            Some(lopdf::Object::Array(ws)) => {
                for (offset, w) in ws.iter().enumerate() {
                    if let Some(w) = number(doc, Some(w)) {
                        out.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (
                    number(doc, Some(last)),
                    number(doc, items.get(i + 2)),
                ) else {
                    break;
                };
                let last = (last as u32).min(first.saturating_add(0xFFFF));
                for cid in first..=last {
                    out.insert(cid, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    out
}

pub(crate) fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a lopdf::Object) -> &'a lopdf::Object {
    match obj {
        lopdf::Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub(crate) fn resolve_dict<'a>(
    doc: &'a lopdf::Document,
    obj: Option<&'a lopdf::Object>,
) -> Option<&'a lopdf::Dictionary> {
    obj.map(|o| resolve(doc, o)).and_then(|o| o.as_dict().ok())
}

pub(crate) fn number(doc: &lopdf::Document, obj: Option<&lopdf::Object>) -> Option<f64> {
    match obj.map(|o| resolve(doc, o))? {
        lopdf::Object::Integer(i) => Some(*i as f64),
        lopdf::Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

fn number_array(doc: &lopdf::Document, obj: Option<&lopdf::Object>) -> Vec<f64> {
    obj.map(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .map(|arr| {
            arr.iter()
                .map(|o| number(doc, Some(o)).unwrap_or(0.0))
                .collect()
        })
        .unwrap_or_default()
}
