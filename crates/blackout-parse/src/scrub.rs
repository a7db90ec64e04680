//! Removal of page content that lies under redactions.
//!
//! The page's content stream is tokenized and replayed with a
//! [`ContentState`]. Text-showing operators are split glyph by glyph; glyphs
//! whose box overlaps a redaction are replaced with an equivalent `TJ`
//! displacement so the rest of the line stays put. Images under a redaction
//! are rewritten with the covered pixels filled, or dropped when they cannot
//! be decoded. Intersecting inline images and form XObjects are dropped, as
//! are intersecting annotations. The rewritten stream is wrapped in `q ... Q`
//! and followed by opaque fills over every region.

use std::collections::{HashMap, HashSet};

use blackout_core::{Ctm, Document, ImageScrubPolicy, Rect, RedactOptions};
use lopdf::{Object, ObjectId, Stream, dictionary};
use tracing::{debug, warn};

use crate::content_state::ContentState;
use crate::error::BackendError;
use crate::font_metrics::{FontMetrics, number, resolve, resolve_dict};
use crate::lopdf_backend::resolve_inherited;
use crate::tokenizer::{Operand, Operator, serialize, tokenize};

/// What a page scrub removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrubReport {
    pub glyphs_removed: usize,
    pub images_rewritten: usize,
    pub images_removed: usize,
    pub inline_images_removed: usize,
    pub forms_removed: usize,
    pub annotations_removed: usize,
}

impl ScrubReport {
    pub fn merge(&mut self, other: ScrubReport) {
        self.glyphs_removed += other.glyphs_removed;
        self.images_rewritten += other.images_rewritten;
        self.images_removed += other.images_removed;
        self.inline_images_removed += other.inline_images_removed;
        self.forms_removed += other.forms_removed;
        self.annotations_removed += other.annotations_removed;
    }
}

/// A redaction region in user space as `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy)]
struct Region([f64; 4]);

impl Region {
    fn from_rect(rect: &Rect<Document>) -> Self {
        Region([rect.x(), rect.y(), rect.right(), rect.bottom()])
    }

    fn overlaps(&self, b: &[f64; 4]) -> bool {
        let a = &self.0;
        a[0] < b[2] && b[0] < a[2] && a[1] < b[3] && b[1] < a[3]
    }
}

fn any_overlap(regions: &[Region], bounds: &[f64; 4]) -> bool {
    regions.iter().any(|r| r.overlaps(bounds))
}

enum XObjectKind {
    Image(ObjectId),
    Form { bbox: [f64; 4], matrix: Ctm },
    Other,
}

/// Scrub one page in place. `regions` are in user space with `y` at the
/// lower edge.
pub(crate) fn scrub_page(
    doc: &mut lopdf::Document,
    page_id: ObjectId,
    regions: &[Rect<Document>],
    options: &RedactOptions,
) -> Result<ScrubReport, BackendError> {
    let regions: Vec<Region> = regions
        .iter()
        .filter(|r| !r.is_empty())
        .map(Region::from_rect)
        .collect();
    let mut report = ScrubReport::default();
    if regions.is_empty() {
        return Ok(report);
    }

    let content = page_content(doc, page_id)?;
    let ops = tokenize(&content)?;
    let mut resources = page_resources(doc, page_id)?;
    let fonts = load_fonts(doc, &resources);
    let xobjects = classify_xobjects(doc, &resources);

    let mut rewriter = Rewriter {
        regions: &regions,
        fonts: &fonts,
        state: ContentState::new(),
        out: Vec::with_capacity(ops.len()),
        report: &mut report,
    };

    let mut new_images: Vec<(String, ObjectId)> = Vec::new();
    // XObject names still drawn by the page, and names some use of which
    // was replaced or dropped.
    let mut kept_names: HashSet<String> = HashSet::new();
    let mut replaced_names: HashSet<String> = HashSet::new();
    for op in ops {
        if op.name == "Do" {
            let Some(name) = op.operands.first().and_then(Operand::as_name).map(str::to_owned)
            else {
                rewriter.out.push(op);
                continue;
            };
            let ctm = *rewriter.state.ctm();
            match xobjects.get(&name) {
                Some(XObjectKind::Image(id)) => {
                    let bounds = ctm.transform_bounds(0.0, 0.0, 1.0, 1.0);
                    if !any_overlap(&regions, &bounds) {
                        kept_names.insert(name);
                        rewriter.out.push(op);
                        continue;
                    }
                    replaced_names.insert(name.clone());
                    let rewritten = match options.image_policy {
                        ImageScrubPolicy::Pixels => {
                            scrub_image(doc, *id, &ctm, &regions, options)?
                        }
                        ImageScrubPolicy::Remove => None,
                    };
                    match rewritten {
                        Some(new_id) => {
                            let alias = format!("BlackoutIm{}", new_images.len());
                            new_images.push((alias.clone(), new_id));
                            rewriter.out.push(Operator::new("Do", vec![Operand::Name(alias)]));
                            rewriter.report.images_rewritten += 1;
                        }
                        None => {
                            debug!(image = %name, "dropping image under redaction");
                            rewriter.report.images_removed += 1;
                        }
                    }
                }
                Some(XObjectKind::Form { bbox, matrix }) => {
                    let m = matrix.concat(&ctm);
                    let bounds = m.transform_bounds(bbox[0], bbox[1], bbox[2], bbox[3]);
                    if any_overlap(&regions, &bounds) {
                        debug!(form = %name, "dropping form XObject under redaction");
                        rewriter.report.forms_removed += 1;
                        replaced_names.insert(name);
                    } else {
                        kept_names.insert(name);
                        rewriter.out.push(op);
                    }
                }
                Some(XObjectKind::Other) | None => {
                    kept_names.insert(name);
                    rewriter.out.push(op);
                }
            }
            continue;
        }
        if op.inline_image.is_some() {
            let bounds = rewriter.state.ctm().transform_bounds(0.0, 0.0, 1.0, 1.0);
            if any_overlap(&regions, &bounds) {
                rewriter.report.inline_images_removed += 1;
            } else {
                rewriter.out.push(op);
            }
            continue;
        }
        rewriter.handle(op);
    }

    let Rewriter { state, mut out, .. } = rewriter;
    if state.in_text_object() {
        out.push(Operator::new("ET", Vec::new()));
    }
    for _ in 0..state.depth() {
        out.push(Operator::new("Q", Vec::new()));
    }

    let mut bytes = b"q\n".to_vec();
    bytes.extend_from_slice(&serialize(&out));
    bytes.extend_from_slice(b"Q\n");
    bytes.extend_from_slice(&fill_operations(&regions, options));

    if !new_images.is_empty() || !replaced_names.is_empty() {
        let mut xobject_dict = resources
            .get(b"XObject")
            .ok()
            .and_then(|o| resolve_dict(doc, Some(o)))
            .cloned()
            .unwrap_or_default();
        // Unreferenced originals must not survive in the page resources.
        for name in replaced_names.difference(&kept_names) {
            xobject_dict.remove(name.as_bytes());
        }
        for (alias, id) in new_images {
            xobject_dict.set(alias, Object::Reference(id));
        }
        resources.set("XObject", Object::Dictionary(xobject_dict));
    }

    let mut stream = Stream::new(dictionary! {}, bytes);
    stream
        .compress()
        .map_err(|e| BackendError::Serialize(format!("failed to compress content: {e}")))?;
    let content_id = doc.add_object(stream);

    report.annotations_removed = remove_annotations(doc, page_id, &regions)?;

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;
    page.set("Contents", Object::Reference(content_id));
    page.set("Resources", Object::Dictionary(resources));
    page.remove(b"Thumb");

    Ok(report)
}

/// Concatenated, decoded content streams of a page.
fn page_content(doc: &lopdf::Document, page_id: ObjectId) -> Result<Vec<u8>, BackendError> {
    let mut content = Vec::new();
    for id in doc.get_page_contents(page_id) {
        let stream = doc.get_object(id).and_then(Object::as_stream)?;
        let data = if stream.dict.has(b"Filter") {
            stream.decompressed_content().map_err(|e| {
                BackendError::Content(format!("cannot decode content stream {id:?}: {e}"))
            })?
        } else {
            stream.content.clone()
        };
        content.extend_from_slice(&data);
        content.push(b'\n');
    }
    Ok(content)
}

/// An owned copy of the page's (possibly inherited) resource dictionary.
fn page_resources(
    doc: &lopdf::Document,
    page_id: ObjectId,
) -> Result<lopdf::Dictionary, BackendError> {
    Ok(resolve_inherited(doc, page_id, b"Resources")?
        .and_then(|o| resolve_dict(doc, Some(o)))
        .cloned()
        .unwrap_or_default())
}

fn load_fonts(doc: &lopdf::Document, resources: &lopdf::Dictionary) -> HashMap<String, FontMetrics> {
    let Some(font_dict) = resources
        .get(b"Font")
        .ok()
        .and_then(|o| resolve_dict(doc, Some(o)))
    else {
        return HashMap::new();
    };
    font_dict
        .iter()
        .filter_map(|(name, obj)| {
            let font = resolve_dict(doc, Some(obj))?;
            Some((
                String::from_utf8_lossy(name).into_owned(),
                FontMetrics::from_font_dict(doc, font),
            ))
        })
        .collect()
}

fn classify_xobjects(
    doc: &lopdf::Document,
    resources: &lopdf::Dictionary,
) -> HashMap<String, XObjectKind> {
    let Some(dict) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(doc, Some(o)))
    else {
        return HashMap::new();
    };
    dict.iter()
        .map(|(name, obj)| {
            let name = String::from_utf8_lossy(name).into_owned();
            let kind = match resolve(doc, obj).as_stream() {
                Ok(stream) => {
                    let subtype = stream
                        .dict
                        .get(b"Subtype")
                        .and_then(Object::as_name)
                        .unwrap_or(b"");
                    match (subtype, obj) {
                        (b"Image", Object::Reference(id)) => XObjectKind::Image(*id),
                        (b"Form", _) => XObjectKind::Form {
                            bbox: form_bbox(doc, &stream.dict),
                            matrix: form_matrix(doc, &stream.dict),
                        },
                        // A direct image stream cannot be replaced by reference;
                        // treat it like a form so it is dropped when hit.
                        (b"Image", _) => XObjectKind::Form {
                            bbox: [0.0, 0.0, 1.0, 1.0],
                            matrix: Ctm::identity(),
                        },
                        _ => XObjectKind::Other,
                    }
                }
                Err(_) => XObjectKind::Other,
            };
            (name, kind)
        })
        .collect()
}

fn form_bbox(doc: &lopdf::Document, dict: &lopdf::Dictionary) -> [f64; 4] {
    let vals: Vec<f64> = dict
        .get(b"BBox")
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .map(|arr| arr.iter().filter_map(|o| number(doc, Some(o))).collect())
        .unwrap_or_default();
    match vals.as_slice() {
        [a, b, c, d] => [a.min(*c), b.min(*d), a.max(*c), b.max(*d)],
        // Unknown extent: assume it can reach anywhere.
        _ => [-1e9, -1e9, 1e9, 1e9],
    }
}

fn form_matrix(doc: &lopdf::Document, dict: &lopdf::Dictionary) -> Ctm {
    let vals: Vec<f64> = dict
        .get(b"Matrix")
        .ok()
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .map(|arr| arr.iter().filter_map(|o| number(doc, Some(o))).collect())
        .unwrap_or_default();
    match vals.as_slice() {
        [a, b, c, d, e, f] => Ctm::new(*a, *b, *c, *d, *e, *f),
        _ => Ctm::identity(),
    }
}

/// Builds a `TJ` array, merging adjacent strings and adjacent numbers.
#[derive(Default)]
struct TjBuilder {
    items: Vec<Operand>,
    removed: usize,
}

impl TjBuilder {
    /// Append kept bytes, in the string form they were shown with.
    fn push_bytes(&mut self, bytes: &[u8], literal: bool) {
        match self.items.last_mut() {
            Some(Operand::LiteralString(last)) if literal => last.extend_from_slice(bytes),
            Some(Operand::HexString(last)) if !literal => last.extend_from_slice(bytes),
            _ if literal => self.items.push(Operand::LiteralString(bytes.to_vec())),
            _ => self.items.push(Operand::HexString(bytes.to_vec())),
        }
    }

    fn push_shift(&mut self, n: f64) {
        if n == 0.0 {
            return;
        }
        if let Some(last) = self.items.last_mut() {
            if let Some(prev) = last.as_f64() {
                *last = Operand::number(prev + n);
                return;
            }
        }
        self.items.push(Operand::number(n));
    }

    fn into_operator(self) -> Operator {
        Operator::new("TJ", vec![Operand::Array(self.items)])
    }
}

struct Rewriter<'a> {
    regions: &'a [Region],
    fonts: &'a HashMap<String, FontMetrics>,
    state: ContentState,
    out: Vec<Operator>,
    report: &'a mut ScrubReport,
}

impl Rewriter<'_> {
    fn handle(&mut self, op: Operator) {
        match op.name.as_str() {
            "Tj" => {
                let mut tj = TjBuilder::default();
                if let Some(text) = op.operands.last() {
                    self.show(text, &mut tj);
                }
                self.emit_text(op, tj, Vec::new());
            }
            "TJ" => {
                let mut tj = TjBuilder::default();
                if let Some(Operand::Array(items)) = op.operands.last() {
                    for item in items {
                        if item.as_bytes().is_some() {
                            self.show(item, &mut tj);
                        } else if let Some(n) = item.as_f64() {
                            let t = self.state.text();
                            let tx = -n / 1000.0 * t.font_size * t.h_scale();
                            self.state.advance(tx);
                            tj.push_shift(n);
                        }
                    }
                }
                self.emit_text(op, tj, Vec::new());
            }
            "'" => {
                self.state.next_line();
                let mut tj = TjBuilder::default();
                if let Some(text) = op.operands.last() {
                    self.show(text, &mut tj);
                }
                self.emit_text(op, tj, vec![Operator::new("T*", Vec::new())]);
            }
            "\"" => {
                let aw = op.number(0);
                let ac = op.number(1);
                self.state.text_mut().word_spacing = aw;
                self.state.text_mut().char_spacing = ac;
                self.state.next_line();
                let mut tj = TjBuilder::default();
                if let Some(text) = op.operands.get(2) {
                    self.show(text, &mut tj);
                }
                self.emit_text(
                    op,
                    tj,
                    vec![
                        Operator::new("Tw", vec![Operand::number(aw)]),
                        Operator::new("Tc", vec![Operand::number(ac)]),
                        Operator::new("T*", Vec::new()),
                    ],
                );
            }
            "Q" => {
                if self.state.restore() {
                    self.out.push(op);
                } else {
                    warn!("ignoring unbalanced Q in page content");
                }
            }
            name => {
                let nums: Vec<f64> = op.operands.iter().filter_map(Operand::as_f64).collect();
                let font = op.operands.first().and_then(Operand::as_name);
                self.state.apply(name, &nums, font);
                self.out.push(op);
            }
        }
    }

    /// Keep the original operator when nothing was removed, otherwise emit
    /// the preamble followed by the rewritten `TJ`.
    fn emit_text(&mut self, original: Operator, tj: TjBuilder, preamble: Vec<Operator>) {
        if tj.removed == 0 {
            self.out.push(original);
            return;
        }
        self.report.glyphs_removed += tj.removed;
        self.out.extend(preamble);
        self.out.push(tj.into_operator());
    }

    /// Lay out a string operand glyph by glyph, advancing the text matrix
    /// and recording kept bytes or replacement displacements.
    fn show(&mut self, text: &Operand, tj: &mut TjBuilder) {
        let Some(bytes) = text.as_bytes() else {
            return;
        };
        let literal = matches!(text, Operand::LiteralString(_));
        let default_metrics = FontMetrics::default();
        let font = self
            .fonts
            .get(&self.state.text().font_name)
            .unwrap_or(&default_metrics);

        let mut offset = 0;
        for (code, len) in font.codes(bytes) {
            let glyph = &bytes[offset..offset + len];
            offset += len;

            let t = self.state.text();
            let size = t.font_size;
            let th = t.h_scale();
            let w0 = font.width(code) / 1000.0;
            let spacing = t.char_spacing
                + if font.is_word_space(code, len) {
                    t.word_spacing
                } else {
                    0.0
                };
            let tx = (w0 * size + spacing) * th;

            let hit_width = if w0 > 0.0 { w0 } else { 0.3 };
            let trm = self.state.text_to_user();
            let bounds = trm.transform_bounds(
                0.0,
                font.descent() / 1000.0 * size,
                hit_width * size,
                font.ascent() / 1000.0 * size,
            );

            if any_overlap(self.regions, &bounds) {
                tj.removed += 1;
                let scale = size * th;
                if scale.abs() > f64::EPSILON {
                    tj.push_shift(-tx * 1000.0 / scale);
                }
            } else {
                tj.push_bytes(glyph, literal);
            }
            self.state.advance(tx);
        }
    }
}

/// Overwrite the covered pixels of an image XObject in a new object.
///
/// Returns `None` when the image uses an encoding or colour model that is
/// not handled; the caller then drops the image from the page.
fn scrub_image(
    doc: &mut lopdf::Document,
    image_id: ObjectId,
    placement: &Ctm,
    regions: &[Region],
    options: &RedactOptions,
) -> Result<Option<ObjectId>, BackendError> {
    let Some(inverse) = placement.inverse() else {
        return Ok(None);
    };
    let stream = match doc.get_object(image_id).and_then(Object::as_stream) {
        Ok(s) => s.clone(),
        Err(_) => return Ok(None),
    };
    let Some(decoded) = crate::image_data::decode_image_stream(doc, &stream) else {
        return Ok(None);
    };
    let mut decoded = decoded;
    let (w, h) = (f64::from(decoded.width), f64::from(decoded.height));

    for region in regions {
        let [x0, y0, x1, y1] = region.0;
        let [u0, v0, u1, v1] = inverse.transform_bounds(x0, y0, x1, y1);
        if u1 <= 0.0 || v1 <= 0.0 || u0 >= 1.0 || v0 >= 1.0 {
            continue;
        }
        // Image space: u runs left to right, v bottom to top.
        let px0 = (u0.max(0.0) * w).floor() as u32;
        let px1 = (u1.min(1.0) * w).ceil() as u32;
        let py0 = ((1.0 - v1.min(1.0)) * h).floor() as u32;
        let py1 = ((1.0 - v0.max(0.0)) * h).ceil() as u32;
        decoded.fill(px0, py0, px1, py1, options.fill_color);
    }

    let new_stream = match decoded.encode(stream.dict.clone(), options.jpeg_quality) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to re-encode image; dropping it instead");
            return Ok(None);
        }
    };
    Ok(Some(doc.add_object(new_stream)))
}

/// Opaque fills over every region, in default user space.
fn fill_operations(regions: &[Region], options: &RedactOptions) -> Vec<u8> {
    let [r, g, b] = options.fill_rgb();
    let mut ops = Vec::new();
    for region in regions {
        let [x0, y0, x1, y1] = region.0;
        ops.push(Operator::new("q", Vec::new()));
        ops.push(Operator::new(
            "rg",
            vec![
                Operand::number(f64::from(r)),
                Operand::number(f64::from(g)),
                Operand::number(f64::from(b)),
            ],
        ));
        ops.push(Operator::new(
            "re",
            vec![
                Operand::number(x0),
                Operand::number(y0),
                Operand::number(x1 - x0),
                Operand::number(y1 - y0),
            ],
        ));
        ops.push(Operator::new("f", Vec::new()));
        ops.push(Operator::new("Q", Vec::new()));
    }
    serialize(&ops)
}

/// Drop annotations whose `/Rect` overlaps a region. Returns how many.
fn remove_annotations(
    doc: &mut lopdf::Document,
    page_id: ObjectId,
    regions: &[Region],
) -> Result<usize, BackendError> {
    let annots: Vec<Object> = {
        let page = doc.get_object(page_id).and_then(Object::as_dict)?;
        match page.get(b"Annots") {
            Ok(obj) => match resolve(doc, obj).as_array() {
                Ok(arr) => arr.clone(),
                Err(_) => return Ok(0),
            },
            Err(_) => return Ok(0),
        }
    };

    let mut kept = Vec::with_capacity(annots.len());
    let mut removed = 0;
    for annot in annots {
        let rect = resolve_dict(doc, Some(&annot))
            .and_then(|d| d.get(b"Rect").ok())
            .map(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
            .map(|arr| {
                arr.iter()
                    .filter_map(|o| number(doc, Some(o)))
                    .collect::<Vec<_>>()
            });
        let hit = match rect.as_deref() {
            Some([a, b, c, d]) => any_overlap(regions, &[a.min(*c), b.min(*d), a.max(*c), b.max(*d)]),
            _ => false,
        };
        if hit {
            removed += 1;
        } else {
            kept.push(annot);
        }
    }

    if removed > 0 {
        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;
        if kept.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", Object::Array(kept));
        }
    }
    Ok(removed)
}
