//! Pending redactions for the loaded document.

use std::collections::BTreeSet;

use crate::geometry::{Rect, Size, Surface};

/// Smallest admitted extent, in surface pixels, on either axis.
///
/// A drag must be strictly larger than this in both width and height.
pub const MIN_REDACTION_EXTENT: f64 = 5.0;

/// One pending redaction.
///
/// The surface size the rectangle was drawn against is frozen at creation so
/// that later re-renders at a different scale do not move it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Redaction {
    rect: Rect<Surface>,
    page_index: usize,
    surface_width: u32,
    surface_height: u32,
    sequence: u64,
}

impl Redaction {
    pub fn rect(&self) -> Rect<Surface> {
        self.rect
    }

    /// Zero-based page the redaction belongs to.
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn surface_width(&self) -> u32 {
        self.surface_width
    }

    pub fn surface_height(&self) -> u32 {
        self.surface_height
    }

    pub fn surface_size(&self) -> Size<Surface> {
        Size::new(f64::from(self.surface_width), f64::from(self.surface_height))
    }

    /// Insertion order within the owning store.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Ordered collection of pending redactions.
#[derive(Debug, Clone, Default)]
pub struct RedactionStore {
    items: Vec<Redaction>,
    next_sequence: u64,
}

impl RedactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a redaction drawn on `page_index`.
    ///
    /// Rectangles not strictly larger than [`MIN_REDACTION_EXTENT`] on both
    /// axes are ignored. Returns whether the redaction was stored.
    pub fn add(
        &mut self,
        page_index: usize,
        rect: Rect<Surface>,
        surface_width: u32,
        surface_height: u32,
    ) -> bool {
        if rect.width() <= MIN_REDACTION_EXTENT || rect.height() <= MIN_REDACTION_EXTENT {
            return false;
        }
        self.items.push(Redaction {
            rect,
            page_index,
            surface_width,
            surface_height,
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
        true
    }

    /// Remove the most recently added redaction on `page_index`.
    pub fn undo_last(&mut self, page_index: usize) -> Option<Redaction> {
        let pos = self
            .items
            .iter()
            .rposition(|r| r.page_index == page_index)?;
        Some(self.items.remove(pos))
    }

    /// Redactions on one page, oldest first.
    pub fn for_page(&self, page_index: usize) -> impl Iterator<Item = &Redaction> + Clone + '_ {
        self.items
            .iter()
            .filter(move |r| r.page_index == page_index)
    }

    pub fn count_on_page(&self, page_index: usize) -> usize {
        self.for_page(page_index).count()
    }

    /// Distinct page indices that carry at least one redaction, ascending.
    pub fn pages(&self) -> Vec<usize> {
        self.items
            .iter()
            .map(|r| r.page_index)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// All redactions in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Redaction> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl<'a> IntoIterator for &'a RedactionStore {
    type Item = &'a Redaction;
    type IntoIter = std::slice::Iter<'a, Redaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
