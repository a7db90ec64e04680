//! Pointer drag tracking in display space.

use crate::geometry::{Display, Point, Rect};

/// Which pointer button started an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Tracks one press-move-release interaction.
///
/// Only a primary-button press (or a single-finger touch) starts a drag.
/// Leaving the page area or cancelling abandons the drag without producing a
/// rectangle. The size gate is not applied here; it belongs to the store,
/// which judges extents in surface pixels.
#[derive(Debug, Clone, Default)]
pub struct DragGesture {
    anchor: Option<Point<Display>>,
    current: Option<Point<Display>>,
}

impl DragGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn press(&mut self, point: Point<Display>, button: PointerButton) {
        if button != PointerButton::Primary {
            return;
        }
        self.anchor = Some(point);
        self.current = Some(point);
    }

    /// Start from a touch event. Multi-touch contacts are ignored.
    pub fn touch_start(&mut self, touches: &[Point<Display>]) {
        if let [only] = touches {
            self.press(*only, PointerButton::Primary);
        }
    }

    /// Update the moving corner and return the preview rectangle.
    pub fn move_to(&mut self, point: Point<Display>) -> Option<Rect<Display>> {
        let anchor = self.anchor?;
        self.current = Some(point);
        Some(Rect::from_corners(anchor, point))
    }

    /// Rectangle between the anchor and the last known pointer position.
    pub fn preview(&self) -> Option<Rect<Display>> {
        match (self.anchor, self.current) {
            (Some(a), Some(c)) => Some(Rect::from_corners(a, c)),
            _ => None,
        }
    }

    /// Finish the drag and return the normalised rectangle.
    pub fn release(&mut self, point: Point<Display>) -> Option<Rect<Display>> {
        let anchor = self.anchor.take()?;
        self.current = None;
        Some(Rect::from_corners(anchor, point))
    }

    /// The pointer left the page area; the drag is dropped.
    pub fn leave(&mut self) {
        self.cancel();
    }

    pub fn cancel(&mut self) {
        self.anchor = None;
        self.current = None;
    }
}
