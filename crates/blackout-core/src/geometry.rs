//! Frame-tagged geometry.
//!
//! Three coordinate frames take part in every redaction:
//!
//! - [`Display`]: the on-screen coordinates the pointer reports.
//! - [`Surface`]: the pixel grid of the rasterized page buffer.
//! - [`Document`]: the file's native space (PDF user space, or the image's
//!   pixel grid).
//!
//! [`Point`], [`Size`] and [`Rect`] carry their frame as a type parameter, so
//! a surface rectangle cannot be handed to code expecting document units.
//! Only the functions in [`crate::mapper`] move values between frames.

use std::fmt;
use std::marker::PhantomData;

/// Marker trait for coordinate frames.
pub trait Frame: Copy + Clone + fmt::Debug + PartialEq + Default + Send + Sync + 'static {
    /// Human-readable frame name, used in `Debug` output and log messages.
    const NAME: &'static str;
}

/// On-screen display coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Display;

/// Rendering surface pixel coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Surface;

/// Native document coordinates.
///
/// For PDF pages this is user space with a bottom-left origin once a
/// rectangle has been flipped by [`crate::mapper::surface_to_document`];
/// for images it is the pixel grid with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Document;

impl Frame for Display {
    const NAME: &'static str = "display";
}

impl Frame for Surface {
    const NAME: &'static str = "surface";
}

impl Frame for Document {
    const NAME: &'static str = "document";
}

/// A point in frame `F`.
#[derive(Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(bound = ""))]
pub struct Point<F: Frame> {
    pub x: f64,
    pub y: f64,
    #[cfg_attr(feature = "serde", serde(skip))]
    frame: PhantomData<F>,
}

impl<F: Frame> Point<F> {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            frame: PhantomData,
        }
    }
}

impl<F: Frame> fmt::Debug for Point<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point<{}>({}, {})", F::NAME, self.x, self.y)
    }
}

/// A width/height pair in frame `F`.
#[derive(Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(bound = ""))]
pub struct Size<F: Frame> {
    pub width: f64,
    pub height: f64,
    #[cfg_attr(feature = "serde", serde(skip))]
    frame: PhantomData<F>,
}

impl<F: Frame> Size<F> {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            frame: PhantomData,
        }
    }

    /// True when either side is zero, negative, or not finite.
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

impl<F: Frame> fmt::Debug for Size<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Size<{}>({} x {})", F::NAME, self.width, self.height)
    }
}

/// An axis-aligned rectangle in frame `F`.
///
/// `x`/`y` is the top-left corner in the frame's own orientation. Width and
/// height are never negative: constructors normalise a negative extent by
/// moving the origin to the opposite edge.
#[derive(Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(bound = ""))]
pub struct Rect<F: Frame> {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    #[cfg_attr(feature = "serde", serde(skip))]
    frame: PhantomData<F>,
}

impl<F: Frame> Rect<F> {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        let (x, width) = if width < 0.0 { (x + width, -width) } else { (x, width) };
        let (y, height) = if height < 0.0 { (y + height, -height) } else { (y, height) };
        Self {
            x,
            y,
            width,
            height,
            frame: PhantomData,
        }
    }

    /// Build the rectangle spanned by two opposite corners, in any order.
    ///
    /// A drag from bottom-right to top-left produces the same rectangle as
    /// the reverse drag.
    pub fn from_corners(a: Point<F>, b: Point<F>) -> Self {
        Self::new(
            a.x.min(b.x),
            a.y.min(b.y),
            (a.x - b.x).abs(),
            (a.y - b.y).abs(),
        )
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point<F> {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size<F> {
        Size::new(self.width, self.height)
    }

    /// True when the rectangle has no area.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// True when the two rectangles share a region of positive area.
    pub fn intersects(&self, other: &Rect<F>) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// The overlapping region, or `None` when the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect<F>) -> Option<Rect<F>> {
        if !self.intersects(other) {
            return None;
        }
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Clip to `[0, size.width] x [0, size.height]`.
    pub fn clip_to(&self, size: Size<F>) -> Option<Rect<F>> {
        self.intersection(&Rect::new(0.0, 0.0, size.width, size.height))
    }

    /// Translate by `(dx, dy)` within the same frame.
    pub fn translate(&self, dx: f64, dy: f64) -> Rect<F> {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect<F>) -> Rect<F> {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

impl<F: Frame> fmt::Debug for Rect<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect<{}>(x={}, y={}, w={}, h={})",
            F::NAME,
            self.x,
            self.y,
            self.width,
            self.height
        )
    }
}

/// Affine transformation matrix `[a b c d e f]` in PDF convention.
///
/// Maps `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`. Used by the content
/// interpreter to place glyphs and images in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ctm {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Ctm {
    fn default() -> Self {
        Self::identity()
    }
}

impl Ctm {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// `self x other`: apply `self` first, then `other`.
    pub fn concat(&self, other: &Ctm) -> Ctm {
        Ctm {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// The inverse matrix, or `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Ctm> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;
        Some(Ctm {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            e: (self.c * self.f - self.d * self.e) * inv,
            f: (self.b * self.e - self.a * self.f) * inv,
        })
    }

    /// Bounding box (as `[x0, y0, x1, y1]`) of the parallelogram obtained by
    /// transforming the rectangle `[x0, y0] - [x1, y1]`.
    pub fn transform_bounds(&self, x0: f64, y0: f64, x1: f64, y1: f64) -> [f64; 4] {
        let corners = [
            self.transform_point(x0, y0),
            self.transform_point(x1, y0),
            self.transform_point(x0, y1),
            self.transform_point(x1, y1),
        ];
        let mut out = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
        for (x, y) in corners {
            out[0] = out[0].min(x);
            out[1] = out[1].min(y);
            out[2] = out[2].max(x);
            out[3] = out[3].max(y);
        }
        out
    }
}
