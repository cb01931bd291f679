//! Glyph shapes and their measurement.
//!
//! The engine never resolves a sign name to a visual shape itself; it goes
//! through the [`GlyphSource`] capability, which any 2D rasterizer can
//! implement. The crate ships a freetype-backed implementation in
//! [`manager`].

pub mod manager;

#[cfg(test)]
pub mod mock;

pub use self::manager::{FontManager, HieroFont};

use crate::geometry::Rect;
use crate::surface::{Canvas, Color};
use crate::Result;

/// Style parameters of one glyph request.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphStyle {
    /// Requested em size in pixels.
    pub size_px: f64,

    /// Horizontal stretch factor.
    pub xscale: f64,

    /// Vertical stretch factor.
    pub yscale: f64,

    /// Clockwise rotation in degrees.
    pub rotate: u16,

    /// Mirror around the vertical axis.
    pub mirror: bool,
}

impl GlyphStyle {
    /// An upright, unstretched style at the given pixel size.
    pub fn sized(size_px: f64) -> GlyphStyle {
        GlyphStyle {
            size_px,
            xscale: 1.0,
            yscale: 1.0,
            rotate: 0,
            mirror: false,
        }
    }
}

/// The capability the engine consumes to measure and paint glyphs.
///
/// `measure` returns the tight ink bounding box of a styled glyph, with the
/// origin at the box's top left corner. `paint` places the same ink so that
/// the box lands at the given position; the reference rectangle is the
/// result of the matching `measure` call and fixes the intended extents.
/// Ink readback lives on [`Canvas`].
pub trait GlyphSource {
    /// Measures the tight ink bounding box of a styled glyph.
    fn measure(&self, name: &str, style: &GlyphStyle) -> Result<Rect>;

    /// Paints a styled glyph with its ink box at the given position.
    fn paint(
        &self,
        canvas: &mut Canvas,
        x: f64,
        y: f64,
        reference: &Rect,
        name: &str,
        style: &GlyphStyle,
        color: Color,
    ) -> Result<()>;
}
