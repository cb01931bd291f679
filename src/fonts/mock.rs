//! A deterministic glyph source for tests.
//!
//! Signs are solid rectangles whose em proportions come from a small fixed
//! table, so expected pixel geometry can be computed by hand in tests. The
//! `corner` pseudo-sign has an L-shaped silhouette for exercising the
//! ink-sensitive algorithms.

use crate::fonts::{GlyphSource, GlyphStyle};
use crate::geometry::Rect;
use crate::surface::{Canvas, Color};
use crate::Result;

/// Em proportions (width, height) of the mock signs.
static PROPORTIONS: &[(&str, f64, f64)] = &[
    ("A1", 0.75, 1.0),
    ("D21", 1.0, 0.35),
    ("N35", 1.0, 0.2),
    ("O1", 0.9, 1.0),
    ("tall", 0.5, 2.0),
    ("wide", 2.0, 0.5),
    ("corner", 1.0, 1.0),
    ("open", 0.25, 1.0),
    ("close", 0.25, 1.0),
    ("segment", 0.5, 1.0),
];

const DEFAULT_W: f64 = 0.8;
const DEFAULT_H: f64 = 0.8;

/// The deterministic test source.
pub struct MockSource;

fn proportions(name: &str) -> (f64, f64) {
    // Box parts such as `cartouche-open` fall back to their bare part name.
    let key = name.rsplit('-').next().unwrap_or(name);
    PROPORTIONS
        .iter()
        .find(|(n, _, _)| *n == name || *n == key)
        .map(|(_, w, h)| (*w, *h))
        .unwrap_or((DEFAULT_W, DEFAULT_H))
}

impl GlyphSource for MockSource {
    fn measure(&self, name: &str, style: &GlyphStyle) -> Result<Rect> {
        let (mut w, mut h) = proportions(name);
        w *= style.size_px * style.xscale;
        h *= style.size_px * style.yscale;
        if style.rotate == 90 || style.rotate == 270 {
            std::mem::swap(&mut w, &mut h);
        }
        Ok(Rect::new(0.0, 0.0, w.round(), h.round()))
    }

    fn paint(
        &self,
        canvas: &mut Canvas,
        x: f64,
        y: f64,
        reference: &Rect,
        name: &str,
        _style: &GlyphStyle,
        color: Color,
    ) -> Result<()> {
        let target = Rect::new(x, y, reference.w, reference.h);

        if name == "corner" {
            // Vertical bar along the leading edge, horizontal bar along the
            // bottom, each a quarter of the extent thick.
            let bar_w = (target.w / 4.0).max(1.0);
            let bar_h = (target.h / 4.0).max(1.0);
            canvas.fill_rect(&Rect::new(target.x, target.y, bar_w, target.h), color);
            canvas.fill_rect(
                &Rect::new(target.x, target.y_max() - bar_h, target.w, bar_h),
                color,
            );
        } else {
            canvas.fill_rect(&target, color);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MockSource;
    use crate::fonts::{GlyphSource, GlyphStyle};
    use crate::surface::Canvas;

    #[test]
    fn measure_scales_with_size() {
        let source = MockSource;
        let small = source.measure("A1", &GlyphStyle::sized(36.0)).unwrap();
        let large = source.measure("A1", &GlyphStyle::sized(72.0)).unwrap();
        assert_eq!(small.w * 2.0, large.w);
        assert_eq!(small.h, 36.0);
    }

    #[test]
    fn rotation_swaps_extents() {
        let source = MockSource;
        let mut style = GlyphStyle::sized(36.0);
        style.rotate = 90;
        let rect = source.measure("tall", &style).unwrap();
        assert_eq!(rect.w, 72.0);
        assert_eq!(rect.h, 18.0);
    }

    #[test]
    fn corner_ink_is_l_shaped() {
        let source = MockSource;
        let style = GlyphStyle::sized(20.0);
        let reference = source.measure("corner", &style).unwrap();

        let mut canvas = Canvas::new(20, 20).unwrap();
        source
            .paint(
                &mut canvas,
                0.0,
                0.0,
                &reference,
                "corner",
                &style,
                crate::surface::Color::BLACK,
            )
            .unwrap();

        let ink = canvas.ink();
        assert!(ink.has_ink(0, 0));
        assert!(ink.has_ink(19, 19));
        assert!(!ink.has_ink(19, 0));
    }
}
