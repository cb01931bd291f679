//! The shading engine.
//!
//! Shaded areas are hatched with one of two families of parallel 45° lines,
//! chosen once per render from the writing direction. Every shaded
//! rectangle contributes the intersection of its area with the family's
//! lines; segments landing on the same line merge when their projections
//! overlap, so abutting shaded rectangles hatch seamlessly. The whole set
//! is painted once at the end of the pass.

use crate::geometry::Rect;
use crate::surface::{Canvas, Color};
use crate::tree::{Direction, Shading};
use std::collections::BTreeMap;

/// The two 45° hatch-line families.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HatchDir {
    /// Lines running down-right (`\`), `y = x + c`.
    Falling,

    /// Lines running up-right (`/`), `y = -x + c`.
    Rising,
}

impl HatchDir {
    /// The family used for a writing direction and mirror state.
    pub fn for_flow(direction: Direction, mirror: bool) -> HatchDir {
        if direction.is_reversed() != mirror {
            HatchDir::Rising
        } else {
            HatchDir::Falling
        }
    }
}

/// The hatching accumulator of one render pass.
pub struct ShadeSet {
    dir: HatchDir,
    spacing: f64,
    tolerance: f64,
    width: f64,

    /// Per-line segments as intervals of the x projection.
    lines: BTreeMap<i64, Vec<(f64, f64)>>,
}

impl ShadeSet {
    /// An empty accumulator.
    pub fn new(dir: HatchDir, spacing: f64, tolerance: f64, width: f64) -> ShadeSet {
        ShadeSet {
            dir,
            spacing,
            tolerance,
            width,
            lines: BTreeMap::new(),
        }
    }

    /// True if nothing has been shaded.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Perpendicular spacing translated to the line offset parameter.
    fn step(&self) -> f64 {
        self.spacing * std::f64::consts::SQRT_2
    }

    /// Accumulates the hatch segments covering a rectangle.
    pub fn add_rect(&mut self, rect: &Rect) {
        if rect.is_empty() {
            return;
        }

        let step = self.step();
        let (c_min, c_max) = match self.dir {
            HatchDir::Falling => (rect.y - rect.x_max(), rect.y_max() - rect.x),
            HatchDir::Rising => (rect.x + rect.y, rect.x_max() + rect.y_max()),
        };

        let k_min = (c_min / step).ceil() as i64;
        let k_max = (c_max / step).floor() as i64;

        for k in k_min..=k_max {
            let c = k as f64 * step;
            let (x0, x1) = match self.dir {
                HatchDir::Falling => (rect.x.max(rect.y - c), rect.x_max().min(rect.y_max() - c)),
                HatchDir::Rising => (rect.x.max(c - rect.y_max()), rect.x_max().min(c - rect.y)),
            };

            if x1 > x0 {
                self.lines.entry(k).or_insert_with(Vec::new).push((x0, x1));
            }
        }
    }

    /// Accumulates a shading request over a rectangle.
    ///
    /// `ambient` is the inherited shade default; pattern codes subdivide the
    /// rectangle by halving instructions before accumulation.
    pub fn apply(
        &mut self,
        rect: &Rect,
        shade: &Shading,
        ambient: bool,
        direction: Direction,
        mirror: bool,
    ) {
        match shade {
            Shading::Unspecified => {
                if ambient {
                    self.add_rect(rect);
                }
            }
            Shading::On => self.add_rect(rect),
            Shading::Off => {}
            Shading::Patterns(patterns) => {
                for pattern in patterns {
                    let sub = pattern_rect(rect, pattern, direction, mirror);
                    self.add_rect(&sub);
                }
            }
        }
    }

    /// Compresses and paints the accumulated segments.
    ///
    /// Segments are accumulated in fragment coordinates; `(ox, oy)`
    /// translates them onto the canvas.
    pub fn paint(&mut self, canvas: &mut Canvas, ox: f64, oy: f64, color: Color) {
        let step = self.step();

        for (&k, intervals) in &mut self.lines {
            intervals.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut merged: Vec<(f64, f64)> = Vec::new();
            for &(x0, x1) in intervals.iter() {
                match merged.last_mut() {
                    Some(last) if x0 - last.1 <= self.tolerance => last.1 = last.1.max(x1),
                    _ => merged.push((x0, x1)),
                }
            }

            let c = k as f64 * step;
            for (x0, x1) in merged {
                let (y0, y1) = match self.dir {
                    HatchDir::Falling => (x0 + c, x1 + c),
                    HatchDir::Rising => (c - x0, c - x1),
                };
                canvas.line(x0 + ox, y0 + oy, x1 + ox, y1 + oy, self.width, color);
            }
        }
    }
}

/// Applies a quadrant-subdivision pattern to a rectangle.
///
/// Each instruction halves the rectangle: `t` keeps the top half, `b` the
/// bottom, `s` the start half and `e` the end half, with start and end
/// resolved against the writing direction and mirror state.
pub fn pattern_rect(rect: &Rect, pattern: &str, direction: Direction, mirror: bool) -> Rect {
    let start_is_right = direction.is_reversed() != mirror;
    let mut r = *rect;

    for code in pattern.chars() {
        r = match code {
            't' => r.top_half(),
            'b' => r.bottom_half(),
            's' if start_is_right => r.right_half(),
            's' => r.left_half(),
            'e' if start_is_right => r.left_half(),
            'e' => r.right_half(),
            _ => r,
        };
    }

    r
}

/// Decomposes a box frame into four slices covering outer minus inner.
///
/// The top and bottom strips span the full outer width; the side strips fill
/// the remaining band at the inner height.
pub fn frame_slices(outer: &Rect, inner: &Rect) -> [Rect; 4] {
    let top = Rect::new(outer.x, outer.y, outer.w, inner.y - outer.y);
    let bottom = Rect::new(outer.x, inner.y_max(), outer.w, outer.y_max() - inner.y_max());
    let left = Rect::new(outer.x, inner.y, inner.x - outer.x, inner.h);
    let right = Rect::new(inner.x_max(), inner.y, outer.x_max() - inner.x_max(), inner.h);

    [top, bottom, left, right]
}
