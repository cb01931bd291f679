//! Rectangle arithmetic used throughout the engine.
//!
//! All layout computations happen on axis-aligned rectangles measured in
//! pixels (as `f64`, so fractional positions survive until paint time).

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left coordinate.
    pub x: f64,

    /// Top coordinate.
    pub y: f64,

    /// Width, never negative.
    pub w: f64,

    /// Height, never negative.
    pub h: f64,
}

impl Rect {
    /// Creates a rectangle from its top left corner and its size.
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Rect {
        Rect { x, y, w, h }
    }

    /// The rectangle of zero size at the origin.
    pub fn zero() -> Rect {
        Rect::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Returns true if the rectangle covers no area.
    pub fn is_empty(&self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }

    /// Right coordinate.
    pub fn x_max(&self) -> f64 {
        self.x + self.w
    }

    /// Bottom coordinate.
    pub fn y_max(&self) -> f64 {
        self.y + self.h
    }

    /// Area of the rectangle.
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.w * self.h
        }
    }

    /// Returns the rectangle translated by the given offsets.
    pub fn translated(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Computes the intersection of two rectangles.
    ///
    /// Disjoint rectangles intersect in an empty rectangle anchored at the
    /// would-be corner.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let x_max = self.x_max().min(other.x_max());
        let y_max = self.y_max().min(other.y_max());

        Rect::new(x, y, (x_max - x).max(0.0), (y_max - y).max(0.0))
    }

    /// Computes the smallest rectangle including both rectangles.
    ///
    /// Empty rectangles are treated as absent.
    pub fn include(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }

        if other.is_empty() {
            return *self;
        }

        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let x_max = self.x_max().max(other.x_max());
        let y_max = self.y_max().max(other.y_max());

        Rect::new(x, y, x_max - x, y_max - y)
    }

    /// Returns a rectangle of the given size centered inside this one.
    pub fn center(&self, w: f64, h: f64) -> Rect {
        Rect::new(
            self.x + (self.w - w) / 2.0,
            self.y + (self.h - h) / 2.0,
            w,
            h,
        )
    }

    /// Returns the rectangle shrunk by the four given insets.
    ///
    /// Insets larger than the rectangle yield an empty rectangle.
    pub fn inset(&self, left: f64, right: f64, top: f64, bottom: f64) -> Rect {
        Rect::new(
            self.x + left,
            self.y + top,
            (self.w - left - right).max(0.0),
            (self.h - top - bottom).max(0.0),
        )
    }

    /// Subdivides the rectangle along an axis, proportionally to the given
    /// weights.
    ///
    /// The slices tile the rectangle exactly: each slice starts where the
    /// previous one ended, and rounding never opens a gap. Zero or negative
    /// total weight yields empty slices at the leading edge.
    pub fn split(&self, weights: &[f64], horizontal: bool) -> Vec<Rect> {
        let total: f64 = weights.iter().sum();
        let length = if horizontal { self.w } else { self.h };
        let mut slices = Vec::with_capacity(weights.len());
        let mut offset = 0.0;

        for &weight in weights {
            let extent = if total > 0.0 {
                length * weight / total
            } else {
                0.0
            };

            slices.push(if horizontal {
                Rect::new(self.x + offset, self.y, extent, self.h)
            } else {
                Rect::new(self.x, self.y + offset, self.w, extent)
            });

            offset += extent;
        }

        slices
    }

    /// Keeps the top half of the rectangle.
    pub fn top_half(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h / 2.0)
    }

    /// Keeps the bottom half of the rectangle.
    pub fn bottom_half(&self) -> Rect {
        Rect::new(self.x, self.y + self.h / 2.0, self.w, self.h / 2.0)
    }

    /// Keeps the left half of the rectangle.
    pub fn left_half(&self) -> Rect {
        Rect::new(self.x, self.y, self.w / 2.0, self.h)
    }

    /// Keeps the right half of the rectangle.
    pub fn right_half(&self) -> Rect {
        Rect::new(self.x + self.w / 2.0, self.y, self.w / 2.0, self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::Rect;
    use test_case::test_case;

    #[test]
    fn intersect_overlapping() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.intersect(&b), Rect::new(5.0, 5.0, 5.0, 5.0));
    }

    #[test]
    fn intersect_disjoint_is_empty() {
        let a = Rect::new(0.0, 0.0, 4.0, 4.0);
        let b = Rect::new(10.0, 10.0, 4.0, 4.0);
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn include_covers_both() {
        let a = Rect::new(0.0, 0.0, 4.0, 4.0);
        let b = Rect::new(10.0, 2.0, 4.0, 4.0);
        let u = a.include(&b);
        assert_eq!(u, Rect::new(0.0, 0.0, 14.0, 6.0));
    }

    #[test]
    fn include_ignores_empty() {
        let a = Rect::new(3.0, 3.0, 4.0, 4.0);
        assert_eq!(a.include(&Rect::zero()), a);
        assert_eq!(Rect::zero().include(&a), a);
    }

    #[test]
    fn center_is_symmetric() {
        let outer = Rect::new(0.0, 0.0, 10.0, 10.0);
        let inner = outer.center(4.0, 6.0);
        assert_eq!(inner, Rect::new(3.0, 2.0, 4.0, 6.0));
    }

    #[test]
    fn split_tiles_exactly() {
        let r = Rect::new(0.0, 0.0, 12.0, 3.0);
        let slices = r.split(&[1.0, 2.0, 1.0], true);
        assert_eq!(slices[0].w, 3.0);
        assert_eq!(slices[1].w, 6.0);
        assert_eq!(slices[2].w, 3.0);
        assert_eq!(slices[2].x_max(), 12.0);
    }

    #[test_case(0.0, 0.0 ; "zero weights")]
    fn split_degenerate(w1: f64, w2: f64) {
        let r = Rect::new(0.0, 0.0, 12.0, 3.0);
        let slices = r.split(&[w1, w2], true);
        assert!(slices.iter().all(Rect::is_empty));
    }

    #[test]
    fn halves_tile_the_rect() {
        let r = Rect::new(2.0, 4.0, 8.0, 6.0);
        assert_eq!(r.top_half().area() + r.bottom_half().area(), r.area());
        assert_eq!(r.left_half().include(&r.right_half()), r);
    }
}
