//! The pixel-fitting sub-algorithm.
//!
//! Fit operators do not separate groups by a fixed multiple of the
//! separation unit; they measure the real ink of both neighbors and compute
//! the smallest gap (possibly negative) that keeps a constant clearance
//! between the silhouettes. The result is a deterministic function of the
//! two ink silhouettes and the two scalars.

use crate::surface::{AlphaGrid, Canvas};
use crate::Result;

/// Computes the fitted gap between two pieces abutting horizontally.
///
/// `a` is the leading piece, `b` the trailing one; both grids must span the
/// same rows (the shared cross axis). `sep_init` is the nominal clearance
/// to keep between the silhouettes and `sep_max` caps the result in both
/// directions. Rows where either piece has no ink near the shared edge do
/// not constrain the gap; if no row qualifies, the pieces may overlap up to
/// `-sep_max`.
pub fn fit_hor(a: &AlphaGrid, b: &AlphaGrid, sep_init: f64, sep_max: f64) -> Result<f64> {
    let radius = sep_init.round().max(0.0) as i32;
    let aura = aura_of(b, radius)?;
    let pad = radius + 1;

    let mut gap: Option<f64> = None;
    let rows = a.height().min(b.height());

    for y in 0..rows {
        let last = match a.last_ink_in_row(y) {
            Some(x) => x as i32,
            None => continue,
        };

        let first = match aura.first_ink_in_row(y + pad as usize) {
            Some(x) => x as i32 - pad,
            None => continue,
        };

        // The smallest gap keeping A's ink and B's aura from touching on
        // this row.
        let required = f64::from(last + 1 - a.width() as i32 - first);
        gap = Some(match gap {
            Some(g) => g.max(required),
            None => required,
        });
    }

    let gap = match gap {
        Some(g) => g,
        None => {
            debug!("no facing ink rows; falling back to maximal overlap");
            -sep_max
        }
    };

    Ok(gap.max(-sep_max).min(sep_max))
}

/// Computes the fitted gap between two pieces abutting vertically.
///
/// Same contract as [`fit_hor`], with `a` above `b` and the grids spanning
/// the same columns.
pub fn fit_vert(a: &AlphaGrid, b: &AlphaGrid, sep_init: f64, sep_max: f64) -> Result<f64> {
    fit_hor(&a.transposed(), &b.transposed(), sep_init, sep_max)
}

/// Rasterizes the constant-radius aura around the near-edge ink of a piece.
///
/// For every row, a disk is stamped on the first ink pixel seen from the
/// shared edge; the union of the disks approximates the edge contour padded
/// by the clearance radius. The aura grid is the piece padded by
/// `radius + 1` on every side.
pub fn aura_of(piece: &AlphaGrid, radius: i32) -> Result<AlphaGrid> {
    let pad = radius + 1;
    let mut canvas = Canvas::new(
        piece.width() as u32 + 2 * pad as u32,
        piece.height() as u32 + 2 * pad as u32,
    )?;

    for y in 0..piece.height() {
        if let Some(x) = piece.first_ink_in_row(y) {
            canvas.stamp_disk(
                (x as i32 + pad) as f64 + 0.5,
                (y as i32 + pad) as f64 + 0.5,
                f64::from(radius),
            );
        }
    }

    Ok(canvas.ink())
}

/// Rasterizes the aura around the whole outline of a piece, for the
/// insertion search.
///
/// Disks are stamped on the first and last ink pixels of every row and
/// every column.
pub fn outline_aura(piece: &AlphaGrid, radius: i32) -> Result<AlphaGrid> {
    let pad = radius + 1;
    let mut canvas = Canvas::new(
        piece.width() as u32 + 2 * pad as u32,
        piece.height() as u32 + 2 * pad as u32,
    )?;

    let mut stamp = |x: usize, y: usize| {
        canvas.stamp_disk(
            (x as i32 + pad) as f64 + 0.5,
            (y as i32 + pad) as f64 + 0.5,
            f64::from(radius),
        );
    };

    for y in 0..piece.height() {
        if let Some(x) = piece.first_ink_in_row(y) {
            stamp(x, y);
        }
        if let Some(x) = piece.last_ink_in_row(y) {
            stamp(x, y);
        }
    }

    let t = piece.transposed();
    for x in 0..t.height() {
        if let Some(y) = t.first_ink_in_row(x) {
            stamp(x, y);
        }
        if let Some(y) = t.last_ink_in_row(x) {
            stamp(x, y);
        }
    }

    Ok(canvas.ink())
}

#[cfg(test)]
mod tests {
    use super::{fit_hor, fit_vert};
    use crate::surface::AlphaGrid;

    fn solid(w: usize, h: usize) -> AlphaGrid {
        let mut grid = AlphaGrid::new(w, h);
        for y in 0..h {
            for x in 0..w {
                grid.set(x, y, 255);
            }
        }
        grid
    }

    /// Ink only in the bottom rows.
    fn low_block(w: usize, h: usize, ink_rows: usize) -> AlphaGrid {
        let mut grid = AlphaGrid::new(w, h);
        for y in h - ink_rows..h {
            for x in 0..w {
                grid.set(x, y, 255);
            }
        }
        grid
    }

    #[test]
    fn flat_edges_keep_nominal_clearance() {
        let a = solid(10, 10);
        let b = solid(10, 10);
        let gap = fit_hor(&a, &b, 4.0, 16.0).unwrap();
        assert!((gap - 4.0).abs() <= 1.0, "gap = {}", gap);
    }

    #[test]
    fn zero_separation_never_overlaps_flat_edges() {
        let a = solid(10, 10);
        let b = solid(10, 10);
        let gap = fit_hor(&a, &b, 0.0, 16.0).unwrap();
        assert_eq!(gap, 0.0);
    }

    #[test]
    fn result_is_clamped_to_the_cap() {
        let a = solid(10, 10);
        let b = solid(10, 10);
        let gap = fit_hor(&a, &b, 8.0, 3.0).unwrap();
        assert_eq!(gap, 3.0);
    }

    #[test]
    fn no_facing_ink_allows_maximal_overlap() {
        // A has ink only at the top, B only at the bottom; no row has both.
        let mut a = AlphaGrid::new(10, 10);
        for x in 0..10 {
            a.set(x, 0, 255);
        }
        let b = low_block(10, 10, 1);
        let gap = fit_hor(&a, &b, 2.0, 6.0).unwrap();
        assert_eq!(gap, -6.0);
    }

    #[test]
    fn partial_overlap_tucks_pieces_together() {
        // A is a full block, B has ink only in its bottom third; the fitted
        // gap is bounded by the rows where both have ink, so it stays at the
        // nominal clearance, never less.
        let a = solid(10, 9);
        let b = low_block(10, 9, 3);
        let gap = fit_hor(&a, &b, 2.0, 12.0).unwrap();
        assert!((gap - 2.0).abs() <= 1.0, "gap = {}", gap);
    }

    #[test]
    fn vertical_fit_matches_transposed_horizontal() {
        let a = solid(10, 4);
        let b = solid(10, 4);
        let v = fit_vert(&a, &b, 3.0, 9.0).unwrap();
        assert!((v - 3.0).abs() <= 1.0, "gap = {}", v);
    }
}
