//! Ink-silhouette utilities.
//!
//! The central notion is the "external pixel": a pixel reachable from the
//! image border through unlit pixels. Enclosed background (the hollow of a
//! closed sign) is not external. The classification drives stack cutout
//! compositing and the disjointness test of the insertion search.

use crate::surface::AlphaGrid;

/// Classifies every pixel of a grid as external or not.
///
/// Alternating forward and backward sweeps propagate reachability through
/// 4-connected unlit pixels until no pixel changes state; each sweep visits
/// every pixel once, so the whole classification is bounded by the image
/// area times the number of state changes.
pub fn external(grid: &AlphaGrid) -> Vec<bool> {
    let w = grid.width();
    let h = grid.height();
    let mut ext = vec![false; w * h];

    if w == 0 || h == 0 {
        return ext;
    }

    let mut changed = true;
    while changed {
        changed = false;

        for y in 0..h {
            for x in 0..w {
                changed |= classify(grid, &mut ext, x, y);
            }
        }

        for y in (0..h).rev() {
            for x in (0..w).rev() {
                changed |= classify(grid, &mut ext, x, y);
            }
        }
    }

    ext
}

fn classify(grid: &AlphaGrid, ext: &mut [bool], x: usize, y: usize) -> bool {
    let w = grid.width();
    let h = grid.height();
    let idx = y * w + x;

    if ext[idx] || grid.has_ink(x as i32, y as i32) {
        return false;
    }

    let reachable = x == 0
        || y == 0
        || x == w - 1
        || y == h - 1
        || (x > 0 && ext[idx - 1])
        || (x < w - 1 && ext[idx + 1])
        || (y > 0 && ext[idx - w])
        || (y < h - 1 && ext[idx + w]);

    if reachable {
        ext[idx] = true;
    }
    reachable
}

/// Tests whether a piece, translated by `(dx, dy)`, only covers external
/// background of the host.
///
/// Pixels falling outside the host count as external.
pub fn disjoint(host: &AlphaGrid, ext: &[bool], piece: &AlphaGrid, dx: i32, dy: i32) -> bool {
    let hw = host.width() as i32;
    let hh = host.height() as i32;

    for py in 0..piece.height() as i32 {
        for px in 0..piece.width() as i32 {
            if !piece.has_ink(px, py) {
                continue;
            }

            let tx = px + dx;
            let ty = py + dy;
            if tx < 0 || ty < 0 || tx >= hw || ty >= hh {
                continue;
            }

            if host.has_ink(tx, ty) || !ext[(ty * hw + tx) as usize] {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::{disjoint, external};
    use crate::surface::AlphaGrid;

    /// A 5x5 ring of ink with an enclosed center.
    fn ring() -> AlphaGrid {
        let mut grid = AlphaGrid::new(5, 5);
        for i in 0..5 {
            grid.set(i, 0, 255);
            grid.set(i, 4, 255);
            grid.set(0, i, 255);
            grid.set(4, i, 255);
        }
        grid
    }

    #[test]
    fn enclosed_center_is_not_external() {
        let mut grid = ring();
        let ext = external(&grid);
        assert!(!ext[2 * 5 + 2]);

        // Open the ring and the center becomes reachable.
        grid.set(2, 0, 0);
        let ext = external(&grid);
        assert!(ext[2 * 5 + 2]);
    }

    #[test]
    fn blank_grid_is_all_external() {
        let grid = AlphaGrid::new(3, 3);
        assert!(external(&grid).iter().all(|&e| e));
    }

    #[test]
    fn disjoint_rejects_enclosed_placement() {
        let host = ring();
        let ext = external(&host);

        let mut piece = AlphaGrid::new(1, 1);
        piece.set(0, 0, 255);

        // Center of the ring: unlit but enclosed.
        assert!(!disjoint(&host, &ext, &piece, 2, 2));
        // On the ink itself.
        assert!(!disjoint(&host, &ext, &piece, 0, 0));
        // Outside the host entirely.
        assert!(disjoint(&host, &ext, &piece, 7, 7));
    }
}
