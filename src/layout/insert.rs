//! The decorative-insertion placement search.
//!
//! An inserted glyph is grown into the whitespace of its host: starting
//! from an initial scale, the search multiplies the scale by a shrinking
//! schedule of growth factors for as long as the secondary's aura-padded
//! silhouette stays disjoint from the host ink. For free-floating
//! insertions, the anchor fraction additionally hill-climbs in eight
//! directions with a halving step. The search is a bounded schedule and
//! always terminates with a best-effort placement; the chosen scale never
//! decreases once the climb has started.

use crate::layout::silhouette;
use crate::surface::AlphaGrid;
use crate::tree::Place;
use crate::Result;

/// The eight unit steps of the anchor search.
static DIRECTIONS: &[(f64, f64)] = &[
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (1.0, 1.0),
    (1.0, -1.0),
    (-1.0, 1.0),
    (-1.0, -1.0),
];

/// The outcome of a placement search.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Placement {
    /// The stable scale found for the secondary.
    pub scale: f64,

    /// Horizontal anchor fraction.
    pub x: f64,

    /// Vertical anchor fraction.
    pub y: f64,
}

/// Renders the secondary at a candidate scale.
///
/// Returns the aura-padded silhouette together with the padding applied on
/// each side, so the search can anchor the un-padded extents.
pub type PieceAt<'a> = dyn FnMut(f64) -> Result<(AlphaGrid, i32)> + 'a;

/// Parameters of one placement search.
pub struct Search<'a> {
    /// The host silhouette.
    pub host: &'a AlphaGrid,

    /// External-pixel classification of the host.
    pub ext: &'a [bool],

    /// Where the secondary goes.
    pub place: Place,

    /// Initial anchor for free placement.
    pub x: f64,

    /// Initial anchor for free placement.
    pub y: f64,

    /// Scale to start the climb from.
    pub initial: f64,

    /// Scale below which the shrink phase gives up.
    pub floor: f64,

    /// Multiplicative growth schedule.
    pub growth: &'a [f64],

    /// Anchor step below which the position search stops.
    pub min_step: f64,
}

impl<'a> Search<'a> {
    /// Runs the search.
    pub fn run(&self, piece_at: &mut PieceAt) -> Result<Placement> {
        match self.place.anchor() {
            Some((x, y)) => {
                let scale = self
                    .climb(x, y, self.initial, piece_at)?
                    .unwrap_or_else(|| {
                        warn!("no disjoint placement found at {:?}", self.place);
                        self.floor
                    });
                Ok(Placement { scale, x, y })
            }
            None => self.free(piece_at),
        }
    }

    /// Tests whether the secondary fits at a scale and anchor.
    fn fits(&self, scale: f64, x: f64, y: f64, piece_at: &mut PieceAt) -> Result<bool> {
        let (aura, pad) = piece_at(scale)?;
        let pw = aura.width() as i32 - 2 * pad;
        let ph = aura.height() as i32 - 2 * pad;

        // A secondary larger than the host box never fits; this also bounds
        // the climb when the host has no ink at all.
        if pw > self.host.width() as i32 || ph > self.host.height() as i32 {
            return Ok(false);
        }

        let dx = (x * (self.host.width() as f64 - f64::from(pw))).round() as i32 - pad;
        let dy = (y * (self.host.height() as f64 - f64::from(ph))).round() as i32 - pad;

        Ok(silhouette::disjoint(self.host, self.ext, &aura, dx, dy))
    }

    /// Hill-climbs the scale at a fixed anchor.
    ///
    /// Returns the largest stable scale, or `None` when even the smallest
    /// tried scale collides.
    fn climb(
        &self,
        x: f64,
        y: f64,
        start: f64,
        piece_at: &mut PieceAt,
    ) -> Result<Option<f64>> {
        let mut scale = start;

        if !self.fits(scale, x, y, piece_at)? {
            loop {
                scale *= 0.8;
                if scale < self.floor {
                    return Ok(None);
                }
                if self.fits(scale, x, y, piece_at)? {
                    break;
                }
            }
        }

        for &factor in self.growth {
            while self.fits(scale * factor, x, y, piece_at)? {
                scale *= factor;
            }
        }

        Ok(Some(scale))
    }

    /// Free placement: hill-climbs the anchor with a halving step,
    /// accepting moves that allow a larger stable scale.
    fn free(&self, piece_at: &mut PieceAt) -> Result<Placement> {
        let mut x = self.x;
        let mut y = self.y;
        let mut best = match self.climb(x, y, self.initial, piece_at)? {
            Some(scale) => scale,
            None => self.floor,
        };

        let mut step = 0.25;
        while step >= self.min_step {
            let mut moved = false;

            for &(dx, dy) in DIRECTIONS {
                let cx = (x + dx * step).max(0.0).min(1.0);
                let cy = (y + dy * step).max(0.0).min(1.0);
                if (cx, cy) == (x, y) {
                    continue;
                }

                // Only a move that sustains the current scale and improves
                // on it is accepted, so the chosen scale never decreases.
                if !self.fits(best, cx, cy, piece_at)? {
                    continue;
                }

                if let Some(scale) = self.climb(cx, cy, best, piece_at)? {
                    if scale > best {
                        x = cx;
                        y = cy;
                        best = scale;
                        moved = true;
                        break;
                    }
                }
            }

            if !moved {
                step /= 2.0;
            }
        }

        Ok(Placement { scale: best, x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::{Placement, Search};
    use crate::layout::silhouette::external;
    use crate::surface::AlphaGrid;
    use crate::tree::Place;
    use crate::Result;

    /// A host with ink along its top edge only.
    fn top_bar_host(w: usize, h: usize) -> AlphaGrid {
        let mut grid = AlphaGrid::new(w, h);
        for x in 0..w {
            grid.set(x, 0, 255);
            grid.set(x, 1, 255);
        }
        grid
    }

    /// Renders a solid square secondary of `scale * 16` pixels, plus pad.
    fn square_piece(scale: f64) -> Result<(AlphaGrid, i32)> {
        let pad = 1;
        let side = (scale * 16.0).round().max(1.0) as usize;
        let mut grid = AlphaGrid::new(side + 2, side + 2);
        for y in 0..side {
            for x in 0..side {
                grid.set(x + 1, y + 1, 255);
            }
        }
        Ok((grid, pad))
    }

    fn search<'a>(host: &'a AlphaGrid, ext: &'a [bool], place: Place) -> Search<'a> {
        Search {
            host,
            ext,
            place,
            x: 0.5,
            y: 0.5,
            initial: 0.25,
            floor: 0.02,
            growth: &[1.5, 1.25, 1.1, 1.05],
            min_step: 0.05,
        }
    }

    #[test]
    fn bottom_placement_grows_into_free_space() {
        let host = top_bar_host(32, 32);
        let ext = external(&host);
        let outcome = search(&host, &ext, Place::BottomStart)
            .run(&mut square_piece)
            .unwrap();

        // Most of the host is empty; the square grows well beyond its
        // initial scale without colliding with the top bar.
        assert!(outcome.scale > 0.25);
        assert_eq!((outcome.x, outcome.y), (0.0, 1.0));
    }

    #[test]
    fn crowded_host_shrinks_first() {
        // Host almost fully inked except a 3x3 corner.
        let mut host = AlphaGrid::new(24, 24);
        for y in 0..24 {
            for x in 0..24 {
                if !(x >= 21 && y >= 21) {
                    host.set(x, y, 255);
                }
            }
        }
        let ext = external(&host);
        let outcome = search(&host, &ext, Place::BottomEnd)
            .run(&mut square_piece)
            .unwrap();

        assert!(outcome.scale < 0.25);
        assert!(outcome.scale >= 0.02);
    }

    #[test]
    fn blank_host_climb_stops_at_the_host_box() {
        // No ink anywhere, so every candidate placement is disjoint.
        let host = AlphaGrid::new(32, 32);
        let ext = external(&host);
        let outcome = search(&host, &ext, Place::TopStart)
            .run(&mut square_piece)
            .unwrap();

        // The climb terminates once the square outgrows the host instead
        // of diverging.
        assert!(outcome.scale * 16.0 <= 32.5);
        assert!(outcome.scale > 1.0);
    }

    #[test]
    fn free_search_reports_an_anchor() {
        let host = top_bar_host(32, 32);
        let ext = external(&host);
        let outcome: Placement = search(&host, &ext, Place::Free)
            .run(&mut square_piece)
            .unwrap();

        assert!(outcome.scale > 0.0);
        assert!((0.0..=1.0).contains(&outcome.x));
        assert!((0.0..=1.0).contains(&outcome.y));
    }
}
