//! Call-scoped raster surfaces.
//!
//! Every pass that needs to look at real ink (pixel fitting, insertion
//! search, stack cutouts) rasterizes onto a [`Canvas`] and reads the result
//! back as an [`AlphaGrid`]. Canvases are created, used and discarded within
//! one layout or render invocation, never shared.

use crate::geometry::Rect;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tiny_skia::{
    FillRule, Paint, PathBuilder, Pixmap, PixmapPaint, PremultipliedColorU8, Stroke, Transform,
};

/// Alpha values at or above this count as ink.
pub const INK: u8 = 16;

/// An RGB color, as carried by glyphs, switches and notes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    /// Red component.
    pub r: u8,

    /// Green component.
    pub g: u8,

    /// Blue component.
    pub b: u8,
}

impl Color {
    /// The default ink color.
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    /// Red, traditionally used for rubrics.
    pub const RED: Color = Color { r: 190, g: 0, b: 0 };

    /// Green.
    pub const GREEN: Color = Color { r: 0, g: 140, b: 0 };

    /// Blue, the conventional color for reconstructed signs.
    pub const BLUE: Color = Color { r: 0, g: 0, b: 190 };

    /// White.
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    /// The color used for hatching.
    pub const SHADE: Color = Color {
        r: 110,
        g: 110,
        b: 110,
    };
}

/// A scratch raster surface.
pub struct Canvas {
    pixmap: Pixmap,
}

impl Canvas {
    /// Allocates a transparent canvas of the given pixel size.
    pub fn new(width: u32, height: u32) -> Result<Canvas> {
        match Pixmap::new(width, height) {
            Some(pixmap) => Ok(Canvas { pixmap }),
            None => Err(Error::SurfaceSize(width, height)),
        }
    }

    /// Width of the canvas in pixels.
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    /// Height of the canvas in pixels.
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn solid_paint(color: Color) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, 255);
        paint.anti_alias = false;
        paint
    }

    /// Fills a rectangle with a solid color.
    pub fn fill_rect(&mut self, rect: &Rect, color: Color) {
        if rect.is_empty() {
            return;
        }

        if let Some(r) = tiny_skia::Rect::from_xywh(
            rect.x as f32,
            rect.y as f32,
            rect.w as f32,
            rect.h as f32,
        ) {
            self.pixmap
                .fill_rect(r, &Self::solid_paint(color), Transform::identity(), None);
        }
    }

    /// Strokes the outline of a rectangle.
    pub fn frame_rect(&mut self, rect: &Rect, color: Color, thickness: f64) {
        if rect.is_empty() {
            return;
        }

        let mut pb = PathBuilder::new();
        pb.push_rect(match tiny_skia::Rect::from_xywh(
            rect.x as f32,
            rect.y as f32,
            rect.w as f32,
            rect.h as f32,
        ) {
            Some(r) => r,
            None => return,
        });

        if let Some(path) = pb.finish() {
            let stroke = Stroke {
                width: thickness as f32,
                ..Stroke::default()
            };
            self.pixmap.stroke_path(
                &path,
                &Self::solid_paint(color),
                &stroke,
                Transform::identity(),
                None,
            );
        }
    }

    /// Draws a straight line segment of the given width.
    pub fn line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, width: f64, color: Color) {
        let mut pb = PathBuilder::new();
        pb.move_to(x0 as f32, y0 as f32);
        pb.line_to(x1 as f32, y1 as f32);

        if let Some(path) = pb.finish() {
            let stroke = Stroke {
                width: width as f32,
                ..Stroke::default()
            };
            self.pixmap.stroke_path(
                &path,
                &Self::solid_paint(color),
                &stroke,
                Transform::identity(),
                None,
            );
        }
    }

    /// Stamps an opaque disk, used to rasterize fitting auras.
    ///
    /// A zero radius stamps a single pixel.
    pub fn stamp_disk(&mut self, cx: f64, cy: f64, radius: f64) {
        if radius < 0.5 {
            self.fill_rect(
                &Rect::new(cx.floor(), cy.floor(), 1.0, 1.0),
                Color::BLACK,
            );
            return;
        }

        if let Some(path) = PathBuilder::from_circle(cx as f32, cy as f32, radius as f32) {
            self.pixmap.fill_path(
                &path,
                &Self::solid_paint(Color::BLACK),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    /// Composites another canvas onto this one with source-over blending.
    pub fn blit(&mut self, other: &Canvas, dx: i32, dy: i32) {
        self.pixmap.draw_pixmap(
            dx,
            dy,
            other.pixmap.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    /// Composites another canvas, keeping only pixels allowed by the mask.
    ///
    /// The mask is indexed in the source canvas coordinates and must cover
    /// it entirely.
    pub fn blit_masked(&mut self, other: &Canvas, dx: i32, dy: i32, keep: &[bool]) {
        let sw = other.width() as i32;
        let sh = other.height() as i32;
        let dw = self.width() as i32;
        let dh = self.height() as i32;
        let src = other.pixmap.pixels();
        let dst = self.pixmap.pixels_mut();

        for sy in 0..sh {
            for sx in 0..sw {
                if !keep[(sy * sw + sx) as usize] {
                    continue;
                }

                let tx = sx + dx;
                let ty = sy + dy;
                if tx < 0 || ty < 0 || tx >= dw || ty >= dh {
                    continue;
                }

                let s = src[(sy * sw + sx) as usize];
                if s.alpha() == 0 {
                    continue;
                }

                let d = &mut dst[(ty * dw + tx) as usize];
                *d = over(s, *d);
            }
        }
    }

    /// Blends an alpha coverage grid tinted with a color.
    pub fn blit_alpha(&mut self, grid: &AlphaGrid, dx: i32, dy: i32, color: Color) {
        let dw = self.width() as i32;
        let dh = self.height() as i32;
        let dst = self.pixmap.pixels_mut();

        for sy in 0..grid.height() as i32 {
            for sx in 0..grid.width() as i32 {
                let coverage = grid.get(sx, sy);
                if coverage == 0 {
                    continue;
                }

                let tx = sx + dx;
                let ty = sy + dy;
                if tx < 0 || ty < 0 || tx >= dw || ty >= dh {
                    continue;
                }

                let s = premultiplied(color, coverage);
                let d = &mut dst[(ty * dw + tx) as usize];
                *d = over(s, *d);
            }
        }
    }

    /// Reads back the ink alpha of a region.
    ///
    /// Pixels outside the canvas read as blank.
    pub fn read_ink(&self, x: i32, y: i32, w: u32, h: u32) -> AlphaGrid {
        let mut grid = AlphaGrid::new(w as usize, h as usize);
        let cw = self.width() as i32;
        let ch = self.height() as i32;
        let pixels = self.pixmap.pixels();

        for gy in 0..h as i32 {
            let sy = y + gy;
            if sy < 0 || sy >= ch {
                continue;
            }

            for gx in 0..w as i32 {
                let sx = x + gx;
                if sx < 0 || sx >= cw {
                    continue;
                }

                grid.set(gx as usize, gy as usize, pixels[(sy * cw + sx) as usize].alpha());
            }
        }

        grid
    }

    /// Reads back the full canvas as an alpha grid.
    pub fn ink(&self) -> AlphaGrid {
        self.read_ink(0, 0, self.width(), self.height())
    }
}

fn premultiplied(color: Color, alpha: u8) -> PremultipliedColorU8 {
    let a = alpha as u32;
    let r = (color.r as u32 * a / 255) as u8;
    let g = (color.g as u32 * a / 255) as u8;
    let b = (color.b as u32 * a / 255) as u8;

    PremultipliedColorU8::from_rgba(r, g, b, alpha).unwrap_or(PremultipliedColorU8::TRANSPARENT)
}

fn over(s: PremultipliedColorU8, d: PremultipliedColorU8) -> PremultipliedColorU8 {
    let inv = 255 - s.alpha() as u32;
    let r = s.red() as u32 + d.red() as u32 * inv / 255;
    let g = s.green() as u32 + d.green() as u32 * inv / 255;
    let b = s.blue() as u32 + d.blue() as u32 * inv / 255;
    let a = s.alpha() as u32 + d.alpha() as u32 * inv / 255;

    PremultipliedColorU8::from_rgba(
        r.min(255) as u8,
        g.min(255) as u8,
        b.min(255) as u8,
        a.min(255) as u8,
    )
    .unwrap_or(PremultipliedColorU8::TRANSPARENT)
}

/// A rectangular grid of ink alpha values.
#[derive(Clone, Debug)]
pub struct AlphaGrid {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl AlphaGrid {
    /// Creates a blank grid.
    pub fn new(width: usize, height: usize) -> AlphaGrid {
        AlphaGrid {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Width of the grid.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the grid.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Alpha at a position, blank outside the grid.
    pub fn get(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            0
        } else {
            self.data[y as usize * self.width + x as usize]
        }
    }

    /// Sets the alpha at a position.
    pub fn set(&mut self, x: usize, y: usize, alpha: u8) {
        self.data[y * self.width + x] = alpha;
    }

    /// Returns true if the position holds ink.
    pub fn has_ink(&self, x: i32, y: i32) -> bool {
        self.get(x, y) >= INK
    }

    /// Returns true if no pixel of the grid holds ink.
    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&a| a < INK)
    }

    /// Column of the first ink pixel of a row, scanning from the left.
    pub fn first_ink_in_row(&self, y: usize) -> Option<usize> {
        (0..self.width).find(|&x| self.has_ink(x as i32, y as i32))
    }

    /// Column of the last ink pixel of a row, scanning from the right.
    pub fn last_ink_in_row(&self, y: usize) -> Option<usize> {
        (0..self.width).rev().find(|&x| self.has_ink(x as i32, y as i32))
    }

    /// Returns the grid with rows and columns exchanged.
    ///
    /// Vertical fitting reuses the horizontal scan on transposed grids.
    pub fn transposed(&self) -> AlphaGrid {
        let mut out = AlphaGrid::new(self.height, self.width);

        for y in 0..self.height {
            for x in 0..self.width {
                out.set(y, x, self.data[y * self.width + x]);
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::{AlphaGrid, Canvas, Color, INK};
    use crate::geometry::Rect;

    #[test]
    fn fill_and_read_back() {
        let mut canvas = Canvas::new(10, 10).unwrap();
        canvas.fill_rect(&Rect::new(2.0, 3.0, 4.0, 2.0), Color::BLACK);

        let ink = canvas.ink();
        assert!(ink.has_ink(2, 3));
        assert!(ink.has_ink(5, 4));
        assert!(!ink.has_ink(1, 3));
        assert!(!ink.has_ink(2, 5));
    }

    #[test]
    fn read_ink_outside_is_blank() {
        let canvas = Canvas::new(4, 4).unwrap();
        let grid = canvas.read_ink(-2, -2, 8, 8);
        assert!(grid.is_blank());
    }

    #[test]
    fn disk_radius_zero_is_one_pixel() {
        let mut canvas = Canvas::new(5, 5).unwrap();
        canvas.stamp_disk(2.0, 2.0, 0.0);

        let ink = canvas.ink();
        let lit = (0..5)
            .flat_map(|y| (0..5).map(move |x| (x, y)))
            .filter(|&(x, y)| ink.has_ink(x, y))
            .count();
        assert_eq!(lit, 1);
        assert!(ink.has_ink(2, 2));
    }

    #[test]
    fn row_scans_find_extremes() {
        let mut grid = AlphaGrid::new(6, 1);
        grid.set(2, 0, 255);
        grid.set(4, 0, 255);
        assert_eq!(grid.first_ink_in_row(0), Some(2));
        assert_eq!(grid.last_ink_in_row(0), Some(4));
        assert_eq!(grid.first_ink_in_row(0).map(|_| INK >= 16), Some(true));
    }

    #[test]
    fn transpose_swaps_axes() {
        let mut grid = AlphaGrid::new(3, 2);
        grid.set(2, 1, 255);
        let t = grid.transposed();
        assert!(t.has_ink(1, 2));
        assert_eq!(t.width(), 2);
        assert_eq!(t.height(), 3);
    }

    #[test]
    fn masked_blit_respects_mask() {
        let mut src = Canvas::new(2, 1).unwrap();
        src.fill_rect(&Rect::new(0.0, 0.0, 2.0, 1.0), Color::BLACK);

        let mut dst = Canvas::new(2, 1).unwrap();
        dst.blit_masked(&src, 0, 0, &[true, false]);

        let ink = dst.ink();
        assert!(ink.has_ink(0, 0));
        assert!(!ink.has_ink(1, 0));
    }
}
