//! The freetype-backed glyph source.

use crate::fonts::{GlyphSource, GlyphStyle};
use crate::geometry::Rect;
use crate::signs;
use crate::surface::{AlphaGrid, Canvas, Color};
use crate::{Error, Result};
use freetype::{face, Face, Library, Matrix, Vector};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A hieroglyphic font face, able to measure and rasterize signs.
pub struct HieroFont {
    /// The freetype face.
    face: Face,

    /// Empirical correction factor for this family's vertical metrics.
    ///
    /// Measured against a reference glyph; treated as opaque calibration
    /// data, not derived here.
    v_calibration: f64,
}

impl HieroFont {
    fn transform(&self, style: &GlyphStyle) {
        let radians = f64::from(style.rotate) * std::f64::consts::PI / 180.0;
        let (sin, cos) = radians.sin_cos();
        let sx = style.xscale * if style.mirror { -1.0 } else { 1.0 };
        let sy = style.yscale * self.v_calibration;

        let fixed = |v: f64| (v * 65_536.0) as i64;
        let mut matrix = Matrix {
            xx: fixed(sx * cos),
            xy: fixed(-sy * sin),
            yx: fixed(sx * sin),
            yy: fixed(sy * cos),
        };
        let mut delta = Vector { x: 0, y: 0 };
        self.face.set_transform(&mut matrix, &mut delta);
    }

    fn raster(&self, name: &str, style: &GlyphStyle) -> Result<AlphaGrid> {
        let size = style.size_px.round().max(1.0) as u32;
        self.face.set_pixel_sizes(0, size)?;
        self.transform(style);

        let mut glyphs = Vec::new();
        for c in chars_for(name) {
            self.face.load_char(c as usize, face::LoadFlag::RENDER)?;
            let slot = self.face.glyph();
            let bitmap = slot.bitmap();
            let w = bitmap.width() as usize;
            let h = bitmap.rows() as usize;
            let pitch = bitmap.pitch().abs() as usize;
            let buffer = bitmap.buffer();

            let mut grid = AlphaGrid::new(w, h);
            for y in 0..h {
                for x in 0..w {
                    grid.set(x, y, buffer[y * pitch + x]);
                }
            }
            glyphs.push(grid);
        }

        Ok(join_run(&glyphs))
    }
}

// Text runs (note annotations) are laid out as a simple row; sign names
// always yield a single glyph.
fn join_run(glyphs: &[AlphaGrid]) -> AlphaGrid {
    if glyphs.len() == 1 {
        return glyphs[0].clone();
    }

    let width: usize = glyphs.iter().map(AlphaGrid::width).sum();
    let height = glyphs.iter().map(AlphaGrid::height).max().unwrap_or(0);
    let mut run = AlphaGrid::new(width, height);
    let mut offset = 0;

    for glyph in glyphs {
        let base = height - glyph.height();
        for y in 0..glyph.height() {
            for x in 0..glyph.width() {
                run.set(offset + x, base + y, glyph.get(x as i32, y as i32));
            }
        }
        offset += glyph.width();
    }

    run
}

// A sign name resolves to one codepoint, substituting the placeholder for
// unknown Gardiner codes; anything else (note text) is rendered literally.
fn chars_for(name: &str) -> Vec<char> {
    if let Some(c) = signs::lookup(name) {
        return vec![c];
    }

    let gardiner_shaped = name
        .chars()
        .next()
        .map(|c| c.is_ascii_uppercase())
        .unwrap_or(false)
        && name.chars().any(|c| c.is_ascii_digit());

    if gardiner_shaped {
        vec![signs::glyph_for(name)]
    } else {
        name.chars().collect()
    }
}

impl GlyphSource for HieroFont {
    fn measure(&self, name: &str, style: &GlyphStyle) -> Result<Rect> {
        let grid = self.raster(name, style)?;
        Ok(Rect::new(0.0, 0.0, grid.width() as f64, grid.height() as f64))
    }

    fn paint(
        &self,
        canvas: &mut Canvas,
        x: f64,
        y: f64,
        reference: &Rect,
        name: &str,
        style: &GlyphStyle,
        color: Color,
    ) -> Result<()> {
        let grid = self.raster(name, style)?;
        let scaled = resample(&grid, reference.w.round() as usize, reference.h.round() as usize);
        canvas.blit_alpha(&scaled, x.round() as i32, y.round() as i32, color);
        Ok(())
    }
}

// Nearest-neighbor resampling, for the rare case where the requested
// extents differ from the freshly rastered ones (stretched box segments).
fn resample(grid: &AlphaGrid, w: usize, h: usize) -> AlphaGrid {
    if w == grid.width() && h == grid.height() || w == 0 || h == 0 {
        return grid.clone();
    }

    let mut out = AlphaGrid::new(w, h);
    for y in 0..h {
        let sy = y * grid.height() / h;
        for x in 0..w {
            let sx = x * grid.width() / w;
            out.set(x, y, grid.get(sx as i32, sy as i32));
        }
    }
    out
}

/// Holds the loaded hieroglyphic fonts.
pub struct FontManager {
    /// The freetype library, needed to load and rasterize faces.
    library: Library,

    /// The hashmap that associates names of fonts with fonts.
    fonts: HashMap<String, HieroFont>,
}

impl FontManager {
    /// Creates an empty font manager.
    pub fn new() -> Result<FontManager> {
        Ok(FontManager {
            library: Library::init()?,
            fonts: HashMap::new(),
        })
    }

    /// Loads a font from a file and registers it under its family name.
    pub fn add_font_file<P: AsRef<Path>>(&mut self, path: P, v_calibration: f64) -> Result<()> {
        let face = self
            .library
            .new_face(path.as_ref(), 0)
            .map_err(|_| Error::FontNotFound(PathBuf::from(path.as_ref())))?;
        self.register(face, v_calibration)
    }

    /// Loads a font from a byte array and registers it under its family name.
    pub fn add_font_bytes(&mut self, bytes: &[u8], v_calibration: f64) -> Result<()> {
        let face = self.library.new_memory_face(bytes.to_vec(), 0)?;
        self.register(face, v_calibration)
    }

    fn register(&mut self, face: Face, v_calibration: f64) -> Result<()> {
        let name = match (face.family_name(), face.style_name()) {
            (Some(family), Some(style)) => format!("{} {}", family, style),
            (Some(family), None) => family,
            _ => return Err(Error::FontWithoutName),
        };

        debug!("registered font {:?}", name);
        self.fonts.insert(
            name,
            HieroFont {
                face,
                v_calibration,
            },
        );
        Ok(())
    }

    /// Returns a font if it is present in the font manager.
    pub fn get(&self, font_name: &str) -> Option<&HieroFont> {
        self.fonts.get(font_name)
    }
}
