//! Engine settings.
//!
//! Every tunable constant of the engine lives here, so a render request can
//! carry its own overrides. Settings deserialize from a `seshat.toml` with
//! any subset of the fields present; omitted fields keep their defaults.

use crate::Result;
use serde::{Deserialize, Serialize};

/// The tunable constants of the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Nominal em size in pixels.
    pub em_px: f64,

    /// Width of one separation unit between groups, in ems.
    pub op_sep_em: f64,

    /// Default separation inside boxes, in ems.
    pub box_sep_em: f64,

    /// Cap on pixel-fitted separations, in ems.
    pub max_fit_em: f64,

    /// Distance between hatch lines, in pixels.
    pub shade_spacing_px: f64,

    /// Gap below which collinear hatch segments merge, in pixels.
    pub shade_tolerance_px: f64,

    /// Width of a hatch line, in pixels.
    pub shade_width_px: f64,

    /// Maximum number of rescale steps when shrinking oversized groups.
    pub iterate_limit: u32,

    /// Scale below which the shrink loop gives up.
    pub scale_floor: f64,

    /// Multiplicative growth schedule of the insertion search.
    pub insert_growth: Vec<f64>,

    /// Initial scale tried for an inserted glyph.
    pub insert_initial: f64,

    /// Anchor step below which the free placement search stops.
    pub insert_min_step: f64,

    /// Minimal margin reserved around a rendered fragment, in pixels.
    pub margin_px: u32,

    /// Size of note annotations, in ems.
    pub note_em: f64,

    /// Overlap between tiled box segment glyphs, in pixels.
    pub segment_overlap_px: f64,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            em_px: 36.0,
            op_sep_em: 0.15,
            box_sep_em: 0.1,
            max_fit_em: 0.45,
            shade_spacing_px: 4.0,
            shade_tolerance_px: 1.5,
            shade_width_px: 1.0,
            iterate_limit: 4,
            scale_floor: 0.02,
            insert_growth: vec![1.5, 1.25, 1.1, 1.05],
            insert_initial: 0.25,
            insert_min_step: 0.02,
            margin_px: 2,
            note_em: 0.35,
            segment_overlap_px: 1.0,
        }
    }
}

impl Settings {
    /// Parses settings from the content of a `seshat.toml`.
    pub fn from_toml(content: &str) -> Result<Settings> {
        Ok(toml::from_str(content)?)
    }

    /// One separation unit in pixels.
    pub fn op_sep_px(&self) -> f64 {
        self.op_sep_em * self.em_px
    }

    /// The fitting cap in pixels.
    pub fn max_fit_px(&self) -> f64 {
        self.max_fit_em * self.em_px
    }
}

#[cfg(test)]
mod tests {
    use super::Settings;

    #[test]
    fn defaults_are_consistent() {
        let settings = Settings::default();
        assert!(settings.op_sep_px() > 0.0);
        assert!(settings.max_fit_px() > settings.op_sep_px());
        assert!(settings.scale_floor < 1.0);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = Settings::from_toml("em_px = 48.0\niterate_limit = 6\n").unwrap();
        assert_eq!(settings.em_px, 48.0);
        assert_eq!(settings.iterate_limit, 6);
        assert_eq!(settings.op_sep_em, Settings::default().op_sep_em);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(Settings::from_toml("em_px = \"wide\"").is_err());
    }
}
