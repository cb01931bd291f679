//! This crate contains all the tools we need to compose hieroglyphic
//! inscriptions.
//!
//! An inscription is described as a tree of groups ([`tree`]): rows,
//! columns, cartouche-like boxes, overlays, decorative insertions and named
//! signs, resolved against a glyph provider ([`fonts`]). The layout engine
//! ([`layout`]) assigns every node a size and dynamic scale, computes
//! separations by inspecting actual rendered pixels, and paints the result
//! onto a raster canvas ([`surface`]).

#![warn(missing_docs)]

#[macro_use]
extern crate log;

pub mod config;
pub mod fonts;
pub mod geometry;
pub mod layout;
pub mod signs;
pub mod surface;
pub mod tree;

use std::path::PathBuf;
use std::{error, fmt, io, result};

macro_rules! impl_from_error {
    ($type: ty, $variant: path, $from: ty) => {
        impl From<$from> for $type {
            fn from(e: $from) -> $type {
                $variant(e)
            }
        }
    };
}

/// The error type of the library.
#[derive(Debug)]
pub enum Error {
    /// A canvas with a zero or overflowing pixel size was requested.
    SurfaceSize(u32, u32),

    /// Error while dealing with freetype.
    FreetypeError(freetype::Error),

    /// The settings file could not be parsed.
    ConfigError(toml::de::Error),

    /// The specified font was not found.
    FontNotFound(PathBuf),

    /// The specified font has no family name.
    FontWithoutName,

    /// Another io error occured.
    IoError(io::Error),
}

impl_from_error!(Error, Error::FreetypeError, freetype::Error);
impl_from_error!(Error, Error::ConfigError, toml::de::Error);
impl_from_error!(Error, Error::IoError, io::Error);

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SurfaceSize(w, h) => write!(fmt, "cannot create a {}x{} surface", w, h),
            Error::FreetypeError(e) => write!(fmt, "freetype error: {}", e),
            Error::ConfigError(e) => write!(fmt, "couldn't parse settings: {}", e),
            Error::FontNotFound(path) => write!(fmt, "couldn't find font \"{}\"", path.display()),
            Error::FontWithoutName => write!(fmt, "font has no family name"),
            Error::IoError(e) => write!(fmt, "an io error occured: {}", e),
        }
    }
}

impl error::Error for Error {}

/// The result type of the library.
pub type Result<T> = result::Result<T, Error>;
