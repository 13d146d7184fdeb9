//! Raster processing collaborators.
//!
//! The tiler never touches pixels itself. Measuring, downscaling,
//! normalising and cropping are delegated to a [`RasterProcessor`]:
//!
//! - [`NativeProcessor`]: pure Rust, built on the `image` crate
//! - [`MagickProcessor`]: shells out to ImageMagick or GraphicsMagick
//!
//! Both produce tiles named `<stem>_tile_<NNN>.jpg` in row-major order.

mod magick;
mod native;

pub use magick::MagickProcessor;
pub use native::NativeProcessor;

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::geo::{GeoError, RasterDimensions};

/// Nominal tile edge length in pixels.
///
/// Tiles above one megapixel add no resolution on the device.
pub const TILE_SIZE: u32 = 1024;

/// Default JPEG quality for re-encoded images.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Operations the packaging pipeline needs from an image toolkit.
pub trait RasterProcessor: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Verifies that any external programs are installed.
    fn check_available(&self) -> Result<(), RasterError> {
        Ok(())
    }

    /// Returns the pixel size of an image.
    fn measure_dimensions(&self, path: &Path) -> Result<RasterDimensions, RasterError>;

    /// Writes a copy of `input` scaled down to at most `max_pixels` pixels,
    /// preserving aspect ratio.
    fn resize_to_pixel_budget(
        &self,
        input: &Path,
        max_pixels: u64,
        output: &Path,
    ) -> Result<(), RasterError>;

    /// Writes a copy of `input` as a baseline (non-progressive) JPEG with
    /// all metadata stripped.
    fn normalize_for_device(&self, input: &Path, output: &Path) -> Result<(), RasterError>;

    /// Cuts `input` into `tile`-sized JPEGs in `output_dir`, row-major.
    ///
    /// Tiles on the right and bottom edges are smaller when the image size
    /// is not a multiple of the tile size. Returns tile paths in crop order.
    fn crop_to_grid(
        &self,
        input: &Path,
        tile: RasterDimensions,
        output_dir: &Path,
        stem: &str,
    ) -> Result<Vec<PathBuf>, RasterError>;
}

/// Which raster backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RasterBackend {
    /// Built-in `image` crate processing.
    #[default]
    Native,
    /// ImageMagick / GraphicsMagick command-line tools.
    Magick,
}

impl RasterBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            RasterBackend::Native => "native",
            RasterBackend::Magick => "magick",
        }
    }
}

impl fmt::Display for RasterBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RasterBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(RasterBackend::Native),
            "magick" | "imagemagick" => Ok(RasterBackend::Magick),
            other => Err(format!(
                "unknown raster backend '{}' (expected 'native' or 'magick')",
                other
            )),
        }
    }
}

/// Errors from raster processing.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("'{tool}' command not found: {source}. Install ImageMagick (e.g. 'apt install imagemagick') or use the native backend")]
    ToolNotFound {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("'{tool}' failed on {}: {stderr}", .path.display())]
    ToolFailed {
        tool: String,
        path: PathBuf,
        stderr: String,
    },

    #[error("Unexpected output from '{tool}': '{output}'")]
    UnexpectedOutput { tool: String, output: String },

    #[error("Failed to process image {}: {source}", .path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("No tiles were produced from {}", .path.display())]
    NoTiles { path: PathBuf },

    #[error(transparent)]
    InvalidDimensions(#[from] GeoError),
}

/// File name of the tile at `index` for a crop stem.
pub fn tile_file_name(stem: &str, index: usize) -> String {
    format!("{}_tile_{:03}.jpg", stem, index)
}

/// Collects the tiles written for `stem` in `dir`, ordered by tile index.
///
/// Ordering is numeric so `_tile_1000` follows `_tile_999`.
pub(crate) fn collect_tiles(dir: &Path, stem: &str) -> Result<Vec<PathBuf>, RasterError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"_tile_(\d+)\.jpg$").expect("tile name pattern is valid"));

    let entries = std::fs::read_dir(dir).map_err(|source| RasterError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let prefix = format!("{}_tile_", stem);
    let mut tiles = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| RasterError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if !file_name.starts_with(&prefix) {
            continue;
        }
        if let Some(index) = pattern
            .captures(&file_name)
            .and_then(|c| c[1].parse::<usize>().ok())
        {
            tiles.push((index, entry.path()));
        }
    }

    if tiles.is_empty() {
        return Err(RasterError::NoTiles {
            path: dir.to_path_buf(),
        });
    }

    tiles.sort_by_key(|(index, _)| *index);
    Ok(tiles.into_iter().map(|(_, path)| path).collect())
}

/// Creates the processor for a backend.
pub fn create_processor(
    backend: RasterBackend,
    convert: &str,
    identify: &str,
    jpeg_quality: u8,
) -> Box<dyn RasterProcessor> {
    match backend {
        RasterBackend::Native => Box::new(NativeProcessor::new(jpeg_quality)),
        RasterBackend::Magick => Box::new(MagickProcessor::new(convert, identify)),
    }
}
