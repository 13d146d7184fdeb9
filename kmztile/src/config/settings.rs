//! Configuration settings structs and their defaults.

use crate::archive::ArchiveBackend;
use crate::raster::{RasterBackend, DEFAULT_JPEG_QUALITY, TILE_SIZE};

/// Default maximum tile count. Most Garmin units accept 100 custom map
/// tiles; Montana, Oregon 600 and GPSMAP 64 series accept 500.
pub const DEFAULT_MAX_TILES: u32 = 100;

/// Default draw order; above 50 draws over the device's base map.
pub const DEFAULT_DRAW_ORDER: i32 = crate::kml::DEFAULT_DRAW_ORDER;

/// Default number of packaging jobs.
pub const DEFAULT_JOBS: usize = 1;

/// Complete configuration file contents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigFile {
    pub tiling: TilingSettings,
    pub raster: RasterSettings,
    pub archive: ArchiveSettings,
    pub output: OutputSettings,
}

/// `[tiling]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct TilingSettings {
    /// Device tile limit; the image is downscaled to fit this many full tiles.
    pub max_tiles: u32,
    /// Overlay draw order written to every descriptor.
    pub draw_order: i32,
    /// Tile edge in pixels.
    pub tile_size: u32,
}

impl Default for TilingSettings {
    fn default() -> Self {
        Self {
            max_tiles: DEFAULT_MAX_TILES,
            draw_order: DEFAULT_DRAW_ORDER,
            tile_size: TILE_SIZE,
        }
    }
}

/// `[raster]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSettings {
    pub backend: RasterBackend,
    /// Convert command line, e.g. `convert` or `gm convert`.
    pub convert: String,
    /// Identify command line, e.g. `identify` or `gm identify`.
    pub identify: String,
    /// JPEG quality for the native backend (1-100).
    pub jpeg_quality: u8,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            backend: RasterBackend::default(),
            convert: "convert".to_string(),
            identify: "identify".to_string(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// `[archive]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSettings {
    pub backend: ArchiveBackend,
    /// zip program for the shell backend.
    pub zip: String,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            backend: ArchiveBackend::default(),
            zip: "zip".to_string(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    /// Parallel packaging jobs (1 = sequential).
    pub jobs: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { jobs: DEFAULT_JOBS }
    }
}
