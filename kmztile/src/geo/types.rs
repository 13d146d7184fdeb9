//! Geographic and raster type definitions

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Valid latitude range
pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;

/// Valid longitude range
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Full circle of longitude in degrees.
pub const DEGREES_PER_TURN: f64 = 360.0;

/// Geographic bounding box in decimal degrees.
///
/// The box is immutable: tile boxes are derived from a parent box, never
/// adjusted in place. Longitude may wrap across the antimeridian, so `east`
/// is allowed to be numerically smaller than `west`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    north: f64,
    south: f64,
    east: f64,
    west: f64,
}

impl BoundingBox {
    /// Creates a validated bounding box.
    ///
    /// Rejects non-finite values, latitudes outside -90..=90, longitudes
    /// outside -180..=180 and boxes where `north <= south`.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self, GeoError> {
        for lat in [north, south] {
            if !lat.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&lat) {
                return Err(GeoError::InvalidLatitude(lat));
            }
        }
        for lon in [east, west] {
            if !lon.is_finite() || !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(GeoError::InvalidLongitude(lon));
            }
        }
        if north <= south {
            return Err(GeoError::DegenerateBox { north, south });
        }

        Ok(Self::from_edges(north, south, east, west))
    }

    /// Creates a box from raw edges without validation.
    ///
    /// Used for derived tile boxes, whose east edge may run past 180 once a
    /// row crosses the antimeridian.
    #[inline]
    pub const fn from_edges(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    #[inline]
    pub fn north(&self) -> f64 {
        self.north
    }

    #[inline]
    pub fn south(&self) -> f64 {
        self.south
    }

    #[inline]
    pub fn east(&self) -> f64 {
        self.east
    }

    #[inline]
    pub fn west(&self) -> f64 {
        self.west
    }

    /// North-south extent in degrees.
    #[inline]
    pub fn latitude_span(&self) -> f64 {
        self.north - self.south
    }

    /// East-west extent in degrees, always in `0..360`.
    ///
    /// A box with `west = 170` and `east = -170` spans 20 degrees, not -340.
    #[inline]
    pub fn longitude_span(&self) -> f64 {
        (self.east - self.west).rem_euclid(DEGREES_PER_TURN)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "N {} S {} E {} W {}",
            self.north, self.south, self.east, self.west
        )
    }
}

/// Pixel dimensions of a whole raster or of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RasterDimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl RasterDimensions {
    /// Creates dimensions, rejecting zero width or height.
    pub fn new(width: u32, height: u32) -> Result<Self, GeoError> {
        if width == 0 || height == 0 {
            return Err(GeoError::EmptyRaster { width, height });
        }
        Ok(Self { width, height })
    }

    /// Total number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns true if `other` fits inside these dimensions.
    #[inline]
    pub fn contains(&self, other: &RasterDimensions) -> bool {
        other.width <= self.width && other.height <= self.height
    }
}

impl fmt::Display for RasterDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

/// Result of deriving one tile's bounding box.
///
/// Carries the edges the layout cursor advances to: `next_east` becomes the
/// next tile's west edge within a row, `next_south` becomes the next row's
/// north edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub bounds: BoundingBox,
    pub next_east: f64,
    pub next_south: f64,
}

/// Errors that can occur when building geographic or raster values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    #[error("Degenerate bounding box: north {north} must be greater than south {south}")]
    DegenerateBox { north: f64, south: f64 },

    #[error("Invalid raster dimensions {width}×{height}: width and height must be positive")]
    EmptyRaster { width: u32, height: u32 },
}
