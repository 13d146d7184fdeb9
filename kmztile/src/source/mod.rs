//! Geocoded map source parsing.
//!
//! The source image carries its bounding box in its file name:
//! `<name>_<north>_<south>_<east>_<west>.<ext>`
//!
//! Examples:
//! - `Grouse-Mountain_49.470628_49.336694_-122.9811_-123.132056.jpg`
//! - `Taveuni_-16.6_-17.1_-179.8_179.9.png` (crosses the antimeridian)
//!
//! All four edges are decimal degrees and must contain a decimal point.
//! Anything after the west edge (extension, suffixes) is ignored.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::geo::{BoundingBox, GeoError, RasterDimensions};

/// Human-readable description of the expected file name format.
pub const FILENAME_FORMAT_HELP: &str = "<map-name>_<north-lat>_<south-lat>_<east-long>_<west-long>.<ext> \
     with decimal degrees, e.g. Grouse-Mountain_49.470628_49.336694_-122.9811_-123.132056.jpg";

/// Map name and bounding box decoded from a source file name.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedName {
    /// Map display name (no underscores or slashes).
    pub name: String,
    /// Bounding box of the whole image.
    pub bounds: BoundingBox,
}

/// A source image ready for tiling: its geocoded name plus pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSource {
    pub name: String,
    pub path: PathBuf,
    pub bounds: BoundingBox,
    pub dimensions: RasterDimensions,
}

impl MapSource {
    pub fn new(geocoded: GeocodedName, path: impl Into<PathBuf>, dimensions: RasterDimensions) -> Self {
        Self {
            name: geocoded.name,
            path: path.into(),
            bounds: geocoded.bounds,
            dimensions,
        }
    }
}

/// Errors decoding a geocoded file name.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("'{file_name}' - malformed image file name. Decimal degrees of the bounding box are required in the file name")]
    InvalidPattern { file_name: String },

    #[error("'{file_name}' - invalid coordinate '{value}'")]
    InvalidCoordinate { file_name: String, value: String },

    #[error("'{file_name}' - invalid bounding box: {source}")]
    InvalidBounds {
        file_name: String,
        #[source]
        source: GeoError,
    },
}

/// Regex for the geocoded file name.
///
/// We capture:
/// - Group 1: map name (no `/` or `_`)
/// - Groups 2-5: north, south, east, west (signed decimals)
fn geocoded_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"([^/_]+)_(-?[0-9]+\.[0-9]+)_(-?[0-9]+\.[0-9]+)_(-?[0-9]+\.[0-9]+)_(-?[0-9]+\.[0-9]+)",
        )
        .expect("geocoded file name pattern is valid")
    })
}

/// Decodes the map name and bounding box from an image path.
///
/// Only the final path component is inspected.
///
/// # Examples
///
/// ```
/// use kmztile::source::parse_geocoded_name;
///
/// let parsed = parse_geocoded_name(
///     "maps/Grouse-Mountain_49.470628_49.336694_-122.9811_-123.132056.jpg",
/// )
/// .unwrap();
/// assert_eq!(parsed.name, "Grouse-Mountain");
/// assert_eq!(parsed.bounds.north(), 49.470628);
/// assert_eq!(parsed.bounds.west(), -123.132056);
/// ```
pub fn parse_geocoded_name(path: impl AsRef<Path>) -> Result<GeocodedName, SourceError> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    let captures =
        geocoded_pattern()
            .captures(&file_name)
            .ok_or_else(|| SourceError::InvalidPattern {
                file_name: file_name.clone(),
            })?;

    let degrees = |group: usize| -> Result<f64, SourceError> {
        let value = &captures[group];
        value
            .parse::<f64>()
            .map_err(|_| SourceError::InvalidCoordinate {
                file_name: file_name.clone(),
                value: value.to_string(),
            })
    };

    let name = captures[1].to_string();
    let (north, south, east, west) = (degrees(2)?, degrees(3)?, degrees(4)?, degrees(5)?);

    let bounds =
        BoundingBox::new(north, south, east, west).map_err(|source| SourceError::InvalidBounds {
            file_name: file_name.clone(),
            source,
        })?;

    Ok(GeocodedName { name, bounds })
}
