//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::str::FromStr;

use ini::Ini;

use super::file::ConfigFileError;
use super::settings::ConfigFile;

fn invalid(section: &str, key: &str, value: &str, reason: impl Into<String>) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Parses a value, reporting `reason` if it doesn't parse.
fn parse_value<T: FromStr>(
    section: &str,
    key: &str,
    value: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

/// Parses a positive integer value.
fn parse_positive<T: FromStr + PartialOrd + Default>(
    section: &str,
    key: &str,
    value: &str,
) -> Result<T, ConfigFileError> {
    let parsed: T = parse_value(section, key, value, "expected a positive integer")?;
    if parsed <= T::default() {
        return Err(invalid(section, key, value, "must be greater than zero"));
    }
    Ok(parsed)
}

/// Keeps `current` unless `value` is non-blank.
fn non_empty(value: &str, current: &mut String) {
    let value = value.trim();
    if !value.is_empty() {
        *current = value.to_string();
    }
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [tiling] section
    if let Some(section) = ini.section(Some("tiling")) {
        if let Some(v) = section.get("max_tiles") {
            config.tiling.max_tiles = parse_positive("tiling", "max_tiles", v)?;
        }
        if let Some(v) = section.get("draw_order") {
            config.tiling.draw_order =
                parse_value("tiling", "draw_order", v, "expected an integer")?;
        }
        if let Some(v) = section.get("tile_size") {
            config.tiling.tile_size = parse_positive("tiling", "tile_size", v)?;
        }
    }

    // [raster] section
    if let Some(section) = ini.section(Some("raster")) {
        if let Some(v) = section.get("backend") {
            config.raster.backend =
                parse_value("raster", "backend", v, "must be one of: native, magick")?;
        }
        if let Some(v) = section.get("convert") {
            non_empty(v, &mut config.raster.convert);
        }
        if let Some(v) = section.get("identify") {
            non_empty(v, &mut config.raster.identify);
        }
        if let Some(v) = section.get("jpeg_quality") {
            let quality: u8 =
                parse_value("raster", "jpeg_quality", v, "expected a number from 1 to 100")?;
            if !(1..=100).contains(&quality) {
                return Err(invalid(
                    "raster",
                    "jpeg_quality",
                    v,
                    "expected a number from 1 to 100",
                ));
            }
            config.raster.jpeg_quality = quality;
        }
    }

    // [archive] section
    if let Some(section) = ini.section(Some("archive")) {
        if let Some(v) = section.get("backend") {
            config.archive.backend =
                parse_value("archive", "backend", v, "must be one of: native, shell")?;
        }
        if let Some(v) = section.get("zip") {
            non_empty(v, &mut config.archive.zip);
        }
    }

    // [output] section
    if let Some(section) = ini.section(Some("output")) {
        if let Some(v) = section.get("jobs") {
            config.output.jobs = parse_positive("output", "jobs", v)?;
        }
    }

    Ok(config)
}
