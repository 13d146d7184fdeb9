//! Configuration file handling for ~/.kmztile/config.ini.

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use super::settings::ConfigFile;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load configuration from the default path (~/.kmztile/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }

        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Create the default config file if it doesn't exist.
    ///
    /// Returns the path to the config file.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }
}

/// Get the path to the config directory (~/.kmztile).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kmztile")
}

/// Get the path to the config file (~/.kmztile/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveBackend;
    use crate::raster::RasterBackend;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert_eq!(config.tiling.max_tiles, 100);
        assert_eq!(config.tiling.draw_order, 51);
        assert_eq!(config.tiling.tile_size, 1024);
        assert_eq!(config.raster.backend, RasterBackend::Native);
        assert_eq!(config.raster.convert, "convert");
        assert_eq!(config.archive.backend, ArchiveBackend::Native);
        assert_eq!(config.output.jobs, 1);
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.tiling.max_tiles = 500;
        config.tiling.draw_order = 60;
        config.raster.backend = RasterBackend::Magick;
        config.raster.convert = "gm convert".to_string();
        config.raster.identify = "gm identify".to_string();
        config.archive.backend = ArchiveBackend::Shell;
        config.output.jobs = 4;

        config.save_to(&config_path).unwrap();
        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, "[tiling]\nmax_tiles = 500\n").unwrap();

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config.tiling.max_tiles, 500);
        assert_eq!(config.tiling.draw_order, 51);
        assert_eq!(config.raster, crate::config::RasterSettings::default());
    }

    #[test]
    fn test_invalid_value_reported() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, "[raster]\nbackend = gimp\n").unwrap();

        let err = ConfigFile::load_from(&config_path).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("raster.backend"), "{}", msg);
        assert!(msg.contains("gimp"), "{}", msg);
    }

    #[test]
    fn test_config_file_path() {
        let path = config_file_path();
        assert!(path.ends_with(".kmztile/config.ini"));
    }
}
