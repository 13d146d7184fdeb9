//! User configuration (`~/.kmztile/config.ini`).
//!
//! Values resolve in order: command-line argument, config file, built-in
//! default. A missing config file is not an error.

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError};
pub use settings::{
    ArchiveSettings, OutputSettings, RasterSettings, TilingSettings, DEFAULT_DRAW_ORDER,
    DEFAULT_JOBS, DEFAULT_MAX_TILES,
};
