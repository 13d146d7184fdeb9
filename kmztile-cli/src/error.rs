//! CLI error handling with user-friendly messages.
//!
//! Centralizes error reporting for the CLI: consistent formatting and exit
//! codes (2 for usage errors, 1 for everything else).

use std::fmt;
use std::process;

use kmztile::config::ConfigFileError;
use kmztile::packaging::PackageError;
use kmztile::raster::RasterError;
use kmztile::source::{SourceError, FILENAME_FORMAT_HELP};

/// Exit code for command-line usage errors.
pub const EXIT_USAGE: i32 = 2;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// No input image was given
    MissingImage,
    /// Input file name does not carry a bounding box
    InvalidFileName(SourceError),
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file error
    Config(ConfigFileError),
    /// Packaging run failed
    Package(PackageError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::MissingImage | CliError::InvalidFileName(_) => EXIT_USAGE,
            _ => 1,
        }
    }

    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::InvalidFileName(_) => {
                eprintln!();
                eprintln!("The image file name must be:");
                eprintln!("  {}", FILENAME_FORMAT_HELP);
            }
            CliError::Package(PackageError::Raster(RasterError::ToolNotFound { .. })) => {
                eprintln!();
                eprintln!("The magick backend needs ImageMagick or GraphicsMagick:");
                eprintln!("  1. Install it: sudo apt install imagemagick (Linux)");
                eprintln!("  2. Or set convert/identify in ~/.kmztile/config.ini");
                eprintln!("  3. Or use the built-in backend: --backend native");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::MissingImage => write!(f, "--image is required"),
            CliError::InvalidFileName(e) => write!(f, "{}", e),
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Package(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::InvalidFileName(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Package(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<PackageError> for CliError {
    fn from(e: PackageError) -> Self {
        match e {
            PackageError::Source(source) => CliError::InvalidFileName(source),
            other => CliError::Package(other),
        }
    }
}
