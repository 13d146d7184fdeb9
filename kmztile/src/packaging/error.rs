//! Error types for the packaging pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::geo::GeoError;
use crate::layout::LayoutError;
use crate::raster::RasterError;
use crate::source::SourceError;

/// Result type for packaging operations.
pub type PackageResult<T> = Result<T, PackageError>;

/// Errors that abort a packaging run.
///
/// There is no per-tile recovery: a partial set of packages is not a usable
/// map, so the first failure ends the run.
#[derive(Debug, Error)]
pub enum PackageError {
    /// Input file name is not a geocoded name.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Input image does not exist.
    #[error("Input image not found: {}", .0.display())]
    InputNotFound(PathBuf),

    /// Image processing failed.
    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Invalid tile geometry settings.
    #[error(transparent)]
    Geometry(#[from] GeoError),

    /// Tiles could not be laid out.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Archiving a package failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Failed to create directory.
    #[error("Failed to create directory {}: {source}", .path.display())]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read file.
    #[error("Failed to read {}: {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write file.
    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to move a file.
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to start the packaging thread pool.
    #[error("Failed to start packaging workers: {0}")]
    WorkerPool(String),

    /// Failed to serialize the manifest.
    #[error("Failed to write manifest {}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
