//! Run summary and JSON manifest.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::error::{PackageError, PackageResult};
use crate::geo::{BoundingBox, RasterDimensions};
use crate::layout::TileDescriptor;

/// Tile JPEGs above this size load slowly or not at all on the device.
pub const MAX_TILE_IMAGE_BYTES: u64 = 3 * 1024 * 1024;

/// One written package.
#[derive(Debug, Clone)]
pub struct PackagedTile {
    pub descriptor: TileDescriptor,
    /// Final `.kmz` path in the output directory.
    pub path: PathBuf,
    /// Size of the tile JPEG.
    pub image_bytes: u64,
    /// Size of the `.kmz`.
    pub archive_bytes: u64,
    /// Hex SHA-256 of the `.kmz`.
    pub sha256: String,
}

/// Outcome of a packaging run.
#[derive(Debug, Clone)]
pub struct PackageSummary {
    pub map_name: String,
    pub bounds: BoundingBox,
    /// Size of the input image.
    pub source_dimensions: RasterDimensions,
    /// Size of the image that was cut into tiles (after any downscale).
    pub tiled_dimensions: RasterDimensions,
    pub draw_order: i32,
    /// Packages in tile index order.
    pub packages: Vec<PackagedTile>,
    /// Advisory device-limit warnings.
    pub warnings: Vec<String>,
}

impl PackageSummary {
    /// True if the input was downscaled to fit the tile budget.
    pub fn was_resized(&self) -> bool {
        self.source_dimensions != self.tiled_dimensions
    }

    /// Total bytes across all packages.
    pub fn total_bytes(&self) -> u64 {
        self.packages.iter().map(|p| p.archive_bytes).sum()
    }

    /// Builds the serializable manifest.
    pub fn manifest(&self) -> Manifest<'_> {
        Manifest {
            map: &self.map_name,
            bounds: &self.bounds,
            source: self.source_dimensions,
            tiled: self.tiled_dimensions,
            draw_order: self.draw_order,
            tiles: self
                .packages
                .iter()
                .map(|p| ManifestTile {
                    index: p.descriptor.index,
                    row: p.descriptor.row,
                    column: p.descriptor.column,
                    package: p
                        .path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    image: &p.descriptor.image_name,
                    size: p.descriptor.dimensions,
                    bounds: &p.descriptor.bounds,
                    bytes: p.archive_bytes,
                    sha256: &p.sha256,
                })
                .collect(),
        }
    }

    /// Writes the manifest as pretty JSON.
    pub fn write_manifest(&self, path: &Path) -> PackageResult<()> {
        let file = File::create(path).map_err(|source| PackageError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, &self.manifest()).map_err(|source| {
            PackageError::Manifest {
                path: path.to_path_buf(),
                source,
            }
        })?;
        writer
            .write_all(b"\n")
            .and_then(|_| writer.flush())
            .map_err(|source| PackageError::WriteFailed {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// JSON manifest describing every package of a run.
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub map: &'a str,
    pub bounds: &'a BoundingBox,
    pub source: RasterDimensions,
    pub tiled: RasterDimensions,
    pub draw_order: i32,
    pub tiles: Vec<ManifestTile<'a>>,
}

/// Manifest entry for one package.
#[derive(Debug, Serialize)]
pub struct ManifestTile<'a> {
    pub index: usize,
    pub row: u32,
    pub column: u32,
    pub package: String,
    pub image: &'a str,
    pub size: RasterDimensions,
    pub bounds: &'a BoundingBox,
    pub bytes: u64,
    pub sha256: &'a str,
}

/// Calculate the hex SHA-256 of a file.
pub fn calculate_sha256(path: &Path) -> PackageResult<String> {
    let file = File::open(path).map_err(|e| PackageError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| PackageError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
