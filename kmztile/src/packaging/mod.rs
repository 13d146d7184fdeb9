//! Packaging pipeline.
//!
//! Turns one geocoded image into one `.kmz` per tile:
//!
//! 1. decode the map name and bounding box from the file name
//! 2. downscale if the image holds more than `max_tiles` full tiles
//! 3. re-encode as a baseline JPEG without metadata
//! 4. crop into a row-major tile grid
//! 5. lay out the tiles geographically
//! 6. per tile: directory with image + `doc.kml`, zipped to `<name>_<NNN>.kmz`
//! 7. once every tile is packaged, move the archives to the output directory
//!
//! All intermediate files live in a `kmztile-*` work directory inside the
//! output directory. It is removed when the run ends, whether or not the run
//! succeeded.

mod error;
mod summary;

pub use error::{PackageError, PackageResult};
pub use summary::{
    calculate_sha256, Manifest, ManifestTile, PackageSummary, PackagedTile, MAX_TILE_IMAGE_BYTES,
};

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::archive::{PackageArchiver, PACKAGE_EXTENSION};
use crate::config::{DEFAULT_DRAW_ORDER, DEFAULT_JOBS, DEFAULT_MAX_TILES};
use crate::geo::RasterDimensions;
use crate::kml::{build_overlay_descriptor, DESCRIPTOR_FILENAME};
use crate::layout::{plan_layout, TileDescriptor, TileImage};
use crate::raster::{RasterProcessor, TILE_SIZE};
use crate::source::{parse_geocoded_name, MapSource};

/// Work directory name prefix.
pub const WORK_DIR_PREFIX: &str = "kmztile-";

/// Parameters for one packaging run.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageRequest {
    /// Geocoded source image.
    pub image: PathBuf,
    /// Where `.kmz` files are written.
    pub output_dir: PathBuf,
    /// Tile budget; larger images are downscaled to fit.
    pub max_tiles: u32,
    /// Draw order written to every descriptor.
    pub draw_order: i32,
    /// Tile edge in pixels.
    pub tile_size: u32,
    /// Parallel packaging jobs (1 = sequential).
    pub jobs: usize,
}

impl PackageRequest {
    /// Creates a request with default limits.
    pub fn new(image: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            output_dir: output_dir.into(),
            max_tiles: DEFAULT_MAX_TILES,
            draw_order: DEFAULT_DRAW_ORDER,
            tile_size: TILE_SIZE,
            jobs: DEFAULT_JOBS,
        }
    }

    pub fn with_max_tiles(mut self, max_tiles: u32) -> Self {
        self.max_tiles = max_tiles.max(1);
        self
    }

    pub fn with_draw_order(mut self, draw_order: i32) -> Self {
        self.draw_order = draw_order;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size.max(1);
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Pixel budget: `max_tiles` full tiles.
    pub fn max_pixels(&self) -> u64 {
        self.max_tiles as u64 * self.tile_size as u64 * self.tile_size as u64
    }
}

/// Receives progress notifications during a run.
pub trait ProgressReporter: Send + Sync {
    /// Layout is resolved; `total` packages will be written.
    fn on_layout(&self, _total: usize) {}

    /// One package has been written.
    fn on_packaged(&self, _tile: &PackagedTile) {}
}

/// Progress reporter that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Runs the packaging pipeline with pluggable raster and archive backends.
pub struct TilePackager {
    raster: Box<dyn RasterProcessor>,
    archiver: Box<dyn PackageArchiver>,
}

/// Paths of one run's work area.
struct WorkArea {
    root: PathBuf,
    tiles: PathBuf,
}

impl TilePackager {
    pub fn new(raster: Box<dyn RasterProcessor>, archiver: Box<dyn PackageArchiver>) -> Self {
        Self { raster, archiver }
    }

    /// Packages the image described by `request`.
    pub fn run(
        &self,
        request: &PackageRequest,
        progress: &dyn ProgressReporter,
    ) -> PackageResult<PackageSummary> {
        let geocoded = parse_geocoded_name(&request.image)?;
        if !request.image.is_file() {
            return Err(PackageError::InputNotFound(request.image.clone()));
        }

        self.raster.check_available()?;
        self.archiver.check_available()?;

        fs::create_dir_all(&request.output_dir).map_err(|source| {
            PackageError::CreateDirectoryFailed {
                path: request.output_dir.clone(),
                source,
            }
        })?;

        let work_dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir_in(&request.output_dir)
            .map_err(|source| PackageError::CreateDirectoryFailed {
                path: request.output_dir.clone(),
                source,
            })?;
        let work = WorkArea {
            root: work_dir.path().to_path_buf(),
            tiles: work_dir.path().join("tiles"),
        };
        create_dir(&work.tiles)?;

        info!(
            map = %geocoded.name,
            bounds = %geocoded.bounds,
            raster = self.raster.name(),
            archiver = self.archiver.name(),
            "Packaging map"
        );

        let source_dims = self.raster.measure_dimensions(&request.image)?;
        let source = MapSource::new(geocoded, &request.image, source_dims);
        let result = self.package_source(&source, request, &work, progress);

        if let Err(e) = work_dir.close() {
            warn!(error = %e, path = %work.root.display(), "Failed to remove work directory");
        }

        result
    }

    fn package_source(
        &self,
        source: &MapSource,
        request: &PackageRequest,
        work: &WorkArea,
        progress: &dyn ProgressReporter,
    ) -> PackageResult<PackageSummary> {
        let mut current = source.path.clone();

        let max_pixels = request.max_pixels();
        if source.dimensions.pixel_count() > max_pixels {
            let resized = work.root.join("resized.jpg");
            info!(
                size = %source.dimensions,
                max_tiles = request.max_tiles,
                max_pixels,
                "Image exceeds tile budget, downscaling"
            );
            self.raster
                .resize_to_pixel_budget(&current, max_pixels, &resized)?;
            current = resized;
        }

        let normalized = work.root.join("normalized.jpg");
        self.raster.normalize_for_device(&current, &normalized)?;

        let tile_size = RasterDimensions::new(request.tile_size, request.tile_size)?;
        let tile_paths =
            self.raster
                .crop_to_grid(&normalized, tile_size, &work.tiles, &source.name)?;
        let tiled_dims = self.raster.measure_dimensions(&normalized)?;

        let tiles = tile_paths
            .iter()
            .map(|path| -> PackageResult<TileImage> {
                let dimensions = self.raster.measure_dimensions(path)?;
                Ok(TileImage::new(file_name(path), dimensions))
            })
            .collect::<PackageResult<Vec<_>>>()?;

        let layout = plan_layout(&source.name, &source.bounds, tiled_dims, &tiles)?;
        info!(tiles = layout.len(), size = %tiled_dims, "Tiles laid out");

        let mut warnings = Vec::new();
        if layout.len() > request.max_tiles as usize {
            let msg = format!(
                "{} tiles exceed the device limit of {}",
                layout.len(),
                request.max_tiles
            );
            warn!("{}", msg);
            warnings.push(msg);
        }

        progress.on_layout(layout.len());
        let packages = self.package_tiles(&layout, request, work, progress)?;
        publish_packages(&packages, work)?;

        for package in &packages {
            if package.image_bytes > MAX_TILE_IMAGE_BYTES {
                let msg = format!(
                    "{} is {} bytes; tiles above {} bytes may not load on the device",
                    package.descriptor.image_name, package.image_bytes, MAX_TILE_IMAGE_BYTES
                );
                warn!("{}", msg);
                warnings.push(msg);
            }
        }

        Ok(PackageSummary {
            map_name: source.name.clone(),
            bounds: source.bounds,
            source_dimensions: source.dimensions,
            tiled_dimensions: tiled_dims,
            draw_order: request.draw_order,
            packages,
            warnings,
        })
    }

    /// Packages every tile, in parallel when more than one job is requested.
    ///
    /// Results come back in tile index order either way.
    fn package_tiles(
        &self,
        layout: &[TileDescriptor],
        request: &PackageRequest,
        work: &WorkArea,
        progress: &dyn ProgressReporter,
    ) -> PackageResult<Vec<PackagedTile>> {
        let package = |tile: &TileDescriptor| -> PackageResult<PackagedTile> {
            let packaged = self.package_tile(tile, request, work)?;
            progress.on_packaged(&packaged);
            Ok(packaged)
        };

        if request.jobs <= 1 {
            return layout.iter().map(package).collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(request.jobs)
            .thread_name(|i| format!("kmztile-pack-{}", i))
            .build()
            .map_err(|e| PackageError::WorkerPool(e.to_string()))?;

        pool.install(|| layout.par_iter().map(package).collect())
    }

    /// Builds one package: directory, image, descriptor, archive.
    fn package_tile(
        &self,
        tile: &TileDescriptor,
        request: &PackageRequest,
        work: &WorkArea,
    ) -> PackageResult<PackagedTile> {
        let package_dir = work.root.join(&tile.package_name);
        create_dir(&package_dir)?;

        let image_path = package_dir.join(&tile.image_name);
        move_file(&work.tiles.join(&tile.image_name), &image_path)?;
        let image_bytes = file_size(&image_path)?;

        let descriptor_path = package_dir.join(DESCRIPTOR_FILENAME);
        fs::write(
            &descriptor_path,
            build_overlay_descriptor(tile, request.draw_order),
        )
        .map_err(|source| PackageError::WriteFailed {
            path: descriptor_path.clone(),
            source,
        })?;

        // Archives stay in the work area until every tile has succeeded
        let archive_name = format!("{}.{}", tile.package_name, PACKAGE_EXTENSION);
        let staged = work.root.join(&archive_name);
        self.archiver.archive_directory(&package_dir, &staged)?;

        let archive_bytes = file_size(&staged)?;
        let sha256 = calculate_sha256(&staged)?;
        let path = request.output_dir.join(&archive_name);

        debug!(
            package = %archive_name,
            image_bytes,
            archive_bytes,
            "Wrote package"
        );

        Ok(PackagedTile {
            descriptor: tile.clone(),
            path,
            image_bytes,
            archive_bytes,
            sha256,
        })
    }
}

/// Moves staged archives from the work area to their output paths.
///
/// If a move fails, archives already moved are removed again so the output
/// directory never holds part of a map set.
fn publish_packages(packages: &[PackagedTile], work: &WorkArea) -> PackageResult<()> {
    for (published, package) in packages.iter().enumerate() {
        let staged = work.root.join(file_name(&package.path));
        if let Err(e) = move_file(&staged, &package.path) {
            for moved in &packages[..published] {
                if let Err(remove_err) = fs::remove_file(&moved.path) {
                    warn!(
                        error = %remove_err,
                        path = %moved.path.display(),
                        "Failed to remove published package"
                    );
                }
            }
            return Err(e);
        }
    }

    info!(count = packages.len(), "Published packages");
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn create_dir(path: &Path) -> PackageResult<()> {
    fs::create_dir_all(path).map_err(|source| PackageError::CreateDirectoryFailed {
        path: path.to_path_buf(),
        source,
    })
}

fn move_file(from: &Path, to: &Path) -> PackageResult<()> {
    fs::rename(from, to).map_err(|source| PackageError::MoveFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })
}

fn file_size(path: &Path) -> PackageResult<u64> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| PackageError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests;
