//! KMZTile - geocoded map images as Garmin custom maps
//!
//! This library cuts a geocoded raster image into device-sized tiles and
//! packages each tile as a KMZ ground overlay that Garmin GPS units can load
//! as a custom map.
//!
//! The source image carries its bounding box in its file name
//! (`<name>_<north>_<south>_<east>_<west>.<ext>`). The pipeline:
//!
//! - [`source`] decodes the name and bounding box
//! - [`raster`] downscales, normalizes and crops the image
//! - [`layout`] places each tile geographically using [`geo`]
//! - [`kml`] renders one overlay descriptor per tile
//! - [`archive`] zips each tile into a `.kmz`
//! - [`packaging`] runs the whole thing and reports a summary
//!
//! # Example
//!
//! ```no_run
//! use kmztile::archive::ZipArchiver;
//! use kmztile::packaging::{NoProgress, PackageRequest, TilePackager};
//! use kmztile::raster::NativeProcessor;
//!
//! let packager = TilePackager::new(
//!     Box::new(NativeProcessor::default()),
//!     Box::new(ZipArchiver::new()),
//! );
//! let request = PackageRequest::new(
//!     "Grouse-Mountain_49.470628_49.336694_-122.9811_-123.132056.jpg",
//!     "out",
//! );
//! let summary = packager.run(&request, &NoProgress)?;
//! println!("{} packages written", summary.packages.len());
//! # Ok::<(), kmztile::packaging::PackageError>(())
//! ```

pub mod archive;
pub mod config;
pub mod geo;
pub mod kml;
pub mod layout;
pub mod logging;
pub mod packaging;
pub mod raster;
pub mod source;
