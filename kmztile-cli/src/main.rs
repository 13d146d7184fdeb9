//! KMZTile CLI - Command-line interface
//!
//! Cuts a geocoded map image into KMZ ground overlays for Garmin GPS units.

mod error;
mod progress;

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, ValueEnum};
use kmztile::archive::{create_archiver, ArchiveBackend};
use kmztile::config::ConfigFile;
use kmztile::logging::init_logging;
use kmztile::packaging::{PackageRequest, PackageSummary, TilePackager};
use kmztile::raster::{create_processor, RasterBackend};
use kmztile::source::parse_geocoded_name;
use tracing::debug;

use crate::error::CliError;
use crate::progress::BarProgress;

/// Raster backend selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
enum BackendArg {
    /// Built-in image processing (no external tools)
    Native,
    /// ImageMagick or GraphicsMagick command-line tools
    Magick,
}

impl From<BackendArg> for RasterBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Native => RasterBackend::Native,
            BackendArg::Magick => RasterBackend::Magick,
        }
    }
}

/// Archiver selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
enum ArchiverArg {
    /// Built-in zip writer
    Native,
    /// External `zip` program
    Shell,
}

impl From<ArchiverArg> for ArchiveBackend {
    fn from(arg: ArchiverArg) -> Self {
        match arg {
            ArchiverArg::Native => ArchiveBackend::Native,
            ArchiverArg::Shell => ArchiveBackend::Shell,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "kmztile", version)]
#[command(about = "Cut a geocoded map image into KMZ tiles for Garmin GPS units", long_about = None)]
struct Args {
    /// Geocoded image: <name>_<north>_<south>_<east>_<west>.<ext>
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Maximum number of tiles; larger images are downscaled (default: 100)
    #[arg(short = 't', long)]
    max_tiles: Option<u32>,

    /// KML draw order of the overlays (default: 51)
    #[arg(short, long, allow_negative_numbers = true)]
    draw_order: Option<i32>,

    /// Directory for the .kmz files (default: current directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Raster backend
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Archiver backend
    #[arg(long, value_enum)]
    archiver: Option<ArchiverArg>,

    /// Parallel packaging jobs
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Write a JSON manifest of all packages to this path
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Config file (default: ~/.kmztile/config.ini)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Create the default config file if missing and print its path
    #[arg(long)]
    init_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        e.exit();
    }
}

fn run(args: Args) -> Result<(), CliError> {
    if args.init_config {
        let path = ConfigFile::ensure_exists()?;
        println!("Config file: {}", path.display());
        if args.image.is_none() {
            return Ok(());
        }
    }

    let Some(image) = args.image.clone() else {
        eprintln!("{}", Args::command().render_help());
        return Err(CliError::MissingImage);
    };

    // Validate the name before anything touches the filesystem
    parse_geocoded_name(&image).map_err(CliError::InvalidFileName)?;

    let _logging = init_logging(args.verbose, args.log_file.as_deref())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    let config = match &args.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    debug!(?config, "Loaded configuration");

    let request = build_request(&args, image, &config);
    let processor = create_processor(
        args.backend
            .map(RasterBackend::from)
            .unwrap_or(config.raster.backend),
        &config.raster.convert,
        &config.raster.identify,
        config.raster.jpeg_quality,
    );
    let archiver = create_archiver(
        args.archiver
            .map(ArchiveBackend::from)
            .unwrap_or(config.archive.backend),
        &config.archive.zip,
    );

    let packager = TilePackager::new(processor, archiver);
    let progress = BarProgress::new();
    let result = packager.run(&request, &progress);
    progress.finish();
    let summary = result?;

    if let Some(manifest) = &args.manifest {
        summary.write_manifest(manifest)?;
    }

    print_summary(&summary, &request.output_dir, args.manifest.as_deref());
    Ok(())
}

/// Resolve request settings: CLI first, then config file, then defaults.
fn build_request(args: &Args, image: PathBuf, config: &ConfigFile) -> PackageRequest {
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    PackageRequest::new(image, output_dir)
        .with_max_tiles(args.max_tiles.unwrap_or(config.tiling.max_tiles))
        .with_draw_order(args.draw_order.unwrap_or(config.tiling.draw_order))
        .with_tile_size(config.tiling.tile_size)
        .with_jobs(args.jobs.unwrap_or(config.output.jobs))
}

fn print_summary(summary: &PackageSummary, output_dir: &Path, manifest: Option<&Path>) {
    println!("Map:        {}", summary.map_name);
    println!("Bounds:     {}", summary.bounds);
    if summary.was_resized() {
        println!(
            "Image:      {} (downscaled to {})",
            summary.source_dimensions, summary.tiled_dimensions
        );
    } else {
        println!("Image:      {}", summary.source_dimensions);
    }
    println!(
        "Packages:   {} in {} ({} bytes)",
        summary.packages.len(),
        output_dir.display(),
        summary.total_bytes()
    );
    if let Some(path) = manifest {
        println!("Manifest:   {}", path.display());
    }
    for warning in &summary.warnings {
        println!("Warning:    {}", warning);
    }
}
