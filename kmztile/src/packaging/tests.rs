//! Tests for the packaging pipeline
//!
//! These run the native raster and zip backends on small generated images,
//! so no external tools are needed. Tile size is shrunk to keep them fast.

use super::*;
use crate::archive::{ArchiveError, PackageArchiver, ZipArchiver};
use crate::layout::row_breaks;
use crate::raster::{NativeProcessor, RasterError};

use std::fs::File;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgb, RgbImage};
use tempfile::TempDir;

const LAKE: &str = "Lake_15.0_0.0_25.0_0.0.png";

fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8])
    });
    img.save(&path).unwrap();
    path
}

fn native_packager() -> TilePackager {
    TilePackager::new(
        Box::new(NativeProcessor::default()),
        Box::new(ZipArchiver::new()),
    )
}

fn zip_entries(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

fn read_entry(path: &Path, name: &str) -> String {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut content = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    content
}

fn leftover_work_dirs(dir: &Path) -> Vec<PathBuf> {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().path())
            .filter(|p| file_name(p).starts_with(WORK_DIR_PREFIX))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[derive(Default)]
struct CountingProgress {
    total: AtomicUsize,
    packaged: AtomicUsize,
}

impl ProgressReporter for CountingProgress {
    fn on_layout(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
    }

    fn on_packaged(&self, _tile: &PackagedTile) {
        self.packaged.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_packages_every_tile() {
    let temp = TempDir::new().unwrap();
    let image = write_image(temp.path(), LAKE, 250, 150);
    let output = temp.path().join("out");

    let request = PackageRequest::new(&image, &output).with_tile_size(100);
    let progress = CountingProgress::default();
    let summary = native_packager().run(&request, &progress).unwrap();

    assert_eq!(summary.map_name, "Lake");
    assert_eq!(summary.packages.len(), 6);
    assert!(!summary.was_resized());
    assert!(summary.warnings.is_empty());
    assert_eq!(progress.total.load(Ordering::SeqCst), 6);
    assert_eq!(progress.packaged.load(Ordering::SeqCst), 6);

    let descriptors: Vec<TileDescriptor> = summary
        .packages
        .iter()
        .map(|p| p.descriptor.clone())
        .collect();
    assert_eq!(row_breaks(&descriptors), vec![2, 5]);

    for (index, package) in summary.packages.iter().enumerate() {
        let expected = output.join(format!("Lake_{:03}.kmz", index));
        assert_eq!(package.path, expected);
        assert!(expected.is_file());

        let image_name = format!("Lake_tile_{:03}.jpg", index);
        assert_eq!(
            zip_entries(&expected),
            vec![image_name.clone(), "doc.kml".to_string()]
        );

        let kml = read_entry(&expected, "doc.kml");
        assert!(kml.contains(&format!("<href>{}</href>", image_name)));
        assert!(kml.contains("<drawOrder>51</drawOrder>"));
        assert_eq!(package.sha256, calculate_sha256(&expected).unwrap());
    }

    // First tile sits in the north-west corner
    let first = &summary.packages[0].descriptor.bounds;
    assert_eq!(first.north(), 15.0);
    assert_eq!(first.west(), 0.0);

    assert!(leftover_work_dirs(&output).is_empty());
}

#[test]
fn test_downscales_to_tile_budget() {
    let temp = TempDir::new().unwrap();
    let image = write_image(temp.path(), LAKE, 400, 200);
    let output = temp.path().join("out");

    let request = PackageRequest::new(&image, &output)
        .with_tile_size(100)
        .with_max_tiles(2);
    let summary = native_packager().run(&request, &NoProgress).unwrap();

    assert!(summary.was_resized());
    assert_eq!(summary.source_dimensions, RasterDimensions::new(400, 200).unwrap());
    assert_eq!(summary.tiled_dimensions, RasterDimensions::new(200, 100).unwrap());
    assert_eq!(summary.packages.len(), 2);

    // Geography is unchanged by downscaling
    let last = &summary.packages[1].descriptor.bounds;
    assert!((last.east() - 25.0).abs() < 1e-9);
    assert!(last.south().abs() < 1e-9);
}

#[test]
fn test_parallel_matches_sequential() {
    let temp = TempDir::new().unwrap();
    let image = write_image(temp.path(), LAKE, 250, 150);

    let sequential = native_packager()
        .run(
            &PackageRequest::new(&image, temp.path().join("seq")).with_tile_size(100),
            &NoProgress,
        )
        .unwrap();
    let parallel = native_packager()
        .run(
            &PackageRequest::new(&image, temp.path().join("par"))
                .with_tile_size(100)
                .with_jobs(3),
            &NoProgress,
        )
        .unwrap();

    assert_eq!(sequential.packages.len(), parallel.packages.len());
    for (a, b) in sequential.packages.iter().zip(&parallel.packages) {
        assert_eq!(a.descriptor, b.descriptor);
        assert_eq!(
            read_entry(&a.path, "doc.kml"),
            read_entry(&b.path, "doc.kml")
        );
    }
}

#[test]
fn test_tile_count_over_limit_warns() {
    let temp = TempDir::new().unwrap();
    // 37,500 px fits a 4-tile budget but edge tiles make it 6 tiles
    let image = write_image(temp.path(), LAKE, 250, 150);

    let request = PackageRequest::new(&image, temp.path().join("out"))
        .with_tile_size(100)
        .with_max_tiles(4);
    let summary = native_packager().run(&request, &NoProgress).unwrap();

    assert_eq!(summary.packages.len(), 6);
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].contains("device limit of 4"));
}

#[test]
fn test_manifest_written() {
    let temp = TempDir::new().unwrap();
    let image = write_image(temp.path(), LAKE, 200, 100);
    let output = temp.path().join("out");

    let request = PackageRequest::new(&image, &output)
        .with_tile_size(100)
        .with_draw_order(70);
    let summary = native_packager().run(&request, &NoProgress).unwrap();

    let manifest_path = output.join("manifest.json");
    summary.write_manifest(&manifest_path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&manifest_path).unwrap()).unwrap();
    assert_eq!(json["map"], "Lake");
    assert_eq!(json["draw_order"], 70);
    assert_eq!(json["bounds"]["north"], 15.0);
    assert_eq!(json["tiles"].as_array().unwrap().len(), 2);
    assert_eq!(json["tiles"][1]["package"], "Lake_001.kmz");
    assert_eq!(json["tiles"][1]["size"]["width"], 100);
    assert_eq!(json["tiles"][1]["bounds"]["east"], 25.0);
}

#[test]
fn test_malformed_name_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let image = write_image(temp.path(), "holiday.png", 10, 10);
    let output = temp.path().join("out");

    let result = native_packager().run(&PackageRequest::new(&image, &output), &NoProgress);

    assert!(matches!(result, Err(PackageError::Source(_))));
    assert!(!output.exists());
}

#[test]
fn test_missing_input() {
    let temp = TempDir::new().unwrap();
    let image = temp.path().join(LAKE);

    let result = native_packager().run(
        &PackageRequest::new(&image, temp.path().join("out")),
        &NoProgress,
    );

    assert!(matches!(result, Err(PackageError::InputNotFound(_))));
}

/// Raster processor whose crop step always fails.
struct FailingCrop(NativeProcessor);

impl RasterProcessor for FailingCrop {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn measure_dimensions(&self, path: &Path) -> Result<RasterDimensions, RasterError> {
        self.0.measure_dimensions(path)
    }

    fn resize_to_pixel_budget(
        &self,
        input: &Path,
        max_pixels: u64,
        output: &Path,
    ) -> Result<(), RasterError> {
        self.0.resize_to_pixel_budget(input, max_pixels, output)
    }

    fn normalize_for_device(&self, input: &Path, output: &Path) -> Result<(), RasterError> {
        self.0.normalize_for_device(input, output)
    }

    fn crop_to_grid(
        &self,
        input: &Path,
        _tile: RasterDimensions,
        _output_dir: &Path,
        _stem: &str,
    ) -> Result<Vec<PathBuf>, RasterError> {
        Err(RasterError::ToolFailed {
            tool: "convert".to_string(),
            path: input.to_path_buf(),
            stderr: "simulated failure".to_string(),
        })
    }
}

#[test]
fn test_tool_failure_aborts_and_cleans_up() {
    let temp = TempDir::new().unwrap();
    let image = write_image(temp.path(), LAKE, 250, 150);
    let output = temp.path().join("out");

    let packager = TilePackager::new(
        Box::new(FailingCrop(NativeProcessor::default())),
        Box::new(ZipArchiver::new()),
    );
    let result = packager.run(
        &PackageRequest::new(&image, &output).with_tile_size(100),
        &NoProgress,
    );

    match result {
        Err(PackageError::Raster(RasterError::ToolFailed { stderr, .. })) => {
            assert_eq!(stderr, "simulated failure")
        }
        other => panic!("expected ToolFailed, got {:?}", other.map(|s| s.packages.len())),
    }
    assert!(leftover_work_dirs(&output).is_empty());
    let kmz_count = fs::read_dir(&output).unwrap().count();
    assert_eq!(kmz_count, 0);
}

/// Archiver that fails on its Nth call and zips normally otherwise.
struct FailingNthArchive {
    fail_on: usize,
    calls: AtomicUsize,
}

impl PackageArchiver for FailingNthArchive {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn archive_directory(&self, dir: &Path, archive_path: &Path) -> Result<(), ArchiveError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(ArchiveError::ToolFailed {
                tool: "zip".to_string(),
                path: archive_path.to_path_buf(),
                stderr: "simulated failure".to_string(),
            });
        }
        ZipArchiver::new().archive_directory(dir, archive_path)
    }
}

#[test]
fn test_late_archive_failure_publishes_nothing() {
    let temp = TempDir::new().unwrap();
    let image = write_image(temp.path(), LAKE, 250, 150);
    let output = temp.path().join("out");

    let packager = TilePackager::new(
        Box::new(NativeProcessor::default()),
        Box::new(FailingNthArchive {
            fail_on: 3,
            calls: AtomicUsize::new(0),
        }),
    );
    let result = packager.run(
        &PackageRequest::new(&image, &output).with_tile_size(100),
        &NoProgress,
    );

    assert!(matches!(
        result,
        Err(PackageError::Archive(ArchiveError::ToolFailed { .. }))
    ));
    let remaining: Vec<PathBuf> = fs::read_dir(&output)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert!(remaining.is_empty(), "left behind: {:?}", remaining);
}

#[test]
fn test_archives_published_after_all_tiles() {
    let temp = TempDir::new().unwrap();
    let image = write_image(temp.path(), LAKE, 250, 150);
    let output = temp.path().join("out");

    let summary = native_packager()
        .run(
            &PackageRequest::new(&image, &output).with_tile_size(100),
            &NoProgress,
        )
        .unwrap();

    // Checksums are taken in the work area and must match the published file
    for package in &summary.packages {
        assert_eq!(package.archive_bytes, fs::metadata(&package.path).unwrap().len());
        assert_eq!(package.sha256, calculate_sha256(&package.path).unwrap());
    }
}

#[test]
fn test_request_builders_clamp() {
    let request = PackageRequest::new("a.jpg", "out")
        .with_max_tiles(0)
        .with_jobs(0)
        .with_tile_size(0);
    assert_eq!(request.max_tiles, 1);
    assert_eq!(request.jobs, 1);
    assert_eq!(request.tile_size, 1);
    assert_eq!(
        PackageRequest::new("a.jpg", "out").max_pixels(),
        100 * 1024 * 1024
    );
}
