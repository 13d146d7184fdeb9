//! Pure Rust backend built on the `image` crate.
//!
//! The `image` JPEG encoder only writes baseline JPEGs and never copies
//! EXIF/ICC metadata, so re-encoding is enough to satisfy the device.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use super::{tile_file_name, RasterError, RasterProcessor, DEFAULT_JPEG_QUALITY};
use crate::geo::RasterDimensions;

/// In-process raster processor.
#[derive(Debug, Clone, Copy)]
pub struct NativeProcessor {
    jpeg_quality: u8,
}

impl NativeProcessor {
    /// Creates a processor writing JPEGs at `jpeg_quality` (1-100).
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    fn open(&self, path: &Path) -> Result<DynamicImage, RasterError> {
        image::open(path).map_err(|source| RasterError::Image {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes `img` as an RGB baseline JPEG.
    fn write_jpeg(&self, img: &DynamicImage, path: &Path) -> Result<(), RasterError> {
        let file = File::create(path).map_err(|source| RasterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);

        let encoder = JpegEncoder::new_with_quality(&mut writer, self.jpeg_quality);
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(encoder)
            .map_err(|source| RasterError::Image {
                path: path.to_path_buf(),
                source,
            })?;

        // Dropping the writer would discard a failed final write
        writer.flush().map_err(|source| RasterError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for NativeProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

/// Largest size with the same aspect ratio and at most `max_pixels` pixels.
pub(crate) fn fit_pixel_budget(dims: RasterDimensions, max_pixels: u64) -> RasterDimensions {
    if dims.pixel_count() <= max_pixels {
        return dims;
    }

    let scale = (max_pixels as f64 / dims.pixel_count() as f64).sqrt();
    let mut width = ((dims.width as f64 * scale).floor() as u32).max(1);
    let mut height = ((dims.height as f64 * scale).floor() as u32).max(1);

    // Floating point can overshoot by one row or column
    while width as u64 * height as u64 > max_pixels && width > 1 && height > 1 {
        if width >= height {
            width -= 1;
        } else {
            height -= 1;
        }
    }

    RasterDimensions { width, height }
}

impl RasterProcessor for NativeProcessor {
    fn name(&self) -> &'static str {
        "native"
    }

    fn measure_dimensions(&self, path: &Path) -> Result<RasterDimensions, RasterError> {
        let (width, height) = image::image_dimensions(path).map_err(|source| RasterError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(RasterDimensions::new(width, height)?)
    }

    fn resize_to_pixel_budget(
        &self,
        input: &Path,
        max_pixels: u64,
        output: &Path,
    ) -> Result<(), RasterError> {
        let img = self.open(input)?;
        let current = RasterDimensions::new(img.width(), img.height())?;
        let target = fit_pixel_budget(current, max_pixels);

        debug!(from = %current, to = %target, "Resizing to pixel budget");

        let resized = img.resize_exact(target.width, target.height, FilterType::Lanczos3);
        self.write_jpeg(&resized, output)
    }

    fn normalize_for_device(&self, input: &Path, output: &Path) -> Result<(), RasterError> {
        let img = self.open(input)?;
        self.write_jpeg(&img, output)
    }

    fn crop_to_grid(
        &self,
        input: &Path,
        tile: RasterDimensions,
        output_dir: &Path,
        stem: &str,
    ) -> Result<Vec<PathBuf>, RasterError> {
        let img = self.open(input)?;
        let (width, height) = (img.width(), img.height());

        let mut tiles = Vec::new();
        for y in (0..height).step_by(tile.height as usize) {
            for x in (0..width).step_by(tile.width as usize) {
                let tile_width = tile.width.min(width - x);
                let tile_height = tile.height.min(height - y);
                let cropped = img.crop_imm(x, y, tile_width, tile_height);

                let path = output_dir.join(tile_file_name(stem, tiles.len()));
                self.write_jpeg(&cropped, &path)?;
                tiles.push(path);
            }
        }

        if tiles.is_empty() {
            return Err(RasterError::NoTiles {
                path: input.to_path_buf(),
            });
        }

        debug!(count = tiles.len(), "Cropped tiles");
        Ok(tiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_test_image(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        img.save(path).unwrap();
    }

    fn dims(width: u32, height: u32) -> RasterDimensions {
        RasterDimensions::new(width, height).unwrap()
    }

    #[test]
    fn test_fit_pixel_budget_under_budget_unchanged() {
        assert_eq!(fit_pixel_budget(dims(1000, 500), 1_000_000), dims(1000, 500));
    }

    #[test]
    fn test_fit_pixel_budget_preserves_aspect() {
        let fitted = fit_pixel_budget(dims(4000, 2000), 2_000_000);
        assert!(fitted.pixel_count() <= 2_000_000);
        assert_eq!(fitted, dims(2000, 1000));
    }

    #[test]
    fn test_fit_pixel_budget_never_exceeds() {
        for (w, h, budget) in [(3001, 1999, 1_048_576), (10_000, 7, 5_000), (7, 10_000, 5_000)] {
            let fitted = fit_pixel_budget(dims(w, h), budget);
            assert!(fitted.pixel_count() <= budget, "{}x{} -> {}", w, h, fitted);
            assert!(fitted.width >= 1 && fitted.height >= 1);
        }
    }

    #[test]
    fn test_measure_dimensions() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("src.png");
        write_test_image(&path, 300, 200);

        let processor = NativeProcessor::default();
        assert_eq!(processor.measure_dimensions(&path).unwrap(), dims(300, 200));
    }

    #[test]
    fn test_normalize_writes_jpeg() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("src.png");
        let output = dir.path().join("normalized.jpg");
        write_test_image(&input, 64, 48);

        let processor = NativeProcessor::default();
        processor.normalize_for_device(&input, &output).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        // SOI marker, and no progressive (SOF2) frame
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert!(!bytes.windows(2).any(|w| w == [0xFF, 0xC2]));
        assert_eq!(processor.measure_dimensions(&output).unwrap(), dims(64, 48));
    }

    #[test]
    fn test_resize_to_pixel_budget() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("src.png");
        let output = dir.path().join("small.jpg");
        write_test_image(&input, 400, 200);

        let processor = NativeProcessor::default();
        processor
            .resize_to_pixel_budget(&input, 20_000, &output)
            .unwrap();

        assert_eq!(processor.measure_dimensions(&output).unwrap(), dims(200, 100));
    }

    #[test]
    fn test_crop_to_grid_row_major_with_edges() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("src.png");
        write_test_image(&input, 250, 150);

        let processor = NativeProcessor::default();
        let tiles = processor
            .crop_to_grid(&input, dims(100, 100), dir.path(), "map")
            .unwrap();

        let sizes: Vec<RasterDimensions> = tiles
            .iter()
            .map(|t| processor.measure_dimensions(t).unwrap())
            .collect();
        assert_eq!(
            sizes,
            vec![
                dims(100, 100),
                dims(100, 100),
                dims(50, 100),
                dims(100, 50),
                dims(100, 50),
                dims(50, 50),
            ]
        );
        assert_eq!(tiles[0].file_name().unwrap(), "map_tile_000.jpg");
        assert_eq!(tiles[5].file_name().unwrap(), "map_tile_005.jpg");
    }

    #[test]
    fn test_missing_input_is_image_error() {
        let processor = NativeProcessor::default();
        let result = processor.measure_dimensions(Path::new("/nonexistent/kmztile.jpg"));
        assert!(matches!(result, Err(RasterError::Image { .. })));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_flush_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("small.png");
        // Small enough that the whole JPEG sits in the write buffer until flush
        write_test_image(&input, 4, 4);

        let processor = NativeProcessor::default();
        let result = processor.normalize_for_device(&input, Path::new("/dev/full"));
        match result {
            Err(RasterError::Io { path, .. }) => assert_eq!(path, Path::new("/dev/full")),
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
