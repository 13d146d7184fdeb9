//! ImageMagick / GraphicsMagick backend.
//!
//! Runs `convert` and `identify` as child processes. For GraphicsMagick,
//! configure the programs as `gm convert` and `gm identify`.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use super::{collect_tiles, RasterError, RasterProcessor};
use crate::geo::RasterDimensions;

/// Shell-based raster processor.
#[derive(Debug, Clone)]
pub struct MagickProcessor {
    convert: Vec<String>,
    identify: Vec<String>,
}

impl MagickProcessor {
    /// Creates a processor from command lines such as `"convert"` or
    /// `"gm convert"`.
    pub fn new(convert: &str, identify: &str) -> Self {
        Self {
            convert: split_command(convert, "convert"),
            identify: split_command(identify, "identify"),
        }
    }

    fn convert_tool(&self) -> String {
        self.convert.join(" ")
    }

    /// Runs a tool and returns its output, failing on non-zero exit.
    fn run(&self, command: &[String], args: &[&str], path: &Path) -> Result<Output, RasterError> {
        let tool = command.join(" ");
        debug!(tool = %tool, ?args, "Running raster tool");

        let output = Command::new(&command[0])
            .args(&command[1..])
            .args(args)
            .output()
            .map_err(|source| RasterError::ToolNotFound {
                tool: tool.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RasterError::ToolFailed {
                tool,
                path: path.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }
}

impl Default for MagickProcessor {
    fn default() -> Self {
        Self::new("convert", "identify")
    }
}

/// Splits a configured command line into program and leading arguments.
fn split_command(command: &str, fallback: &str) -> Vec<String> {
    let parts: Vec<String> = command.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        vec![fallback.to_string()]
    } else {
        parts
    }
}

/// Parses `identify -format "%w %h\n"` output.
///
/// Multi-frame images print one line per frame; only the first frame's size
/// is used.
fn parse_identify_output(output: &str) -> Option<(u32, u32)> {
    let mut parts = output.lines().next()?.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some((width, height))
}

/// Lossless path-to-argument conversion, failing on non-UTF-8 paths.
fn path_arg(path: &Path) -> Result<&str, RasterError> {
    path.to_str().ok_or_else(|| RasterError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path is not valid UTF-8"),
    })
}

impl RasterProcessor for MagickProcessor {
    fn name(&self) -> &'static str {
        "magick"
    }

    fn check_available(&self) -> Result<(), RasterError> {
        // Only spawning is checked; `-version` exit status differs between suites.
        for command in [&self.convert, &self.identify] {
            Command::new(&command[0])
                .args(&command[1..])
                .arg("-version")
                .output()
                .map_err(|source| RasterError::ToolNotFound {
                    tool: command.join(" "),
                    source,
                })?;
        }
        Ok(())
    }

    fn measure_dimensions(&self, path: &Path) -> Result<RasterDimensions, RasterError> {
        let output = self.run(&self.identify, &["-format", "%w %h\\n", path_arg(path)?], path)?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        let (width, height) =
            parse_identify_output(&stdout).ok_or_else(|| RasterError::UnexpectedOutput {
                tool: self.identify.join(" "),
                output: stdout.trim().to_string(),
            })?;

        Ok(RasterDimensions::new(width, height)?)
    }

    fn resize_to_pixel_budget(
        &self,
        input: &Path,
        max_pixels: u64,
        output: &Path,
    ) -> Result<(), RasterError> {
        let budget = format!("@{}", max_pixels);
        self.run(
            &self.convert,
            &[path_arg(input)?, "-resize", &budget, path_arg(output)?],
            input,
        )?;
        Ok(())
    }

    fn normalize_for_device(&self, input: &Path, output: &Path) -> Result<(), RasterError> {
        self.run(
            &self.convert,
            &[
                path_arg(input)?,
                "-strip",
                "-interlace",
                "none",
                path_arg(output)?,
            ],
            input,
        )?;
        Ok(())
    }

    fn crop_to_grid(
        &self,
        input: &Path,
        tile: RasterDimensions,
        output_dir: &Path,
        stem: &str,
    ) -> Result<Vec<PathBuf>, RasterError> {
        let geometry = format!("{}x{}", tile.width, tile.height);
        let pattern = output_dir.join(format!("{}_tile_%03d.jpg", stem));

        self.run(
            &self.convert,
            &[
                path_arg(input)?,
                "-crop",
                &geometry,
                "+repage",
                "+adjoin",
                path_arg(&pattern)?,
            ],
            input,
        )?;

        let tiles = collect_tiles(output_dir, stem)?;
        debug!(tool = %self.convert_tool(), count = tiles.len(), "Cropped tiles");
        Ok(tiles)
    }
}
