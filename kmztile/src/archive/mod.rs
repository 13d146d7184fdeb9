//! Package archiving.
//!
//! A package is a zip (`.kmz`) of one flat directory: the overlay descriptor
//! and its tile image sit at the archive root.
//!
//! - [`ZipArchiver`]: in-process, `zip` crate
//! - [`ShellZipArchiver`]: runs the `zip` command-line tool

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Package file extension.
pub const PACKAGE_EXTENSION: &str = "kmz";

/// Archives the contents of a flat directory into a single file.
pub trait PackageArchiver: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Verifies that any external programs are installed.
    fn check_available(&self) -> Result<(), ArchiveError> {
        Ok(())
    }

    /// Writes every file in `dir` to the root of `archive_path`.
    fn archive_directory(&self, dir: &Path, archive_path: &Path) -> Result<(), ArchiveError>;
}

/// Which archiver to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveBackend {
    #[default]
    Native,
    Shell,
}

impl ArchiveBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveBackend::Native => "native",
            ArchiveBackend::Shell => "shell",
        }
    }
}

impl fmt::Display for ArchiveBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(ArchiveBackend::Native),
            "shell" | "zip" => Ok(ArchiveBackend::Shell),
            other => Err(format!(
                "unknown archive backend '{}' (expected 'native' or 'shell')",
                other
            )),
        }
    }
}

/// Errors from archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("'{tool}' command not found: {source}. Please install it using your package manager (e.g., 'apt install {tool}')")]
    ToolNotFound {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("'{tool}' failed for {}: {stderr}", .path.display())]
    ToolFailed {
        tool: String,
        path: PathBuf,
        stderr: String,
    },

    #[error("Failed to write archive {}: {source}", .path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Package directory must be flat, found subdirectory {}", .path.display())]
    NotFlat { path: PathBuf },
}

/// Creates the archiver for a backend.
pub fn create_archiver(backend: ArchiveBackend, zip_program: &str) -> Box<dyn PackageArchiver> {
    match backend {
        ArchiveBackend::Native => Box::new(ZipArchiver::new()),
        ArchiveBackend::Shell => Box::new(ShellZipArchiver::new(zip_program)),
    }
}

/// Lists files in a flat directory, sorted by name.
fn list_flat_dir(dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let io_err = |source| ArchiveError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            return Err(ArchiveError::NotFlat { path });
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// In-process zip writer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiver;

impl ZipArchiver {
    pub fn new() -> Self {
        Self
    }
}

impl PackageArchiver for ZipArchiver {
    fn name(&self) -> &'static str {
        "native"
    }

    fn archive_directory(&self, dir: &Path, archive_path: &Path) -> Result<(), ArchiveError> {
        let files = list_flat_dir(dir)?;

        let file = File::create(archive_path).map_err(|source| ArchiveError::Io {
            path: archive_path.to_path_buf(),
            source,
        })?;
        let zip_err = |source| ArchiveError::Zip {
            path: archive_path.to_path_buf(),
            source,
        };

        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for path in files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            writer.start_file(name, options).map_err(zip_err)?;

            let mut source = File::open(&path).map_err(|source| ArchiveError::Io {
                path: path.clone(),
                source,
            })?;
            io::copy(&mut source, &mut writer).map_err(|source| ArchiveError::Io {
                path: archive_path.to_path_buf(),
                source,
            })?;
        }

        writer.finish().map_err(zip_err)?;
        Ok(())
    }
}

/// Archiver that runs `zip -r <archive> .` inside the package directory.
#[derive(Debug, Clone)]
pub struct ShellZipArchiver {
    program: String,
}

impl ShellZipArchiver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ShellZipArchiver {
    fn default() -> Self {
        Self::new("zip")
    }
}

impl PackageArchiver for ShellZipArchiver {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn check_available(&self) -> Result<(), ArchiveError> {
        let output = Command::new(&self.program)
            .arg("-v")
            .output()
            .map_err(|source| ArchiveError::ToolNotFound {
                tool: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ArchiveError::ToolFailed {
                tool: self.program.clone(),
                path: PathBuf::from(&self.program),
                stderr: format!(
                    "'{}' command failed. Please ensure it is properly installed.",
                    self.program
                ),
            });
        }
        Ok(())
    }

    fn archive_directory(&self, dir: &Path, archive_path: &Path) -> Result<(), ArchiveError> {
        // zip runs inside `dir`, so the archive path must not be relative
        let abs_archive_path = if archive_path.is_absolute() {
            archive_path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|source| ArchiveError::Io {
                    path: archive_path.to_path_buf(),
                    source,
                })?
                .join(archive_path)
        };

        let output = Command::new(&self.program)
            .current_dir(dir)
            .arg("-r")
            .arg("-q")
            .arg("-X")
            .arg(&abs_archive_path)
            .arg(".")
            .output()
            .map_err(|source| ArchiveError::ToolNotFound {
                tool: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ArchiveError::ToolFailed {
                tool: self.program.clone(),
                path: abs_archive_path,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}
