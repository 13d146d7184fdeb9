//! End-to-end tests for the `kmztile` binary.

use std::path::Path;
use std::process::{Command, Output};

use image::{Rgb, RgbImage};
use tempfile::TempDir;

fn kmztile(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kmztile"))
        .args(args)
        .current_dir(cwd)
        // Keep the user's config file out of the way
        .env("HOME", cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run kmztile")
}

fn write_image(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 90]))
        .save(path)
        .unwrap();
}

#[test]
fn test_missing_image_prints_help() {
    let temp = TempDir::new().unwrap();
    let output = kmztile(&[], temp.path());

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--image"));
    assert!(stderr.contains("Usage"));
}

#[test]
fn test_malformed_name_is_usage_error() {
    let temp = TempDir::new().unwrap();
    write_image(&temp.path().join("holiday.png"), 10, 10);
    let out_dir = temp.path().join("out");

    let output = kmztile(
        &["-i", "holiday.png", "-o", out_dir.to_str().unwrap()],
        temp.path(),
    );

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("malformed"));
    assert!(stderr.contains("<map-name>"));
    assert!(!out_dir.exists());
}

#[test]
fn test_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    let output = kmztile(&["-i", "Lake_15.0_0.0_25.0_0.0.png"], temp.path());

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn test_native_run_writes_packages() {
    let temp = TempDir::new().unwrap();
    let image = temp.path().join("Lake_15.0_0.0_25.0_0.0.png");
    write_image(&image, 300, 200);

    // Small tiles through the config file keep the test fast
    let config = temp.path().join("config.ini");
    std::fs::write(&config, "[tiling]\ntile_size = 100\n").unwrap();

    let out_dir = temp.path().join("out");
    let manifest = temp.path().join("manifest.json");
    let output = kmztile(
        &[
            "--image",
            image.to_str().unwrap(),
            "--output-dir",
            out_dir.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--manifest",
            manifest.to_str().unwrap(),
            "--jobs",
            "2",
        ],
        temp.path(),
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let mut written: Vec<String> = std::fs::read_dir(&out_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    let expected: Vec<String> = (0..6).map(|i| format!("Lake_{:03}.kmz", i)).collect();
    assert_eq!(written, expected);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Lake"));
    assert!(stdout.contains("Packages:   6"));
    assert!(manifest.is_file());
}
