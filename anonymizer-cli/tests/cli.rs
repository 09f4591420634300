use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use image::{ImageBuffer, Rgb};
use tempfile::tempdir;

fn find_model_path() -> Option<PathBuf> {
    [
        "models/face_detection_yunet_2023mar_640.onnx",
        "../models/face_detection_yunet_2023mar_640.onnx",
    ]
    .into_iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}

fn write_sample(path: &Path) -> Result<(), Box<dyn Error>> {
    let img = ImageBuffer::from_fn(48, 32, |x, y| {
        let r = ((x * 5 + y) % 255) as u8;
        Rgb([r, 96, 255u8.saturating_sub(r)])
    });
    img.save(path)?;
    Ok(())
}

fn utf8(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

fn stderr_of(args: &[&str]) -> Result<String, Box<dyn Error>> {
    let output = cargo_bin_cmd!("anonymizer-cli").args(args).output()?;
    assert!(!output.status.success(), "command should have failed");
    Ok(String::from_utf8_lossy(&output.stderr).into_owned())
}

#[test]
fn missing_directory_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let missing = dir.path().join("nowhere");
    let stderr = stderr_of(&[utf8(&missing)])?;
    assert!(stderr.contains("does not exist"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn file_given_as_directory_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let image = dir.path().join("face.png");
    write_sample(&image)?;
    let stderr = stderr_of(&[utf8(&image)])?;
    assert!(stderr.contains("is not a directory"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn malformed_window_sizes_fail_before_model_load() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let stderr = stderr_of(&[
        utf8(dir.path()),
        "--window-sizes",
        "400,,700",
        "--model",
        "missing.onnx",
    ])?;
    assert!(stderr.contains("--window-sizes"), "stderr: {stderr}");
    assert!(!stderr.contains("model"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn out_of_range_confidence_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let stderr = stderr_of(&[
        utf8(dir.path()),
        "--confidence",
        "1.5",
    ])?;
    assert!(stderr.contains("confidence"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn unsupported_single_file_fails() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let notes = dir.path().join("notes.txt");
    fs::write(&notes, "not media")?;
    let stderr = stderr_of(&["--file", utf8(&notes)])?;
    assert!(stderr.contains("not a supported"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn missing_model_is_reported() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let absent = dir.path().join("absent.onnx");
    let stderr = stderr_of(&[utf8(dir.path()), "--model", utf8(&absent)])?;
    assert!(stderr.contains("model not found"), "stderr: {stderr}");
    Ok(())
}

#[test]
fn directory_run_prints_output_root() -> Result<(), Box<dyn Error>> {
    let Some(model) = find_model_path() else {
        eprintln!("Skipping test: YuNet model not found");
        return Ok(());
    };
    let work = tempdir()?;
    let root = work.path().join("holiday");
    fs::create_dir_all(root.join("day1"))?;
    write_sample(&root.join("a.png"))?;
    write_sample(&root.join("day1/b.jpg"))?;

    let output = cargo_bin_cmd!("anonymizer-cli")
        .arg(&root)
        .arg("--model")
        .arg(&model)
        .output()?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let expected = work.path().canonicalize()?.join("holiday_anonymized");
    let stdout = String::from_utf8(output.stdout)?;
    assert_eq!(stdout.trim(), expected.display().to_string());
    assert!(expected.join("a.png").exists());
    assert!(expected.join("day1/b.jpg").exists());
    Ok(())
}
