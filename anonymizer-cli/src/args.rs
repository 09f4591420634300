//! Command-line argument definitions for anonymizer-cli.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Blur every face in a folder of images and videos, or in a single file.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct AnonymizeArgs {
    /// Directory to anonymize. Output goes to a sibling `<name>_anonymized` directory.
    #[arg(value_name = "DIR", required_unless_present = "file", conflicts_with = "file")]
    pub directory: Option<PathBuf>,

    /// Anonymize a single image or video instead of a directory.
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Optional settings JSON. Defaults to `config/anonymizer.json` when present, otherwise built-in parameters.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the YuNet ONNX model (defaults to the settings file, then the bundled location).
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Minimum detection confidence in [0, 1].
    #[arg(long)]
    pub confidence: Option<f64>,

    /// Minimum accepted face box side, in pixels.
    #[arg(long)]
    pub face_min_size: Option<u32>,

    /// Fraction of the box size added on every side before blurring.
    #[arg(long)]
    pub face_expand: Option<f64>,

    /// Mosaic cell size, in pixels.
    #[arg(long)]
    pub pixelation_factor: Option<u32>,

    /// Comma separated sliding window sizes, for example `400,700`.
    #[arg(long, value_name = "SIZES")]
    pub window_sizes: Option<String>,

    /// Run the detection windows of a frame concurrently.
    #[arg(long, action = ArgAction::SetTrue)]
    pub parallel_tiles: bool,

    /// ffmpeg encoder used for video output (for example libx264, mpeg4).
    #[arg(long, value_name = "CODEC")]
    pub video_codec: Option<String>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,
}

impl AnonymizeArgs {
    /// The selected path and whether it was given as a directory.
    pub fn selection(&self) -> Option<(&PathBuf, bool)> {
        match (&self.directory, &self.file) {
            (Some(dir), _) => Some((dir, true)),
            (None, Some(file)) => Some((file, false)),
            (None, None) => None,
        }
    }
}
