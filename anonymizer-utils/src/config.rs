//! Shared configuration types consumed across the anonymizer workspace.
//!
//! These structures mirror the user-facing options (detection threshold, mosaic strength,
//! tile sizes, video encoding) and can be serialized to disk so the same settings file works
//! for every front end.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Default location of the YuNet face detection model.
pub const DEFAULT_MODEL_PATH: &str = "models/face_detection_yunet_2023mar_640.onnx";

/// Parameters of the face detection oracle itself.
///
/// These only shape how a single tile is scanned; the multi-scale tiling and the box geometry
/// are driven by [`AnonymizeSettings`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorSettings {
    /// Model input width in pixels. Every tile is resized to this width before inference.
    pub width: u32,
    /// Model input height in pixels.
    pub height: u32,
    /// Overlap threshold used to collapse the raw anchor grid of one inference run.
    pub nms_threshold: f32,
    /// Maximum number of candidates kept per inference run.
    pub top_k: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 640,
            nms_threshold: 0.3,
            top_k: 5_000,
        }
    }
}

/// User-facing anonymization options.
///
/// Values are stored unvalidated; the core crate turns them into validated processing
/// parameters before any job starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnonymizeSettings {
    /// Minimum detector confidence (0.0 - 1.0).
    pub confidence: f64,
    /// Minimum accepted face box side in pixels (0 - 100).
    pub face_min_size: u32,
    /// Fraction by which every detected box grows outward (0.0 - 1.0).
    pub face_expand: f64,
    /// Mosaic divisor (1 - 150). Larger values produce coarser blocks.
    pub pixelation_factor: u32,
    /// Detection tile sizes in pixels, scanned in order.
    pub window_sizes: Vec<u32>,
    /// Run the tiles of a frame through the detector concurrently.
    pub parallel_tiles: bool,
}

impl Default for AnonymizeSettings {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            face_min_size: 5,
            face_expand: 0.2,
            pixelation_factor: 20,
            window_sizes: vec![400, 700],
            parallel_tiles: false,
        }
    }
}

/// Video encoding preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoSettings {
    /// ffmpeg encoder name used for anonymized videos.
    pub codec: String,
    /// Constant rate factor handed to the encoder (lower is better quality).
    pub crf: u8,
    /// Optional explicit path to the `ffmpeg` binary.
    pub ffmpeg: Option<PathBuf>,
    /// Optional explicit path to the `ffprobe` binary.
    pub ffprobe: Option<PathBuf>,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            crf: 23,
            ffmpeg: None,
            ffprobe: None,
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent settings consumed by the CLI and any other front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Optional override for the YuNet ONNX model path.
    pub model_path: Option<String>,
    /// Oracle input size and per-run suppression.
    pub detector: DetectorSettings,
    /// Face box geometry, mosaic strength and tiling.
    pub anonymize: AnonymizeSettings,
    /// Video encoder preferences.
    pub video: VideoSettings,
    /// Telemetry and diagnostics preferences.
    pub telemetry: TelemetrySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            model_path: Some(DEFAULT_MODEL_PATH.into()),
            detector: DetectorSettings::default(),
            anonymize: AnonymizeSettings::default(),
            video: VideoSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl AppSettings {
    /// Load settings from a JSON file.
    ///
    /// Missing sections fall back to their defaults; a missing `model_path` resolves to
    /// [`DEFAULT_MODEL_PATH`].
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;

        if settings.model_path.is_none() {
            settings.model_path = Some(DEFAULT_MODEL_PATH.into());
        }

        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    /// The configured model path, or the default one.
    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(self.model_path.as_deref().unwrap_or(DEFAULT_MODEL_PATH))
    }
}

/// Returns the default path for persisted settings (`config/anonymizer.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/anonymizer.json"))
        .unwrap_or_else(|_| PathBuf::from("config/anonymizer.json"))
}
