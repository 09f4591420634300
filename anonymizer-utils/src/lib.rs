//! Common helpers shared across the anonymizer crates.

/// Application configuration and settings management.
pub mod config;
/// Image loading, saving, resizing, and tensor conversion.
pub mod image_utils;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::LevelFilter;

pub use config::{
    AnonymizeSettings, AppSettings, DEFAULT_MODEL_PATH, DetectorSettings, TelemetrySettings,
    VideoSettings, default_settings_path,
};
pub use image_utils::{load_rgb_image, resize_rgb, rgb_to_bgr_chw, save_rgb_image};
pub use telemetry::{
    TELEMETRY_TARGET, TimingGuard, configure as configure_telemetry, telemetry_allows,
    telemetry_enabled, timing_guard,
};

/// Initialize logging once for every front end.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. Telemetry records are always
/// let through the logger and gated by [`configure_telemetry`] instead.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(TELEMETRY_TARGET, LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
