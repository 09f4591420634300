//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anonymizer_core::{ProcessingParameters, parse_window_sizes};
use anonymizer_utils::{AppSettings, default_settings_path, normalize_path};
use anyhow::{Context, Result};
use log::info;

use crate::args::AnonymizeArgs;

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply command-line arguments on top of loaded or default settings.
///
/// Only syntax is checked here; ranges are validated when the parameters are built.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &AnonymizeArgs) -> Result<()> {
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim().to_ascii_lowercase();
        if !normalized.is_empty() {
            if normalized == "off" {
                settings.telemetry.enabled = false;
            }
            settings.telemetry.level = normalized;
        }
    }

    if let Some(model) = args.model.as_ref() {
        settings.model_path = Some(model.display().to_string());
    }

    let anonymize = &mut settings.anonymize;
    if let Some(confidence) = args.confidence {
        anonymize.confidence = confidence;
    }
    if let Some(min) = args.face_min_size {
        anonymize.face_min_size = min;
    }
    if let Some(expand) = args.face_expand {
        anonymize.face_expand = expand;
    }
    if let Some(factor) = args.pixelation_factor {
        anonymize.pixelation_factor = factor;
    }
    if let Some(text) = args.window_sizes.as_deref() {
        anonymize.window_sizes = parse_window_sizes(text)
            .with_context(|| format!("invalid --window-sizes '{text}'"))?;
    }
    if args.parallel_tiles {
        anonymize.parallel_tiles = true;
    }

    if let Some(codec) = args.video_codec.as_ref() {
        settings.video.codec = codec.trim().to_string();
    }
    Ok(())
}

/// Validate the `anonymize` section into pipeline parameters.
pub fn build_parameters(settings: &AppSettings) -> Result<ProcessingParameters> {
    ProcessingParameters::try_from(&settings.anonymize).context("invalid processing parameters")
}
