mod args;
mod config;

use std::sync::Arc;

use anonymizer_core::{
    FaceOracle, FfmpegCodec, JobEvent, JobRequest, LogProgress, MediaCodec, ProgressReporter,
    YuNetOracle, YuNetOracleConfig, spawn_job,
};
use anonymizer_utils::{configure_telemetry, init_logging, normalize_path};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};

use crate::{
    args::AnonymizeArgs,
    config::{apply_cli_overrides, build_parameters, load_settings},
};

fn main() -> Result<()> {
    init_logging(log::LevelFilter::Info)?;
    let args = AnonymizeArgs::parse();

    let Some((selected, is_directory)) = args.selection() else {
        anyhow::bail!("either a directory or --file must be given");
    };
    let path = normalize_path(selected)?;
    if is_directory {
        anyhow::ensure!(path.is_dir(), "{} is not a directory", path.display());
    } else {
        anyhow::ensure!(path.is_file(), "{} is not a file", path.display());
    }

    let mut settings = load_settings(args.config.as_ref())?;
    apply_cli_overrides(&mut settings, &args)?;
    let params = build_parameters(&settings)?;
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );

    let request = JobRequest::from_selection(Some(path), Some(params))?
        .with_parallel_tiles(settings.anonymize.parallel_tiles);

    let model_path = settings.model_path();
    let model_path = normalize_path(&model_path)
        .with_context(|| format!("YuNet model not found at {}", model_path.display()))?;
    let oracle_config = YuNetOracleConfig::from(&settings.detector);
    info!(
        "Loading YuNet model from {} at resolution {}x{}",
        model_path.display(),
        oracle_config.input_size.width,
        oracle_config.input_size.height
    );
    let oracle: Arc<dyn FaceOracle> = Arc::new(YuNetOracle::load(&model_path, oracle_config)?);

    let codec = FfmpegCodec::from_settings(&settings.video);
    if !codec.tools().available() {
        warn!("ffmpeg/ffprobe not found; video files will fail to process");
    }
    let codec: Arc<dyn MediaCodec> = Arc::new(codec);

    let handle = spawn_job(request, oracle, codec);
    let summary = handle.wait_with(|event| match event {
        JobEvent::Global {
            progress,
            kind,
            path,
        } => LogProgress.global(*progress, *kind, path),
        JobEvent::Local(progress) => debug!("file progress {:.1}%", progress * 100.0),
        JobEvent::Finished(_) => {}
    })?;

    info!("Anonymized output written to {}", summary.destination().display());
    println!("{}", summary.destination().display());
    Ok(())
}
