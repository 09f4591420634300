//! End-to-end anonymization of one image or video file.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use image::RgbImage;
use log::{debug, info};

use anonymizer_utils::timing_guard;

use crate::{
    detector::MultiScaleDetector,
    error::{AnonymizeError, Result},
    media::{MediaCodec, MediaKind, single_output_path},
    mosaic::FrameAnonymizer,
    oracle::FaceOracle,
    params::ProcessingParameters,
    progress::{Monotonic, ProgressReporter},
    worker::CancelToken,
};

/// Collaborators shared by every job of a run.
#[derive(Clone, Copy)]
pub struct JobContext<'a> {
    pub oracle: &'a dyn FaceOracle,
    pub codec: &'a dyn MediaCodec,
    pub params: &'a ProcessingParameters,
    /// Scan the tiles of each frame concurrently.
    pub parallel_tiles: bool,
    pub cancel: Option<&'a CancelToken>,
}

impl<'a> JobContext<'a> {
    pub fn new(
        oracle: &'a dyn FaceOracle,
        codec: &'a dyn MediaCodec,
        params: &'a ProcessingParameters,
    ) -> Self {
        Self {
            oracle,
            codec,
            params,
            parallel_tiles: false,
            cancel: None,
        }
    }

    pub fn with_parallel_tiles(mut self, parallel: bool) -> Self {
        self.parallel_tiles = parallel;
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(AnonymizeError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Detect faces on the untouched frame, then mosaic them in place.
    pub fn anonymize_frame(&self, frame: &mut RgbImage) -> Result<usize> {
        let detector = MultiScaleDetector::new(self.oracle);
        let boxes = detector.detect_all(frame, self.params, self.parallel_tiles)?;
        let found = boxes.len();
        let applied = FrameAnonymizer::new(self.params.pixelation_factor()).anonymize(frame, boxes);
        debug!("Frame: {found} boxes detected, {applied} mosaiced");
        Ok(applied)
    }
}

/// Lifecycle of a [`MediaJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Decoding,
    /// Number of frames written so far.
    Frame(u64),
    Encoding,
    Done,
    Failed(String),
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Decoding => f.write_str("decoding"),
            Self::Frame(n) => write!(f, "frame {n}"),
            Self::Encoding => f.write_str("encoding"),
            Self::Done => f.write_str("done"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// What a finished job produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub destination: PathBuf,
    pub kind: MediaKind,
    pub frames: u64,
    pub boxes_applied: usize,
}

/// One source file, one destination, processed exactly once.
#[derive(Debug)]
pub struct MediaJob {
    source: PathBuf,
    destination: PathBuf,
    kind: MediaKind,
    state: JobState,
}

impl MediaJob {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            kind,
            state: JobState::Pending,
        }
    }

    /// Job for a single selected file, written next to it as `<stem>_anonymized.<ext>`.
    pub fn for_file(source: impl Into<PathBuf>) -> Result<Self> {
        let source = source.into();
        let kind = MediaKind::from_path(&source).ok_or_else(|| {
            AnonymizeError::Selection(format!(
                "{} is not a supported image or video",
                source.display()
            ))
        })?;
        let destination = single_output_path(&source, kind);
        Ok(Self::new(source, destination, kind))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Decode, anonymize and encode the file, reporting per-file progress.
    ///
    /// Any failure leaves the job in [`JobState::Failed`] and is returned as-is.
    pub fn run(
        &mut self,
        ctx: &JobContext<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<JobOutcome> {
        if self.state != JobState::Pending {
            return Err(AnonymizeError::Selection(format!(
                "job for {} was already run ({})",
                self.source.display(),
                self.state
            )));
        }
        let _guard = timing_guard(format!("job::{}", self.source.display()), log::Level::Debug);
        info!("Processing {} {}", self.kind, self.source.display());

        let result = match self.kind {
            MediaKind::Image => self.run_image(ctx, progress),
            MediaKind::Video => self.run_video(ctx, progress),
        };
        match result {
            Ok(outcome) => {
                self.state = JobState::Done;
                info!("Saved {} to {}", self.kind, self.destination.display());
                Ok(outcome)
            }
            Err(err) => {
                self.state = JobState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    fn run_image(
        &mut self,
        ctx: &JobContext<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<JobOutcome> {
        self.state = JobState::Decoding;
        let mut frame = ctx
            .codec
            .read_image(&self.source)
            .map_err(|e| AnonymizeError::read(&self.source, format!("{e:#}")))?;

        self.state = JobState::Frame(0);
        let boxes_applied = ctx.anonymize_frame(&mut frame)?;
        self.state = JobState::Frame(1);

        self.state = JobState::Encoding;
        ctx.codec
            .write_image(&self.destination, &frame)
            .map_err(|e| AnonymizeError::write(&self.destination, format!("{e:#}")))?;
        progress.local(1.0);

        Ok(self.outcome(1, boxes_applied))
    }

    fn run_video(
        &mut self,
        ctx: &JobContext<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<JobOutcome> {
        self.state = JobState::Decoding;
        let mut reader = ctx
            .codec
            .open_video(&self.source)
            .map_err(|e| AnonymizeError::read(&self.source, format!("{e:#}")))?;
        let info = reader.info().clone();
        if info.frame_count == 0 {
            return Err(AnonymizeError::read(&self.source, "video reports zero frames"));
        }

        let mut writer = ctx
            .codec
            .create_video(&self.destination, &info)
            .map_err(|e| AnonymizeError::write(&self.destination, format!("{e:#}")))?;

        let mut local = Monotonic::default();
        let mut frames = 0u64;
        let mut boxes_applied = 0usize;
        loop {
            ctx.check_cancelled()?;
            let next = reader
                .next_frame()
                .map_err(|e| AnonymizeError::read(&self.source, format!("{e:#}")))?;
            let Some(mut frame) = next else {
                break;
            };

            boxes_applied += ctx.anonymize_frame(&mut frame)?;
            writer
                .write_frame(&frame)
                .map_err(|e| AnonymizeError::write(&self.destination, format!("{e:#}")))?;

            frames += 1;
            self.state = JobState::Frame(frames);
            progress.local(local.advance(frames as f32 / info.frame_count as f32));
        }

        if frames == 0 {
            return Err(AnonymizeError::read(&self.source, "no frames could be decoded"));
        }
        if frames != info.frame_count {
            debug!(
                "{} announced {} frames, decoded {frames}",
                self.source.display(),
                info.frame_count
            );
        }

        self.state = JobState::Encoding;
        writer
            .finish()
            .map_err(|e| AnonymizeError::write(&self.destination, format!("{e:#}")))?;
        progress.local(local.advance(1.0));

        Ok(self.outcome(frames, boxes_applied))
    }

    fn outcome(&self, frames: u64, boxes_applied: usize) -> JobOutcome {
        JobOutcome {
            destination: self.destination.clone(),
            kind: self.kind,
            frames,
            boxes_applied,
        }
    }
}
