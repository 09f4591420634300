//! Face anonymization pipeline.
//!
//! Frames are scanned by a multi-scale sliding-window detector, every detected face box is
//! grown and clamped, and the boxes are replaced with a mosaic taken from one whole-frame
//! mosaic. Jobs wrap that per-frame work for a single image, a video, or a directory tree.

/// Directory discovery, ordering and batch execution.
pub mod batch;
/// Multi-scale tiling and lazy detection.
pub mod detector;
/// Typed pipeline errors.
pub mod error;
/// Box expansion, clamping and filtering.
pub mod geometry;
/// Single-file job state machine.
pub mod job;
/// Media kinds, output naming and codecs.
pub mod media;
/// Whole-frame mosaic and box compositing.
pub mod mosaic;
/// Face detection backends.
pub mod oracle;
/// Validated processing parameters.
pub mod params;
/// Progress sinks.
pub mod progress;
/// Background job execution and cancellation.
pub mod worker;

pub use batch::{BatchCoordinator, BatchEntry, BatchPlan, BatchSummary, discover_media};
pub use detector::{FaceBoxes, MultiScaleDetector, detection_windows, tile_spans};
pub use error::{AnonymizeError, Result};
pub use geometry::{DetectionWindow, FaceBox, RawBox, RelativeBox, accept, clamp, expand};
pub use job::{JobContext, JobOutcome, JobState, MediaJob};
pub use media::{
    FfmpegCodec, FfmpegTools, MediaCodec, MediaKind, VideoInfo, VideoReader, VideoWriter,
};
pub use mosaic::{FrameAnonymizer, whole_frame_mosaic};
pub use oracle::{FaceOracle, InputSize, YuNetOracle, YuNetOracleConfig};
pub use params::{ProcessingParameters, parse_window_sizes};
pub use progress::{
    ChannelProgress, LogProgress, NoProgress, ProgressEvent, ProgressReporter, RecordingProgress,
};
pub use worker::{CancelToken, JobEvent, JobHandle, JobRequest, JobSummary, JobTarget, spawn_job};
