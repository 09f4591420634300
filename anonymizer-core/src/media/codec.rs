use std::path::Path;

use anyhow::Result;
use image::RgbImage;

use anonymizer_utils::{load_rgb_image, save_rgb_image};

/// Stream properties copied from the source video to its anonymized output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Frame rate exactly as the container reports it, e.g. `30000/1001`.
    pub frame_rate: String,
    /// Frames the source claims to hold. Used for progress only.
    pub frame_count: u64,
}

/// Sequential frame source. Frames come out in presentation order.
pub trait VideoReader: Send {
    fn info(&self) -> &VideoInfo;

    /// Decode the next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Sequential frame sink writing one video file.
pub trait VideoWriter: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Flush and close the container.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Decoding and encoding capability used by jobs.
///
/// Image methods default to the `image` crate; video support has to be provided.
pub trait MediaCodec: Send + Sync {
    fn read_image(&self, path: &Path) -> Result<RgbImage> {
        load_rgb_image(path)
    }

    fn write_image(&self, path: &Path, image: &RgbImage) -> Result<()> {
        save_rgb_image(path, image)
    }

    /// Open `path` and read its stream properties without decoding frames yet.
    fn open_video(&self, path: &Path) -> Result<Box<dyn VideoReader>>;

    /// Create `path` for frames shaped like `info`.
    fn create_video(&self, path: &Path, info: &VideoInfo) -> Result<Box<dyn VideoWriter>>;
}
