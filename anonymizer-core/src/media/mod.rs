//! Media kinds, output naming, and codec backends.

pub mod codec;
pub mod ffmpeg;

use std::{
    ffi::OsStr,
    fmt,
    path::{Path, PathBuf},
};

pub use codec::{MediaCodec, VideoInfo, VideoReader, VideoWriter};
pub use ffmpeg::{FfmpegCodec, FfmpegTools};

/// Still image extensions accepted as input (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
/// Video extensions accepted as input (compared case-insensitively).
pub const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "avi", "mov"];
/// Every anonymized video is written with this extension.
pub const VIDEO_OUTPUT_EXTENSION: &str = "mp4";

const OUTPUT_SUFFIX: &str = "_anonymized";

/// Kind of media a job processes, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify `path` by extension. Unsupported or missing extensions yield `None`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(OsStr::to_str)?.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination of a single-file run: `<stem>_anonymized.<ext>` next to the source.
///
/// Images keep their extension; videos are normalized to [`VIDEO_OUTPUT_EXTENSION`].
pub fn single_output_path(source: &Path, kind: MediaKind) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = match kind {
        MediaKind::Video => Some(VIDEO_OUTPUT_EXTENSION.to_string()),
        MediaKind::Image => source
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned()),
    };
    let renamed = match extension {
        Some(ext) => PathBuf::from(format!("{stem}{OUTPUT_SUFFIX}.{ext}")),
        None => PathBuf::from(format!("{stem}{OUTPUT_SUFFIX}")),
    };
    match source.parent() {
        Some(parent) => parent.join(renamed),
        None => renamed,
    }
}

/// Destination root of a directory run: the sibling `<dirname>_anonymized`.
///
/// Returns `None` for paths without a name or parent, such as a filesystem root.
pub fn batch_output_root(source_root: &Path) -> Option<PathBuf> {
    let name = source_root.file_name()?.to_string_lossy();
    let parent = source_root.parent()?;
    Some(parent.join(format!("{name}{OUTPUT_SUFFIX}")))
}

/// Destination of `file` inside a directory run, mirroring its relative subdirectory.
///
/// The file name is kept; videos get [`VIDEO_OUTPUT_EXTENSION`].
pub fn mirrored_output_path(
    source_root: &Path,
    output_root: &Path,
    file: &Path,
    kind: MediaKind,
) -> PathBuf {
    let relative = file.strip_prefix(source_root).unwrap_or(file);
    let mut target = output_root.join(relative);
    if kind == MediaKind::Video {
        target.set_extension(VIDEO_OUTPUT_EXTENSION);
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(MediaKind::from_path(Path::new("a/b.JPG")), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path(Path::new("b.png")), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_path(Path::new("c.Mov")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(Path::new("d.avi")), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(MediaKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn single_file_names() {
        assert_eq!(
            single_output_path(Path::new("/data/party.jpeg"), MediaKind::Image),
            PathBuf::from("/data/party_anonymized.jpeg")
        );
        assert_eq!(
            single_output_path(Path::new("/data/clip.avi"), MediaKind::Video),
            PathBuf::from("/data/clip_anonymized.mp4")
        );
        assert_eq!(
            single_output_path(Path::new("holiday.v2.png"), MediaKind::Image),
            PathBuf::from("holiday.v2_anonymized.png")
        );
    }

    #[test]
    fn batch_paths_mirror_subdirectories() {
        let root = Path::new("/media/shots");
        let out = batch_output_root(root).unwrap();
        assert_eq!(out, PathBuf::from("/media/shots_anonymized"));

        assert_eq!(
            mirrored_output_path(root, &out, Path::new("/media/shots/2024/a.png"), MediaKind::Image),
            PathBuf::from("/media/shots_anonymized/2024/a.png")
        );
        assert_eq!(
            mirrored_output_path(root, &out, Path::new("/media/shots/b.MOV"), MediaKind::Video),
            PathBuf::from("/media/shots_anonymized/b.mp4")
        );
        assert!(batch_output_root(Path::new("/")).is_none());
    }
}
