//! Shared doubles for pipeline integration tests.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{Result, anyhow};
use image::{Rgb, RgbImage};

use anonymizer_core::{MediaCodec, RelativeBox, VideoInfo, VideoReader, VideoWriter};

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Oracle that "detects" the bounding rectangle of pure red pixels in a tile.
pub fn red_square(tile: &RgbImage, _min_confidence: f32) -> Result<Vec<RelativeBox>> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in tile.enumerate_pixels() {
        if *pixel == RED {
            let (x1, y1, x2, y2) = bounds.unwrap_or((x, y, x, y));
            bounds = Some((x1.min(x), y1.min(y), x2.max(x), y2.max(y)));
        }
    }
    let (w, h) = (tile.width() as f32, tile.height() as f32);
    Ok(bounds
        .map(|(x1, y1, x2, y2)| RelativeBox {
            xmin: x1 as f32 / w,
            ymin: y1 as f32 / h,
            width: (x2 + 1 - x1) as f32 / w,
            height: (y2 + 1 - y1) as f32 / h,
            score: 0.99,
        })
        .into_iter()
        .collect())
}

/// Gradient frame with a red square at `[x, x + size) x [y, y + size)`.
pub fn frame_with_square(width: u32, height: u32, x: u32, y: u32, size: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |px, py| {
        if (x..x + size).contains(&px) && (y..y + size).contains(&py) {
            RED
        } else {
            Rgb([(px * 3 % 200) as u8, (py * 5 % 200) as u8, ((px + py) % 200) as u8])
        }
    })
}

#[derive(Debug, Clone)]
pub struct StoredVideo {
    pub info: VideoInfo,
    pub frames: Vec<RgbImage>,
}

/// Images go to disk through the default codec methods; videos live in memory, keyed by
/// canonical path, with an empty placeholder file on disk so directory walks can find them.
#[derive(Debug, Clone, Default)]
pub struct MemoryCodec {
    videos: Arc<Mutex<HashMap<PathBuf, StoredVideo>>>,
}

impl MemoryCodec {
    pub fn add_video(&self, path: &Path, frames: Vec<RgbImage>, frame_count: u64) {
        fs::write(path, b"").expect("write placeholder");
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((16, 16));
        let info = VideoInfo {
            width,
            height,
            frame_rate: "25/1".into(),
            frame_count,
        };
        self.videos
            .lock()
            .unwrap()
            .insert(key(path), StoredVideo { info, frames });
    }

    pub fn video(&self, path: &Path) -> Option<StoredVideo> {
        self.videos.lock().unwrap().get(&key(path)).cloned()
    }
}

fn key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

struct MemoryReader {
    info: VideoInfo,
    frames: std::vec::IntoIter<RgbImage>,
}

impl VideoReader for MemoryReader {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        Ok(self.frames.next())
    }
}

struct MemoryWriter {
    path: PathBuf,
    info: VideoInfo,
    frames: Vec<RgbImage>,
    store: Arc<Mutex<HashMap<PathBuf, StoredVideo>>>,
}

impl VideoWriter for MemoryWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.store.lock().unwrap().insert(
            key(&this.path),
            StoredVideo {
                info: this.info,
                frames: this.frames,
            },
        );
        Ok(())
    }
}

impl MediaCodec for MemoryCodec {
    fn open_video(&self, path: &Path) -> Result<Box<dyn VideoReader>> {
        let stored = self
            .video(path)
            .ok_or_else(|| anyhow!("no such video: {}", path.display()))?;
        Ok(Box::new(MemoryReader {
            info: stored.info,
            frames: stored.frames.into_iter(),
        }))
    }

    fn create_video(&self, path: &Path, info: &VideoInfo) -> Result<Box<dyn VideoWriter>> {
        fs::write(path, b"")?;
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            info: info.clone(),
            frames: Vec::new(),
            store: Arc::clone(&self.videos),
        }))
    }
}
