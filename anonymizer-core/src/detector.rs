//! Multi-scale sliding-window face detection.
//!
//! For every configured window size the frame is covered by overlapping square tiles
//! (roughly half a window apart), each tile is handed to the [`FaceOracle`], and the
//! resulting boxes are mapped back to frame coordinates. One extra pass scans the whole frame
//! at once. Boxes found by several windows are all reported; nothing is merged.

use std::borrow::Cow;

use image::RgbImage;
use log::{debug, trace};
use rayon::prelude::*;

use anonymizer_utils::timing_guard;

use crate::{
    error::{AnonymizeError, Result},
    geometry::{DetectionWindow, FaceBox, resolve},
    oracle::FaceOracle,
    params::ProcessingParameters,
};

/// Tile intervals `(start, len)` covering `[0, dimension)` for one window size.
///
/// The tile count is `ceil(dimension / (window / 2))`, computed as `ceil(2 * dimension /
/// window)` so a window of one pixel still advances. Starts are spread evenly over the axis and
/// tiles running past the edge are clipped.
pub fn tile_spans(dimension: u32, window: u32) -> Vec<(u32, u32)> {
    if dimension == 0 || window == 0 {
        return Vec::new();
    }
    let (d, s) = (dimension as u64, window as u64);
    let count = (2 * d).div_ceil(s);
    (0..count)
        .map(|i| {
            let start = i * d / count;
            let len = s.min(d - start);
            (start as u32, len as u32)
        })
        .collect()
}

/// Every window scanned for a frame, in scan order: the tiles of each window size as
/// configured (row by row), then the full frame.
pub fn detection_windows(width: u32, height: u32, window_sizes: &[u32]) -> Vec<DetectionWindow> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let mut windows = Vec::new();
    for &size in window_sizes {
        let columns = tile_spans(width, size);
        for (y, tile_h) in tile_spans(height, size) {
            windows.extend(columns.iter().map(|&(x, tile_w)| DetectionWindow {
                x,
                y,
                width: tile_w,
                height: tile_h,
            }));
        }
    }
    windows.push(DetectionWindow::full(width, height));
    windows
}

/// Coordinates tile scanning for one oracle.
///
/// The detector holds no per-frame state; parameters are supplied with every call.
#[derive(Clone, Copy)]
pub struct MultiScaleDetector<'o> {
    oracle: &'o dyn FaceOracle,
}

impl<'o> MultiScaleDetector<'o> {
    pub fn new(oracle: &'o dyn FaceOracle) -> Self {
        Self { oracle }
    }

    /// Lazily scan `frame`. The oracle runs only as the iterator is advanced; the first
    /// oracle failure is yielded once and ends the sequence.
    pub fn detect<'f>(
        &self,
        frame: &'f RgbImage,
        params: &'f ProcessingParameters,
    ) -> FaceBoxes<'f>
    where
        'o: 'f,
    {
        let windows = detection_windows(frame.width(), frame.height(), params.window_sizes());
        debug!(
            "Scanning {} windows on a {}x{} frame",
            windows.len(),
            frame.width(),
            frame.height()
        );
        FaceBoxes {
            oracle: self.oracle,
            frame,
            params,
            windows: windows.into_iter(),
            pending: Vec::new().into_iter(),
            finished: false,
        }
    }

    /// Scan all windows concurrently and gather every box.
    ///
    /// Produces the same boxes as [`detect`](Self::detect), possibly in another order.
    pub fn detect_parallel(
        &self,
        frame: &RgbImage,
        params: &ProcessingParameters,
    ) -> Result<Vec<FaceBox>> {
        let windows = detection_windows(frame.width(), frame.height(), params.window_sizes());
        let per_window = windows
            .par_iter()
            .map(|window| scan_window(self.oracle, frame, params, window))
            .collect::<Result<Vec<_>>>()?;
        Ok(per_window.into_iter().flatten().collect())
    }

    /// Collect all boxes of `frame`, sequentially or tile-parallel.
    pub fn detect_all(
        &self,
        frame: &RgbImage,
        params: &ProcessingParameters,
        parallel: bool,
    ) -> Result<Vec<FaceBox>> {
        let _guard = timing_guard("detector::detect_all", log::Level::Debug);
        if parallel {
            self.detect_parallel(frame, params)
        } else {
            self.detect(frame, params).collect()
        }
    }
}

fn scan_window(
    oracle: &dyn FaceOracle,
    frame: &RgbImage,
    params: &ProcessingParameters,
    window: &DetectionWindow,
) -> Result<Vec<FaceBox>> {
    let tile: Cow<'_, RgbImage> = if window.width == frame.width() && window.height == frame.height()
    {
        Cow::Borrowed(frame)
    } else {
        Cow::Owned(
            image::imageops::crop_imm(frame, window.x, window.y, window.width, window.height)
                .to_image(),
        )
    };

    let found = oracle
        .detect(&tile, params.confidence() as f32)
        .map_err(AnonymizeError::DetectionOracle)?;
    let dims = frame.dimensions();
    let boxes: Vec<FaceBox> = found
        .iter()
        .filter_map(|rel| {
            resolve(
                rel,
                window,
                dims,
                params.face_expand(),
                params.face_min_size(),
            )
        })
        .collect();
    trace!(
        "Window {:?}: {} raw, {} accepted",
        window,
        found.len(),
        boxes.len()
    );
    Ok(boxes)
}

/// Lazy sequence of accepted boxes for one frame, see [`MultiScaleDetector::detect`].
pub struct FaceBoxes<'f> {
    oracle: &'f dyn FaceOracle,
    frame: &'f RgbImage,
    params: &'f ProcessingParameters,
    windows: std::vec::IntoIter<DetectionWindow>,
    pending: std::vec::IntoIter<FaceBox>,
    finished: bool,
}

impl Iterator for FaceBoxes<'_> {
    type Item = Result<FaceBox>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(face) = self.pending.next() {
                return Some(Ok(face));
            }
            if self.finished {
                return None;
            }
            let Some(window) = self.windows.next() else {
                self.finished = true;
                return None;
            };
            match scan_window(self.oracle, self.frame, self.params, &window) {
                Ok(boxes) => self.pending = boxes.into_iter(),
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
