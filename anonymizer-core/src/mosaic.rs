//! Mosaic (pixelation) of face regions.
//!
//! A single mosaic of the whole frame is computed once per frame, and every box copies its
//! rectangle out of that shared source. Overlapping, duplicated or reordered boxes therefore
//! always produce the same pixels.

use image::{Rgb, RgbImage};

use anonymizer_utils::timing_guard;

use crate::geometry::FaceBox;

/// Downscale `frame` to `(width / factor) x (height / factor)` cells by area averaging, then
/// blow every cell back up to its source extent.
///
/// Returns `None` when the frame is smaller than one cell on either axis.
pub fn whole_frame_mosaic(frame: &RgbImage, factor: u32) -> Option<RgbImage> {
    let (width, height) = frame.dimensions();
    let (cols, rows) = (width / factor.max(1), height / factor.max(1));
    if cols == 0 || rows == 0 {
        return None;
    }
    let xs = cell_edges(width, cols);
    let ys = cell_edges(height, rows);

    let mut mosaic = RgbImage::new(width, height);
    for cell_y in ys.windows(2) {
        for cell_x in xs.windows(2) {
            let (x0, x1, y0, y1) = (cell_x[0], cell_x[1], cell_y[0], cell_y[1]);
            let mut sum = [0u64; 3];
            for y in y0..y1 {
                for x in x0..x1 {
                    let p = frame.get_pixel(x, y);
                    for (acc, &v) in sum.iter_mut().zip(p.0.iter()) {
                        *acc += v as u64;
                    }
                }
            }
            let area = ((x1 - x0) as u64) * ((y1 - y0) as u64);
            let mean = Rgb(sum.map(|s| ((s + area / 2) / area) as u8));
            for y in y0..y1 {
                for x in x0..x1 {
                    mosaic.put_pixel(x, y, mean);
                }
            }
        }
    }
    Some(mosaic)
}

// `count + 1` boundaries splitting `[0, extent)` into near-equal cells.
fn cell_edges(extent: u32, count: u32) -> Vec<u32> {
    (0..=count)
        .map(|i| (i as u64 * extent as u64 / count as u64) as u32)
        .collect()
}

/// Replaces face boxes with the matching region of a whole-frame mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameAnonymizer {
    pixelation_factor: u32,
}

impl FrameAnonymizer {
    pub fn new(pixelation_factor: u32) -> Self {
        Self {
            pixelation_factor: pixelation_factor.max(1),
        }
    }

    /// A box is mosaiced only when it spans at least one full mosaic block on both axes.
    pub fn covers(&self, face: &FaceBox) -> bool {
        face.width() / self.pixelation_factor >= 1 && face.height() / self.pixelation_factor >= 1
    }

    /// Mosaic every eligible box of `frame` in place and return how many boxes were applied.
    ///
    /// The mosaic source is taken from the frame as it is on entry, before any box is written.
    pub fn anonymize<I>(&self, frame: &mut RgbImage, boxes: I) -> usize
    where
        I: IntoIterator<Item = FaceBox>,
    {
        let _guard = timing_guard("mosaic::anonymize", log::Level::Trace);
        let (width, height) = frame.dimensions();
        let mut mosaic: Option<RgbImage> = None;
        let mut applied = 0;

        for face in boxes {
            if !self.covers(&face) || face.x2 > width || face.y2 > height {
                continue;
            }
            if mosaic.is_none() {
                mosaic = whole_frame_mosaic(frame, self.pixelation_factor);
            }
            let Some(source) = mosaic.as_ref() else {
                continue;
            };
            copy_region(source, frame, &face);
            applied += 1;
        }
        applied
    }

    /// Copying variant of [`anonymize`](Self::anonymize).
    pub fn anonymized<I>(&self, frame: &RgbImage, boxes: I) -> RgbImage
    where
        I: IntoIterator<Item = FaceBox>,
    {
        let mut out = frame.clone();
        self.anonymize(&mut out, boxes);
        out
    }
}

fn copy_region(source: &RgbImage, target: &mut RgbImage, face: &FaceBox) {
    let stride = source.width() as usize * 3;
    let (start, end) = (face.x1 as usize * 3, face.x2 as usize * 3);
    let src: &[u8] = source;
    let dst: &mut [u8] = target;
    for y in face.y1 as usize..face.y2 as usize {
        let row = y * stride;
        dst[row + start..row + end].copy_from_slice(&src[row + start..row + end]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 7 + y * 3) as u8,
                (x * x + y) as u8,
                (255 - (x + 2 * y) % 256) as u8,
            ])
        })
    }

    fn face(x1: u32, y1: u32, x2: u32, y2: u32) -> FaceBox {
        FaceBox { x1, y1, x2, y2 }
    }

    #[test]
    fn mosaic_cells_hold_their_mean() {
        let mut frame = RgbImage::new(4, 2);
        for x in 0..2 {
            frame.put_pixel(x, 0, Rgb([10, 0, 0]));
            frame.put_pixel(x, 1, Rgb([20, 0, 255]));
        }
        let mosaic = whole_frame_mosaic(&frame, 2).unwrap();
        assert_eq!(mosaic.get_pixel(0, 0), &Rgb([15, 0, 128]));
        assert_eq!(mosaic.get_pixel(1, 1), &Rgb([15, 0, 128]));
        assert_eq!(mosaic.get_pixel(3, 0), &Rgb([0, 0, 0]));
        assert!(whole_frame_mosaic(&frame, 3).is_none());
    }

    #[test]
    fn region_matches_whole_frame_mosaic_and_outside_is_untouched() {
        let frame = textured(100, 100);
        let anonymizer = FrameAnonymizer::new(20);
        let target = face(26, 26, 54, 54);
        let out = anonymizer.anonymized(&frame, [target]);
        let mosaic = whole_frame_mosaic(&frame, 20).unwrap();

        for (x, y, pixel) in out.enumerate_pixels() {
            let inside = (26..54).contains(&x) && (26..54).contains(&y);
            if inside {
                assert_eq!(pixel, mosaic.get_pixel(x, y), "({x}, {y})");
            } else {
                assert_eq!(pixel, frame.get_pixel(x, y), "({x}, {y})");
            }
        }
        assert_ne!(out, frame);
    }

    #[test]
    fn duplicates_overlaps_and_order_do_not_matter() {
        let frame = textured(120, 90);
        let anonymizer = FrameAnonymizer::new(6);
        let boxes = vec![face(10, 10, 60, 50), face(40, 30, 100, 80), face(0, 0, 30, 30)];

        let once = anonymizer.anonymized(&frame, boxes.iter().copied());

        let mut doubled = boxes.clone();
        doubled.extend(boxes.iter().copied());
        assert_eq!(anonymizer.anonymized(&frame, doubled), once);

        let mut reversed = boxes.clone();
        reversed.reverse();
        assert_eq!(anonymizer.anonymized(&frame, reversed), once);

        let rotated = [boxes[1], boxes[2], boxes[0], boxes[1]];
        assert_eq!(anonymizer.anonymized(&frame, rotated), once);
    }

    #[test]
    fn boxes_smaller_than_one_block_are_skipped() {
        let frame = textured(200, 200);
        let anonymizer = FrameAnonymizer::new(50);
        let mut out = frame.clone();
        let applied = anonymizer.anonymize(&mut out, [face(10, 10, 59, 120), face(0, 0, 0, 0)]);
        assert_eq!(applied, 0);
        assert_eq!(out, frame);

        assert_eq!(anonymizer.anonymize(&mut out, [face(10, 10, 60, 60)]), 1);
        assert_ne!(out, frame);
    }

    #[test]
    fn out_of_frame_boxes_are_ignored() {
        let frame = textured(30, 30);
        let out = FrameAnonymizer::new(2).anonymized(&frame, [face(20, 20, 40, 25)]);
        assert_eq!(out, frame);
    }
}
