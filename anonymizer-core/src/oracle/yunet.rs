use std::{cmp::Ordering, path::Path};

use anyhow::{Result, anyhow};
use image::{RgbImage, imageops::FilterType};
use tract_onnx::prelude::{Tensor, tract_ndarray::ArrayView2};

use anonymizer_utils::{config::DetectorSettings, resize_rgb, rgb_to_bgr_chw, timing_guard};

use super::{
    FaceOracle,
    model::{InputSize, ROW_LEN, YuNetModel},
};
use crate::geometry::RelativeBox;

/// Knobs that only affect a single YuNet invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YuNetOracleConfig {
    pub input_size: InputSize,
    /// IoU above which the weaker of two anchors from the same run is dropped.
    pub nms_threshold: f32,
    /// Candidates kept per run after sorting by score. Zero keeps all.
    pub top_k: usize,
}

impl Default for YuNetOracleConfig {
    fn default() -> Self {
        Self {
            input_size: InputSize::default(),
            nms_threshold: 0.3,
            top_k: 5_000,
        }
    }
}

impl From<&DetectorSettings> for YuNetOracleConfig {
    fn from(settings: &DetectorSettings) -> Self {
        Self {
            input_size: InputSize::new(settings.width, settings.height),
            nms_threshold: settings.nms_threshold,
            top_k: settings.top_k,
        }
    }
}

/// YuNet-backed [`FaceOracle`].
///
/// Each tile is stretched to the model input, so decoded coordinates divided by the input size
/// are already tile-relative. Overlapping anchors of one run are collapsed here; boxes from
/// different tiles are never merged.
#[derive(Debug)]
pub struct YuNetOracle {
    model: YuNetModel,
    config: YuNetOracleConfig,
}

impl YuNetOracle {
    pub fn load<P: AsRef<Path>>(model_path: P, config: YuNetOracleConfig) -> Result<Self> {
        anyhow::ensure!(
            config.input_size.width > 0 && config.input_size.height > 0,
            "detector input dimensions must be greater than zero"
        );
        let model = YuNetModel::load(model_path, config.input_size)?;
        Ok(Self { model, config })
    }

    pub fn config(&self) -> &YuNetOracleConfig {
        &self.config
    }

    fn tensor_for(&self, tile: &RgbImage) -> Result<Tensor> {
        let InputSize { width, height } = self.config.input_size;
        let resized = resize_rgb(tile, width, height, FilterType::Triangle);
        let (data, offset) = rgb_to_bgr_chw(&resized).into_raw_vec_and_offset();
        debug_assert_eq!(offset, Some(0), "expected contiguous array");
        Tensor::from_shape(&[1, 3, height as usize, width as usize], &data)
            .map_err(|e| anyhow!("failed to build input tensor: {e}"))
    }
}

impl FaceOracle for YuNetOracle {
    fn detect(&self, tile: &RgbImage, min_confidence: f32) -> Result<Vec<RelativeBox>> {
        anyhow::ensure!(
            tile.width() > 0 && tile.height() > 0,
            "cannot run detection on an empty tile"
        );
        let input = {
            let _guard = timing_guard("yunet::preprocess", log::Level::Trace);
            self.tensor_for(tile)?
        };
        let raw = {
            let _guard = timing_guard("yunet::inference", log::Level::Debug);
            self.model.run(input)?
        };
        relative_boxes(&raw, min_confidence, &self.config)
    }
}

/// Filter decoded rows by score, rescale them to tile fractions and suppress overlaps.
pub(crate) fn relative_boxes(
    raw: &Tensor,
    min_confidence: f32,
    config: &YuNetOracleConfig,
) -> Result<Vec<RelativeBox>> {
    let rows = decoded_rows(raw)?;
    let in_w = config.input_size.width as f32;
    let in_h = config.input_size.height as f32;

    let mut boxes: Vec<RelativeBox> = rows
        .rows()
        .into_iter()
        .filter(|row| row[14].is_finite() && row[14] >= min_confidence)
        .filter(|row| row.iter().take(4).all(|v| v.is_finite()) && row[2] > 0.0 && row[3] > 0.0)
        .map(|row| RelativeBox {
            xmin: row[0] / in_w,
            ymin: row[1] / in_h,
            width: row[2] / in_w,
            height: row[3] / in_h,
            score: row[14],
        })
        .collect();

    boxes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    if config.top_k > 0 {
        boxes.truncate(config.top_k);
    }
    if config.nms_threshold > 0.0 {
        boxes = suppress_overlaps(boxes, config.nms_threshold);
    }
    Ok(boxes)
}

fn decoded_rows(output: &Tensor) -> Result<ArrayView2<'_, f32>> {
    let rows = match output.shape() {
        [rows, ROW_LEN] | [1, rows, ROW_LEN] => *rows,
        other => anyhow::bail!("YuNet output must have shape [N, 15] or [1, N, 15], got {other:?}"),
    };
    let slice = output
        .as_slice::<f32>()
        .map_err(|e| anyhow!("YuNet output is not f32: {e}"))?;
    ArrayView2::from_shape((rows, ROW_LEN), slice)
        .map_err(|_| anyhow!("YuNet output data is not contiguous"))
}

fn iou(a: &RelativeBox, b: &RelativeBox) -> f32 {
    let ix = ((a.xmin + a.width).min(b.xmin + b.width) - a.xmin.max(b.xmin)).max(0.0);
    let iy = ((a.ymin + a.height).min(b.ymin + b.height) - a.ymin.max(b.ymin)).max(0.0);
    let inter = ix * iy;
    let union = a.width * a.height + b.width * b.height - inter;
    if inter <= 0.0 || union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

// Input must be sorted by descending score.
fn suppress_overlaps(boxes: Vec<RelativeBox>, threshold: f32) -> Vec<RelativeBox> {
    let mut kept: Vec<RelativeBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if kept.iter().all(|k| iou(&candidate, k) <= threshold) {
            kept.push(candidate);
        }
    }
    kept
}
