use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, IntoTensor, SimplePlan, Tensor, TypedFact, TypedOp, tvec,
};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

const STRIDES: [usize; 3] = [8, 16, 32];
// Heads per stride: cls, obj, bbox, kps.
const HEADS: usize = 4;
/// Columns of one decoded row: bbox (4), landmarks (10), score (1).
pub(crate) const ROW_LEN: usize = 15;

/// Resolution every tile is resized to before inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self::new(640, 640)
    }
}

/// Runnable YuNet graph.
#[derive(Debug)]
pub struct YuNetModel {
    runnable: RunnableModel,
    input_size: InputSize,
}

impl YuNetModel {
    /// Parse and optimize the ONNX graph, falling back to a decluttered plan when the
    /// optimizer rejects it.
    pub fn load<P: AsRef<Path>>(model_path: P, input_size: InputSize) -> Result<Self> {
        let path = model_path.as_ref();
        anyhow::ensure!(path.exists(), "model file not found: {}", path.display());

        let runnable = match build_plan(path, true) {
            Ok(plan) => plan,
            Err(opt_err) => {
                warn!(
                    "YuNet model {} could not be optimized ({opt_err:#}); using the decluttered graph",
                    path.display()
                );
                build_plan(path, false).with_context(|| {
                    format!("decluttered YuNet graph failed after optimize error: {opt_err}")
                })?
            }
        };
        debug!(
            "Loaded YuNet model {} for {}x{} input",
            path.display(),
            input_size.width,
            input_size.height
        );

        Ok(Self {
            runnable,
            input_size,
        })
    }

    /// Run inference on a `[1, 3, H, W]` BGR tensor.
    ///
    /// Returns rows of [`ROW_LEN`] values in input-pixel space, whether the graph emits the
    /// fused `[N, 15]` table itself or the raw per-stride heads.
    pub fn run(&self, input: Tensor) -> Result<Tensor> {
        let outputs = self
            .runnable
            .run(tvec![input.into()])
            .map_err(|e| anyhow!("YuNet execution failed: {e}"))?;
        let mut tensors: Vec<Tensor> = outputs.into_iter().map(|v| v.into_tensor()).collect();

        match tensors.len() {
            1 => tensors.pop().ok_or_else(|| anyhow!("YuNet produced no outputs")),
            n if n == STRIDES.len() * HEADS => decode_heads(&tensors, self.input_size),
            other => anyhow::bail!(
                "unexpected number of YuNet outputs: expected 1 or {}, got {other}",
                STRIDES.len() * HEADS
            ),
        }
    }
}

fn build_plan(path: &Path, optimized: bool) -> Result<RunnableModel> {
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?;

    let typed = if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow!("unable to optimize YuNet graph: {e}"))?
    } else {
        model
            .into_typed()
            .and_then(|typed| typed.into_decluttered())
            .map_err(|e| anyhow!("unable to declutter YuNet graph: {e}"))?
    };
    typed
        .into_runnable()
        .map_err(|e| anyhow!("unable to make YuNet graph runnable: {e}"))
}

fn head<'a>(outputs: &'a [Tensor], index: usize, expected: usize) -> Result<&'a [f32]> {
    let slice = outputs[index]
        .as_slice::<f32>()
        .map_err(|e| anyhow!("YuNet output {index} is not f32: {e}"))?;
    anyhow::ensure!(
        slice.len() == expected,
        "YuNet output {index} has {} values, expected {expected}",
        slice.len()
    );
    Ok(slice)
}

/// Decode the twelve raw heads (cls, obj, bbox, kps for strides 8, 16, 32) into rows.
pub(crate) fn decode_heads(outputs: &[Tensor], input_size: InputSize) -> Result<Tensor> {
    anyhow::ensure!(
        outputs.len() == STRIDES.len() * HEADS,
        "YuNet decode expects {} tensors, got {}",
        STRIDES.len() * HEADS,
        outputs.len()
    );
    let pad_w = (input_size.width as usize).div_ceil(32) * 32;
    let pad_h = (input_size.height as usize).div_ceil(32) * 32;

    let mut rows = Vec::new();
    for (s, &stride) in STRIDES.iter().enumerate() {
        let (cols, grid_rows) = (pad_w / stride, pad_h / stride);
        let cells = cols * grid_rows;
        let cls = head(outputs, s, cells)?;
        let obj = head(outputs, s + STRIDES.len(), cells)?;
        let bbox = head(outputs, s + STRIDES.len() * 2, cells * 4)?;
        let kps = head(outputs, s + STRIDES.len() * 3, cells * 10)?;
        let step = stride as f32;

        for idx in 0..cells {
            let (col, row) = ((idx % cols) as f32, (idx / cols) as f32);
            let score = (cls[idx].clamp(0.0, 1.0) * obj[idx].clamp(0.0, 1.0)).sqrt();
            let b = &bbox[idx * 4..idx * 4 + 4];
            let cx = (col + b[0]) * step;
            let cy = (row + b[1]) * step;
            let w = b[2].exp() * step;
            let h = b[3].exp() * step;

            rows.extend_from_slice(&[cx - w / 2.0, cy - h / 2.0, w, h]);
            for lm in kps[idx * 10..idx * 10 + 10].chunks_exact(2) {
                rows.push((lm[0] + col) * step);
                rows.push((lm[1] + row) * step);
            }
            rows.push(if score.is_finite() { score } else { 0.0 });
        }
    }

    Tensor::from_shape(&[rows.len() / ROW_LEN, ROW_LEN], &rows)
        .map_err(|e| anyhow!("failed to build decoded YuNet tensor: {e}"))
}
