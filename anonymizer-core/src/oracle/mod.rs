//! Face detection backends.
//!
//! The pipeline only knows the [`FaceOracle`] capability: hand it a tile, get back boxes
//! relative to that tile. [`YuNetOracle`] is the production backend; any closure with the
//! same signature works too, which keeps tests free of model files.

mod model;
mod yunet;

use anyhow::Result;
use image::RgbImage;

use crate::geometry::RelativeBox;

pub use model::{InputSize, YuNetModel};
pub use yunet::{YuNetOracle, YuNetOracleConfig};

/// Stateless face detection capability.
///
/// Implementations must only return boxes whose score is at least `min_confidence`. Calls may
/// happen concurrently from several threads when tiles are scanned in parallel.
pub trait FaceOracle: Send + Sync {
    /// Detect faces in `tile` and return them as fractions of the tile size.
    fn detect(&self, tile: &RgbImage, min_confidence: f32) -> Result<Vec<RelativeBox>>;
}

impl<F> FaceOracle for F
where
    F: Fn(&RgbImage, f32) -> Result<Vec<RelativeBox>> + Send + Sync,
{
    fn detect(&self, tile: &RgbImage, min_confidence: f32) -> Result<Vec<RelativeBox>> {
        self(tile, min_confidence)
    }
}
