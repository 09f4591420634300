use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage, imageops::FilterType};
use ndarray::Array3;

/// Decode an image from disk as packed 8-bit RGB, dropping any alpha channel.
pub fn load_rgb_image<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();
    let image =
        image::open(path).with_context(|| format!("failed to open image {}", path.display()))?;
    Ok(image.to_rgb8())
}

/// Encode an RGB image to disk, choosing the container from the file extension.
pub fn save_rgb_image<P: AsRef<Path>>(path: P, image: &RgbImage) -> Result<()> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("unsupported image extension for {}", path.display()))?;
    image
        .save_with_format(path, format)
        .with_context(|| format!("failed to write image {}", path.display()))
}

/// Resize to an exact resolution. Used to fit tiles to the detector input.
pub fn resize_rgb(image: &RgbImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    image::imageops::resize(image, width, height, filter)
}

/// Convert an RGB image into a BGR CHW array with values matching OpenCV's `blobFromImage`.
pub fn rgb_to_bgr_chw(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut array = Array3::<f32>::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        let (xi, yi) = (x as usize, y as usize);
        array[(0, yi, xi)] = pixel[2] as f32;
        array[(1, yi, xi)] = pixel[1] as f32;
        array[(2, yi, xi)] = pixel[0] as f32;
    }
    array
}
