//! Image preprocessing for the lung-scan classifier.
//!
//! Must match what the training data generator did exactly: RGB, resized to
//! 224×224 with nearest-neighbour sampling (aspect ratio not preserved), then
//! scaled to [0,1] by dividing by 255. Any deviation degrades predictions
//! without producing an error.

use image::{RgbImage, imageops::FilterType};

use crate::error::{InferenceError, Result};

pub const IMAGE_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;
pub const INPUT_LEN: usize = (IMAGE_SIZE as usize) * (IMAGE_SIZE as usize) * CHANNELS;

const RESIZE_FILTER: FilterType = FilterType::Nearest;

pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(InferenceError::InvalidImage("upload is empty".to_string()));
    }

    let image = image::load_from_memory(bytes)
        .map_err(|e| InferenceError::InvalidImage(e.to_string()))?;
    Ok(image.to_rgb8())
}

/// Resize and normalise into a flat NHWC tensor of [`INPUT_LEN`] values.
pub fn to_input_tensor(image: &RgbImage) -> Vec<f32> {
    let resized = image::imageops::resize(image, IMAGE_SIZE, IMAGE_SIZE, RESIZE_FILTER);
    resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect()
}

pub fn prepare(bytes: &[u8]) -> Result<Vec<f32>> {
    let image = decode_rgb(bytes)?;
    Ok(to_input_tensor(&image))
}
