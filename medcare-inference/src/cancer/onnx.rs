//! ONNX Runtime backend for the lung-scan classifier.

use ndarray::Array4;
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use super::classifier::ImageClassifier;
use super::preprocess::{CHANNELS, IMAGE_SIZE, INPUT_LEN};
use crate::error::{InferenceError, Result};

/// A session run needs exclusive access, so concurrent scans are serialised
/// on the mutex.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxClassifier {
    pub fn from_file(path: &Path) -> Result<Self> {
        info!(model_path = %path.display(), "Loading ONNX model");

        let session = Session::builder()
            .map_err(|e| {
                InferenceError::Artifact(format!("Failed to create session builder: {}", e))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::Artifact(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| InferenceError::Artifact(format!("Failed to load model: {}", e)))?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| InferenceError::Artifact("model defines no outputs".to_string()))?;

        info!(output = %output_name, "ONNX model loaded");

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

impl ImageClassifier for OnnxClassifier {
    fn classify(&self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != INPUT_LEN {
            return Err(InferenceError::Inference(format!(
                "expected {} input values, got {}",
                INPUT_LEN,
                input.len()
            )));
        }

        let side = IMAGE_SIZE as usize;
        let array = Array4::<f32>::from_shape_vec((1, side, side, CHANNELS), input.to_vec())
            .map_err(|e| InferenceError::Inference(format!("Array error: {}", e)))?;
        let tensor = Tensor::from_array(array)
            .map_err(|e| InferenceError::Inference(format!("Tensor error: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Inference("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| InferenceError::Inference(format!("Inference failed: {}", e)))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| InferenceError::Inference("No output".to_string()))?;

        let (_, scores) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Inference(format!("Extract error: {}", e)))?;

        Ok(scores.to_vec())
    }
}
