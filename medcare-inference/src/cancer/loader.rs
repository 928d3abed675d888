use std::path::PathBuf;

use super::classifier::LoadedModel;
use crate::error::Result;

pub const MODEL_FILE: &str = "lung_cancer_model.onnx";
pub const CLASS_INDICES_FILE: &str = "class_indices.json";

/// Source of the image model. `load` runs on a blocking thread and must
/// return [`crate::InferenceError::ModelUnavailable`] when the artifacts are
/// simply not there yet, and any other error when they exist but are broken.
pub trait ModelLoader: Send + Sync {
    fn describe(&self) -> String;
    fn load(&self) -> Result<LoadedModel>;
}

/// Loads `lung_cancer_model.onnx` and `class_indices.json` from a directory.
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    dir: PathBuf,
}

impl ArtifactLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    pub fn class_indices_path(&self) -> PathBuf {
        self.dir.join(CLASS_INDICES_FILE)
    }

    pub fn artifacts_present(&self) -> bool {
        self.model_path().is_file() && self.class_indices_path().is_file()
    }
}

#[cfg(feature = "onnx")]
impl ModelLoader for ArtifactLoader {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn load(&self) -> Result<LoadedModel> {
        use super::labels::LabelMap;
        use super::onnx::OnnxClassifier;
        use crate::error::InferenceError;
        use std::sync::Arc;

        if !self.artifacts_present() {
            return Err(InferenceError::ModelUnavailable(format!(
                "Cancer model not yet installed: expected {} and {} in {}",
                MODEL_FILE,
                CLASS_INDICES_FILE,
                self.dir.display()
            )));
        }

        let labels = LabelMap::load(&self.class_indices_path())?;
        let classifier = OnnxClassifier::from_file(&self.model_path())?;

        Ok(LoadedModel {
            classifier: Arc::new(classifier),
            labels,
        })
    }
}
