use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{InferenceError, Result, read_json_artifact};

/// Fixed mapping from categorical values to the integer codes the classifier
/// was trained on. The code of a value is its position in `classes`.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    classes: Vec<String>,
    codes: HashMap<String, usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EncoderArtifact {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(InferenceError::Artifact(
                "encoder has no classes".to_string(),
            ));
        }

        let mut codes = HashMap::with_capacity(classes.len());
        for (code, class) in classes.iter().enumerate() {
            if codes.insert(class.clone(), code).is_some() {
                return Err(InferenceError::Artifact(format!(
                    "encoder class '{}' appears more than once",
                    class
                )));
            }
        }

        Ok(Self { classes, codes })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let artifact: EncoderArtifact = read_json_artifact(path)?;
        Self::new(artifact.classes)
    }

    /// Encode `value`; `field` names the input field in the error when the
    /// value was never seen at training time.
    pub fn transform(&self, field: &str, value: &str) -> Result<usize> {
        self.codes
            .get(value)
            .copied()
            .ok_or_else(|| InferenceError::InvalidCategory {
                field: field.to_string(),
                value: value.to_string(),
                valid: self.classes.clone(),
            })
    }

    pub fn inverse_transform(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}
