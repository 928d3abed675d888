use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Invalid {field} '{value}'. Valid options: [{}]", .valid.join(", "))]
    InvalidCategory {
        field: String,
        value: String,
        valid: Vec<String>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

pub type Result<T> = std::result::Result<T, InferenceError>;

/// Read and deserialize a JSON artifact, mapping both I/O and parse failures
/// to [`InferenceError::Artifact`] with the path attached.
pub(crate) fn read_json_artifact<T: serde::de::DeserializeOwned>(
    path: &std::path::Path,
) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| InferenceError::Artifact(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| InferenceError::Artifact(format!("{}: {}", path.display(), e)))
}
