pub mod classifier;
pub mod labels;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod preprocess;
pub mod scanner;

pub use classifier::{ImageClassifier, LoadedModel, ScanResult, to_probabilities};
pub use labels::LabelMap;
pub use loader::{ArtifactLoader, CLASS_INDICES_FILE, MODEL_FILE, ModelLoader};
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;
pub use preprocess::IMAGE_SIZE;
pub use scanner::{CancerScanner, ModelState, ModelStatus};
