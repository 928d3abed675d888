pub mod cancer;
pub mod disease;
pub mod error;

// Re-export commonly used types
pub use cancer::{
    ArtifactLoader, CancerScanner, ImageClassifier, LabelMap, LoadedModel, ModelLoader,
    ModelState, ModelStatus, ScanResult,
};
pub use disease::{DiseaseAssets, DiseasePrediction, DiseasePredictor, LabelEncoder, PatientRecord};
pub use error::{InferenceError, Result};
