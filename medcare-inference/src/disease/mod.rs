pub mod encoder;
pub mod forest;
pub mod predictor;

pub use encoder::LabelEncoder;
pub use forest::{DecisionTree, ForestArtifact, RandomForest};
pub use predictor::{
    BLOOD_ENCODER_FILE, DiseaseAssets, DiseasePrediction, DiseasePredictor, FEATURE_ORDER,
    MODEL_FILE, PatientRecord, SEX_ENCODER_FILE,
};
