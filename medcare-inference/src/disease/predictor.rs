use serde::{Deserialize, Deserializer, Serialize, de};
use std::path::Path;
use tracing::{error, info};

use super::encoder::LabelEncoder;
use super::forest::RandomForest;
use crate::error::{InferenceError, Result};

pub const MODEL_FILE: &str = "disease_model.json";
pub const SEX_ENCODER_FILE: &str = "encoder_sex.json";
pub const BLOOD_ENCODER_FILE: &str = "encoder_blood.json";

/// Column order the classifier was trained on. Predictions are silently wrong
/// if features are fed in any other order.
pub const FEATURE_ORDER: [&str; 13] = [
    "Age",
    "Sex",
    "Blood_Type",
    "Body_Temperature",
    "Heart_Rate",
    "Systolic_BP",
    "Diastolic_BP",
    "BMI",
    "Symptom_Cough",
    "Symptom_Fatigue",
    "Symptom_Sore_Throat",
    "Symptom_Shortness_of_Breath",
    "Symptom_Headache",
];

pub const MAX_AGE: i32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "Age", deserialize_with = "whole_number")]
    pub age: i32,
    #[serde(rename = "Sex")]
    pub sex: String,
    #[serde(rename = "Blood_Type")]
    pub blood_type: String,
    #[serde(rename = "Body_Temperature")]
    pub body_temperature: f64,
    #[serde(rename = "Heart_Rate", deserialize_with = "whole_number")]
    pub heart_rate: i32,
    #[serde(rename = "Systolic_BP", deserialize_with = "whole_number")]
    pub systolic_bp: i32,
    #[serde(rename = "Diastolic_BP", deserialize_with = "whole_number")]
    pub diastolic_bp: i32,
    #[serde(rename = "BMI")]
    pub bmi: f64,
    #[serde(rename = "Symptom_Cough", deserialize_with = "whole_number")]
    pub symptom_cough: i32,
    #[serde(rename = "Symptom_Fatigue", deserialize_with = "whole_number")]
    pub symptom_fatigue: i32,
    #[serde(rename = "Symptom_Sore_Throat", deserialize_with = "whole_number")]
    pub symptom_sore_throat: i32,
    #[serde(rename = "Symptom_Shortness_of_Breath", deserialize_with = "whole_number")]
    pub symptom_shortness_of_breath: i32,
    #[serde(rename = "Symptom_Headache", deserialize_with = "whole_number")]
    pub symptom_headache: i32,
}

/// Integer fields also accept floats without a fractional part (`34.0`).
fn whole_number<'de, D>(deserializer: D) -> std::result::Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(i64),
        Float(f64),
    }

    let value = match Number::deserialize(deserializer) {
        Ok(Number::Int(value)) => value,
        Ok(Number::Float(value)) if value.is_finite() && value.fract() == 0.0 => value as i64,
        Ok(Number::Float(value)) => {
            return Err(de::Error::custom(format!(
                "expected a whole number, got {}",
                value
            )));
        }
        Err(_) => return Err(de::Error::custom("expected a whole number")),
    };

    i32::try_from(value).map_err(|_| de::Error::custom(format!("{} is out of range", value)))
}

impl PatientRecord {
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_AGE).contains(&self.age) {
            return Err(InferenceError::InvalidInput(format!(
                "Age must be between 0 and {}, got {}",
                MAX_AGE, self.age
            )));
        }

        let numeric = [
            ("Body_Temperature", self.body_temperature),
            ("BMI", self.bmi),
        ];
        for (field, value) in numeric {
            if !value.is_finite() {
                return Err(InferenceError::InvalidInput(format!(
                    "{} must be a finite number",
                    field
                )));
            }
        }

        for (field, flag) in self.symptoms() {
            if flag != 0 && flag != 1 {
                return Err(InferenceError::InvalidInput(format!(
                    "{} must be 0 or 1, got {}",
                    field, flag
                )));
            }
        }

        Ok(())
    }

    fn symptoms(&self) -> [(&'static str, i32); 5] {
        [
            ("Symptom_Cough", self.symptom_cough),
            ("Symptom_Fatigue", self.symptom_fatigue),
            ("Symptom_Sore_Throat", self.symptom_sore_throat),
            ("Symptom_Shortness_of_Breath", self.symptom_shortness_of_breath),
            ("Symptom_Headache", self.symptom_headache),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseasePrediction {
    pub label: String,
    pub confidence: f64,
}

/// The classifier plus the two encoders it was trained with.
#[derive(Debug, Clone)]
pub struct DiseaseAssets {
    pub forest: RandomForest,
    pub sex_encoder: LabelEncoder,
    pub blood_encoder: LabelEncoder,
}

impl DiseaseAssets {
    pub fn new(
        forest: RandomForest,
        sex_encoder: LabelEncoder,
        blood_encoder: LabelEncoder,
    ) -> Result<Self> {
        if forest.n_features() != FEATURE_ORDER.len() {
            return Err(InferenceError::Artifact(format!(
                "model expects {} features, patient records provide {}",
                forest.n_features(),
                FEATURE_ORDER.len()
            )));
        }

        if let Some(names) = forest.feature_names() {
            if names.iter().map(String::as_str).ne(FEATURE_ORDER.iter().copied()) {
                return Err(InferenceError::Artifact(format!(
                    "model column order {:?} does not match {:?}",
                    names, FEATURE_ORDER
                )));
            }
        }

        Ok(Self {
            forest,
            sex_encoder,
            blood_encoder,
        })
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let forest = RandomForest::load(&dir.join(MODEL_FILE))?;
        let sex_encoder = LabelEncoder::load(&dir.join(SEX_ENCODER_FILE))?;
        let blood_encoder = LabelEncoder::load(&dir.join(BLOOD_ENCODER_FILE))?;
        Self::new(forest, sex_encoder, blood_encoder)
    }

    fn features(&self, record: &PatientRecord) -> Result<[f64; 13]> {
        let sex = self.sex_encoder.transform("Sex", &record.sex)?;
        let blood = self.blood_encoder.transform("Blood_Type", &record.blood_type)?;

        Ok([
            record.age as f64,
            sex as f64,
            blood as f64,
            record.body_temperature,
            record.heart_rate as f64,
            record.systolic_bp as f64,
            record.diastolic_bp as f64,
            record.bmi,
            record.symptom_cough as f64,
            record.symptom_fatigue as f64,
            record.symptom_sore_throat as f64,
            record.symptom_shortness_of_breath as f64,
            record.symptom_headache as f64,
        ])
    }
}

#[derive(Debug)]
enum Availability {
    Ready(DiseaseAssets),
    Unavailable(String),
}

/// Tabular disease classifier. Availability is decided once at construction
/// and never re-evaluated.
#[derive(Debug)]
pub struct DiseasePredictor {
    state: Availability,
}

impl DiseasePredictor {
    /// Load assets from `dir`. A failure is logged and leaves the predictor
    /// permanently unavailable rather than aborting the caller.
    pub fn load(dir: &Path) -> Self {
        info!(model_dir = %dir.display(), "Loading disease assets");

        match DiseaseAssets::load(dir) {
            Ok(assets) => {
                info!(
                    classes = ?assets.forest.classes(),
                    "Disease model loaded"
                );
                Self::from_assets(assets)
            }
            Err(e) => {
                error!(model_dir = %dir.display(), error = %e, "Could not load disease model");
                Self::unavailable(e.to_string())
            }
        }
    }

    pub fn from_assets(assets: DiseaseAssets) -> Self {
        Self {
            state: Availability::Ready(assets),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: Availability::Unavailable(reason.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, Availability::Ready(_))
    }

    pub fn classes(&self) -> Option<&[String]> {
        match &self.state {
            Availability::Ready(assets) => Some(assets.forest.classes()),
            Availability::Unavailable(_) => None,
        }
    }

    pub fn predict(&self, record: &PatientRecord) -> Result<DiseasePrediction> {
        let assets = match &self.state {
            Availability::Ready(assets) => assets,
            Availability::Unavailable(reason) => {
                return Err(InferenceError::ModelUnavailable(format!(
                    "Disease model not initialized ({})",
                    reason
                )));
            }
        };

        record.validate()?;
        let features = assets.features(record)?;
        let (label, confidence) = assets.forest.predict(&features)?;

        Ok(DiseasePrediction {
            label: label.to_string(),
            confidence,
        })
    }
}
