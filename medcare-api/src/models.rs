use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use medcare_inference::PatientRecord;

pub const DISEASE_MODULE_NAME: &str = "Machine Learning (Random Forest)";

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: String,
    pub confidence: f64,
    pub module: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanResponse {
    pub prediction: String,
    /// Percentage with two decimals, e.g. `"97.53%"`.
    pub confidence: String,
    pub raw_scores: BTreeMap<String, f32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// e.g. "Patient Diagnosis: Influenza"
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub history: Vec<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub status: String,
    pub provider: String,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn as_percentage(fraction: f32) -> String {
    format!("{:.2}%", fraction * 100.0)
}
