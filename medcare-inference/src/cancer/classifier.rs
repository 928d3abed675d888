use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::labels::LabelMap;
use crate::error::{InferenceError, Result};

const PROBABILITY_TOLERANCE: f32 = 1e-3;

/// Backend that turns a preprocessed input tensor into one score per class.
/// Implementations are shared across requests and called from blocking
/// worker threads.
pub trait ImageClassifier: Send + Sync {
    fn classify(&self, input: &[f32]) -> Result<Vec<f32>>;
}

/// A classifier together with the label mapping produced by the same
/// training run.
#[derive(Clone)]
pub struct LoadedModel {
    pub classifier: Arc<dyn ImageClassifier>,
    pub labels: LabelMap,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub label: String,
    pub class_index: usize,
    pub confidence: f32,
    pub scores: BTreeMap<String, f32>,
}

impl ScanResult {
    pub fn from_scores(labels: &LabelMap, raw: Vec<f32>) -> Result<Self> {
        if raw.len() != labels.len() {
            return Err(InferenceError::Inference(format!(
                "model produced {} scores but the label mapping has {} classes",
                raw.len(),
                labels.len()
            )));
        }
        if raw.iter().any(|s| !s.is_finite()) {
            return Err(InferenceError::Inference(
                "model produced non-finite scores".to_string(),
            ));
        }

        let probabilities = to_probabilities(raw);
        let (class_index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, p)| {
                if p > best.1 { (i, p) } else { best }
            });

        let scores = labels
            .labels()
            .iter()
            .cloned()
            .zip(probabilities.iter().copied())
            .collect();

        Ok(Self {
            label: labels.labels()[class_index].clone(),
            class_index,
            confidence,
            scores,
        })
    }
}

/// Return `scores` unchanged if they already form a probability vector,
/// otherwise treat them as logits and apply softmax.
pub fn to_probabilities(scores: Vec<f32>) -> Vec<f32> {
    let in_range = scores.iter().all(|s| (0.0..=1.0).contains(s));
    let sum: f32 = scores.iter().sum();
    if in_range && (sum - 1.0).abs() <= PROBABILITY_TOLERANCE {
        return scores;
    }

    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn labels() -> LabelMap {
        let indices: HashMap<String, i64> = [
            ("Bengin cases", 0),
            ("Malignant cases", 1),
            ("Normal cases", 2),
        ]
        .iter()
        .map(|(l, i)| (l.to_string(), *i))
        .collect();
        LabelMap::from_class_indices(indices).unwrap()
    }

    #[test]
    fn test_softmax_output_is_kept() {
        let result = ScanResult::from_scores(&labels(), vec![0.1, 0.7, 0.2]).unwrap();

        assert_eq!(result.label, "Malignant cases");
        assert_eq!(result.class_index, 1);
        assert_eq!(result.confidence, 0.7);
        assert_eq!(result.scores["Normal cases"], 0.2);
    }

    #[test]
    fn test_logits_are_normalised() {
        let result = ScanResult::from_scores(&labels(), vec![2.0, -1.0, 5.0]).unwrap();

        assert_eq!(result.label, "Normal cases");
        assert!(result.scores.values().all(|s| (0.0..=1.0).contains(s)));
        let sum: f32 = result.scores.values().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    fn test_score_count_must_match_labels() {
        let err = ScanResult::from_scores(&labels(), vec![0.5, 0.5]).unwrap_err();
        assert!(matches!(err, InferenceError::Inference(_)));
    }

    #[test]
    fn test_nan_scores_are_rejected() {
        assert!(ScanResult::from_scores(&labels(), vec![f32::NAN, 0.5, 0.5]).is_err());
    }
}
