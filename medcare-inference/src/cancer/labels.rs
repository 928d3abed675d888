use std::collections::HashMap;
use std::path::Path;

use crate::error::{InferenceError, Result, read_json_artifact};

/// Class-index mapping produced by the training data generator, kept in both
/// directions: score position → label and label → score position.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    by_index: Vec<String>,
    by_name: HashMap<String, usize>,
}

impl LabelMap {
    /// Invert a training-time `label → index` mapping. The indices must cover
    /// `0..n` exactly once.
    pub fn from_class_indices(class_indices: HashMap<String, i64>) -> Result<Self> {
        if class_indices.is_empty() {
            return Err(InferenceError::Artifact("class mapping is empty".to_string()));
        }

        let n = class_indices.len();
        let mut slots: Vec<Option<String>> = vec![None; n];
        for (label, index) in &class_indices {
            let slot = usize::try_from(*index)
                .ok()
                .filter(|i| *i < n)
                .ok_or_else(|| {
                    InferenceError::Artifact(format!(
                        "class '{}' has index {} outside 0..{}",
                        label, index, n
                    ))
                })?;
            if let Some(existing) = &slots[slot] {
                return Err(InferenceError::Artifact(format!(
                    "classes '{}' and '{}' share index {}",
                    existing, label, slot
                )));
            }
            slots[slot] = Some(label.clone());
        }

        // n distinct in-range indices for n labels: every slot is filled.
        let by_index: Vec<String> = slots.into_iter().flatten().collect();
        let by_name = by_index
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();

        Ok(Self { by_index, by_name })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let class_indices: HashMap<String, i64> = read_json_artifact(path)?;
        Self::from_class_indices(class_indices)
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.by_index.get(index).map(String::as_str)
    }

    pub fn index(&self, label: &str) -> Option<usize> {
        self.by_name.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty()
    }

    /// Labels in score order.
    pub fn labels(&self) -> &[String] {
        &self.by_index
    }
}
