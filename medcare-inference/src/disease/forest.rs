//! Random-forest inference over the node-array export of a trained forest.
//!
//! Each tree is stored as parallel arrays indexed by node id. A node is a
//! leaf when its left child is `-1`; otherwise samples go left iff
//! `x[feature] <= threshold`. Leaf `value` rows hold per-class weights, which
//! are normalised before averaging across trees.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{InferenceError, Result, read_json_artifact};

const LEAF: i64 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestArtifact {
    pub classes: Vec<String>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    #[serde(default)]
    pub n_features: Option<usize>,
    pub trees: Vec<DecisionTree>,
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    classes: Vec<String>,
    feature_names: Option<Vec<String>>,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl DecisionTree {
    fn validate(&self, index: usize, n_features: usize, n_classes: usize) -> Result<()> {
        let invalid =
            |reason: String| InferenceError::Artifact(format!("tree {}: {}", index, reason));

        let n_nodes = self.children_left.len();
        if n_nodes == 0 {
            return Err(invalid("no nodes".to_string()));
        }
        if self.children_right.len() != n_nodes
            || self.feature.len() != n_nodes
            || self.threshold.len() != n_nodes
            || self.value.len() != n_nodes
        {
            return Err(invalid("node arrays differ in length".to_string()));
        }

        for node in 0..n_nodes {
            let left = self.children_left[node];
            let right = self.children_right[node];

            if left == LEAF {
                let row = &self.value[node];
                if row.len() != n_classes {
                    return Err(invalid(format!(
                        "leaf {} has {} class weights, expected {}",
                        node,
                        row.len(),
                        n_classes
                    )));
                }
                let malformed = row.iter().any(|w| !w.is_finite() || *w < 0.0);
                if malformed || row.iter().sum::<f64>() <= 0.0 {
                    return Err(invalid(format!("leaf {} has invalid class weights", node)));
                }
                continue;
            }

            // Children always carry larger ids than their parent, so traversal terminates.
            for child in [left, right] {
                if child <= node as i64 || child >= n_nodes as i64 {
                    return Err(invalid(format!("node {} has invalid child {}", node, child)));
                }
            }

            let feature = self.feature[node];
            if feature < 0 || feature >= n_features as i64 {
                return Err(invalid(format!(
                    "node {} splits on unknown feature {}",
                    node, feature
                )));
            }
            if self.threshold[node].is_nan() {
                return Err(invalid(format!("node {} has a NaN threshold", node)));
            }
        }

        Ok(())
    }

    fn leaf_for(&self, features: &[f64]) -> usize {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            let feature = self.feature[node] as usize;
            // Split features are compared in single precision, as at training time.
            let x = features[feature] as f32 as f64;
            node = if x <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        node
    }

    fn accumulate_proba(&self, features: &[f64], acc: &mut [f64]) {
        let row = &self.value[self.leaf_for(features)];
        let total: f64 = row.iter().sum();
        for (slot, weight) in acc.iter_mut().zip(row) {
            *slot += weight / total;
        }
    }
}

impl RandomForest {
    pub fn from_artifact(artifact: ForestArtifact) -> Result<Self> {
        if artifact.classes.is_empty() {
            return Err(InferenceError::Artifact("forest has no classes".to_string()));
        }
        if artifact.trees.is_empty() {
            return Err(InferenceError::Artifact("forest has no trees".to_string()));
        }

        let n_features = match (&artifact.feature_names, artifact.n_features) {
            (Some(names), Some(n)) if names.len() != n => {
                return Err(InferenceError::Artifact(format!(
                    "feature_names lists {} columns but n_features is {}",
                    names.len(),
                    n
                )));
            }
            (Some(names), _) => names.len(),
            (None, Some(n)) => n,
            (None, None) => {
                return Err(InferenceError::Artifact(
                    "forest declares neither feature_names nor n_features".to_string(),
                ));
            }
        };

        for (index, tree) in artifact.trees.iter().enumerate() {
            tree.validate(index, n_features, artifact.classes.len())?;
        }

        Ok(Self {
            classes: artifact.classes,
            feature_names: artifact.feature_names,
            n_features,
            trees: artifact.trees,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let artifact: ForestArtifact = read_json_artifact(path)?;
        Self::from_artifact(artifact)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Mean of the per-tree class distributions, in `classes()` order.
    pub fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.n_features {
            return Err(InferenceError::Inference(format!(
                "expected {} features, got {}",
                self.n_features,
                features.len()
            )));
        }

        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            tree.accumulate_proba(features, &mut proba);
        }

        let n_trees = self.trees.len() as f64;
        for p in &mut proba {
            *p /= n_trees;
        }
        Ok(proba)
    }

    /// Argmax class and its probability. Ties resolve to the lowest index.
    pub fn predict(&self, features: &[f64]) -> Result<(&str, f64)> {
        let proba = self.predict_proba(features)?;
        let (index, confidence) = argmax(&proba);
        Ok((self.classes[index].as_str(), confidence))
    }
}

pub(crate) fn argmax(values: &[f64]) -> (usize, f64) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}
