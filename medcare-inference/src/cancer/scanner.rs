//! Lazily loaded lung-scan classifier.
//!
//! The model artifacts may be produced after the service has started, so a
//! scan with no model loaded first retries the load. Loads are single-flight:
//! callers arriving while a load is running wait for it and share its
//! outcome instead of starting their own.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::classifier::{LoadedModel, ScanResult};
use super::loader::ModelLoader;
use super::preprocess;
use crate::error::{InferenceError, Result};

#[derive(Debug, Clone)]
pub enum ModelState {
    NotLoaded(String),
    Loaded(Arc<LoadedModel>),
    LoadFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    NotLoaded,
    Loaded,
    LoadFailed,
}

impl ModelState {
    pub fn status(&self) -> ModelStatus {
        match self {
            ModelState::NotLoaded(_) => ModelStatus::NotLoaded,
            ModelState::Loaded(_) => ModelStatus::Loaded,
            ModelState::LoadFailed(_) => ModelStatus::LoadFailed,
        }
    }

    /// Why no model is loaded, if none is.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ModelState::NotLoaded(reason) | ModelState::LoadFailed(reason) => Some(reason),
            ModelState::Loaded(_) => None,
        }
    }
}

pub struct CancerScanner {
    loader: Arc<dyn ModelLoader>,
    state: RwLock<ModelState>,
    load_gate: Mutex<()>,
    load_attempts: AtomicU64,
}

impl CancerScanner {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            state: RwLock::new(ModelState::NotLoaded("no load attempted".to_string())),
            load_gate: Mutex::new(()),
            load_attempts: AtomicU64::new(0),
        }
    }

    /// Attempt a load without failing. Used at startup; a missing model only
    /// means scans will retry later.
    pub async fn try_load(&self) -> bool {
        match self.ensure_loaded().await {
            Ok(_) => true,
            Err(e) => {
                info!(
                    source = %self.loader.describe(),
                    reason = %e,
                    "Cancer model not loaded yet"
                );
                false
            }
        }
    }

    pub async fn status(&self) -> ModelStatus {
        self.state.read().await.status()
    }

    pub async fn state(&self) -> ModelState {
        self.state.read().await.clone()
    }

    pub fn load_attempts(&self) -> u64 {
        self.load_attempts.load(Ordering::SeqCst)
    }

    pub async fn scan(&self, image_bytes: Vec<u8>) -> Result<ScanResult> {
        let model = self.ensure_loaded().await?;

        tokio::task::spawn_blocking(move || {
            let input = preprocess::prepare(&image_bytes)?;
            let scores = model.classifier.classify(&input)?;
            ScanResult::from_scores(&model.labels, scores)
        })
        .await
        .map_err(|e| InferenceError::Inference(format!("scan task failed: {}", e)))?
    }

    async fn ensure_loaded(&self) -> Result<Arc<LoadedModel>> {
        // Read the attempt counter before the state so a load completing in
        // between is never mistaken for "no load happened".
        let observed = self.load_attempts.load(Ordering::SeqCst);
        if let ModelState::Loaded(model) = &*self.state.read().await {
            return Ok(model.clone());
        }

        let _gate = self.load_gate.lock().await;

        // A load finished while we waited for the gate: take its outcome.
        if self.load_attempts.load(Ordering::SeqCst) != observed {
            return match &*self.state.read().await {
                ModelState::Loaded(model) => Ok(model.clone()),
                ModelState::NotLoaded(reason) | ModelState::LoadFailed(reason) => {
                    Err(InferenceError::ModelUnavailable(reason.clone()))
                }
            };
        }

        let loader = self.loader.clone();
        let outcome = tokio::task::spawn_blocking(move || loader.load())
            .await
            .unwrap_or_else(|e| Err(InferenceError::Artifact(format!("load task failed: {}", e))));

        let mut state = self.state.write().await;
        self.load_attempts.fetch_add(1, Ordering::SeqCst);

        match outcome {
            Ok(model) => {
                info!(
                    source = %self.loader.describe(),
                    classes = ?model.labels.labels(),
                    "Cancer model loaded"
                );
                let model = Arc::new(model);
                *state = ModelState::Loaded(model.clone());
                Ok(model)
            }
            Err(InferenceError::ModelUnavailable(reason)) => {
                *state = ModelState::NotLoaded(reason.clone());
                Err(InferenceError::ModelUnavailable(reason))
            }
            Err(e) => {
                warn!(
                    source = %self.loader.describe(),
                    error = %e,
                    "Found cancer model files but failed to load"
                );
                let reason = format!("Cancer model failed to load: {}", e);
                *state = ModelState::LoadFailed(reason.clone());
                Err(InferenceError::ModelUnavailable(reason))
            }
        }
    }
}
