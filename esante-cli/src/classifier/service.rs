//! Inference entry point with a load-once artifact cache
//!
//! The cache is an explicit object rather than a global: whoever composes the
//! ingestion endpoint builds one [`ArtifactCache`] and hands clones of a
//! [`HealthClassifier`] to its handlers. The first prediction loads the pair
//! from disk under a mutex, so concurrent first callers block briefly and
//! then share the same fully loaded model.

use super::artifact::{ArtifactPaths, TrainedModel};
use super::{ClassifierError, ClassifierResult};
use crate::models::{PredictionResult, Reading};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Holds the trained model once it has been loaded or installed
#[derive(Debug)]
pub struct ArtifactCache {
    paths: Option<ArtifactPaths>,
    slot: Mutex<Option<Arc<TrainedModel>>>,
}

impl ArtifactCache {
    /// Cache backed by artifact files, loaded on first use
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths: Some(paths),
            slot: Mutex::new(None),
        }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(ArtifactPaths::in_dir(dir))
    }

    /// Cache with no backing files; only [`ArtifactCache::install`] fills it
    pub fn in_memory() -> Self {
        Self {
            paths: None,
            slot: Mutex::new(None),
        }
    }

    pub fn paths(&self) -> Option<&ArtifactPaths> {
        self.paths.as_ref()
    }

    /// Put a freshly trained model in the cache, replacing any loaded one
    pub fn install(&self, model: TrainedModel) -> Arc<TrainedModel> {
        let model = Arc::new(model);
        *self.slot.lock() = Some(Arc::clone(&model));
        model
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Return the cached model, loading it from disk on first call.
    ///
    /// A failed load leaves the slot empty, so the next call retries.
    pub fn get_or_load(&self) -> ClassifierResult<Arc<TrainedModel>> {
        let mut slot = self.slot.lock();
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        let paths = self.paths.as_ref().ok_or(ClassifierError::ArtifactNotTrained)?;
        let model = Arc::new(TrainedModel::load(paths)?);
        info!(
            "Loaded model {} from {}",
            model.metadata.pair_id,
            paths.model.display()
        );
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }
}

/// Single-reading classifier over a shared [`ArtifactCache`]
#[derive(Debug, Clone)]
pub struct HealthClassifier {
    cache: Arc<ArtifactCache>,
}

impl HealthClassifier {
    pub fn new(cache: Arc<ArtifactCache>) -> Self {
        Self { cache }
    }

    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(ArtifactCache::in_dir(dir)))
    }

    pub fn cache(&self) -> &Arc<ArtifactCache> {
        &self.cache
    }

    /// Classify five raw feature values.
    ///
    /// Never fails: any error (missing artifact, nothing trained, non-finite
    /// input) comes back as the error sentinel with its message.
    pub fn predict(
        &self,
        voc_ppb: f64,
        eco2_ppm: f64,
        heart_rate: f64,
        spo2: f64,
        temperature: f64,
    ) -> PredictionResult {
        self.predict_reading(&Reading::new(
            voc_ppb,
            eco2_ppm,
            heart_rate,
            spo2,
            temperature,
        ))
    }

    pub fn predict_reading(&self, reading: &Reading) -> PredictionResult {
        match self.try_predict(reading) {
            Ok(result) => result,
            Err(e) => {
                warn!("Classification failed: {}", e);
                PredictionResult::error(e.to_string())
            }
        }
    }

    /// Like [`HealthClassifier::predict_reading`] but with the typed error
    pub fn try_predict(&self, reading: &Reading) -> ClassifierResult<PredictionResult> {
        let model = self.cache.get_or_load()?;
        let result = model.predict(reading)?;
        debug!(
            "Classified reading as {} ({:.2}%)",
            result.status_name, result.confidence
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{train, TrainConfig};
    use crate::generator::{DatasetGenerator, GeneratorConfig};
    use tempfile::TempDir;

    #[test]
    fn test_predict_without_artifact_returns_sentinel() {
        let dir = TempDir::new().unwrap();
        let classifier = HealthClassifier::from_dir(dir.path());

        let result = classifier.predict(400.0, 420.0, 75.0, 98.0, 36.8);
        assert_eq!(result.status_class, -1);
        assert_eq!(result.status_name, "error");
        assert!(result.probabilities.is_empty());
        assert!(result.error.as_deref().is_some_and(|m| !m.is_empty()));
        assert!(!classifier.cache().is_loaded());
    }

    #[test]
    fn test_in_memory_cache_not_trained() {
        let classifier = HealthClassifier::new(Arc::new(ArtifactCache::in_memory()));
        let err = classifier
            .try_predict(&Reading::new(400.0, 420.0, 75.0, 98.0, 36.8))
            .unwrap_err();
        assert!(matches!(err, ClassifierError::ArtifactNotTrained));
    }

    #[test]
    fn test_failed_load_is_retried() {
        let dir = TempDir::new().unwrap();
        let cache = ArtifactCache::in_dir(dir.path());
        assert!(cache.get_or_load().is_err());
        assert!(cache.get_or_load().is_err());
        assert!(!cache.is_loaded());
    }

    fn small_model() -> TrainedModel {
        let data = DatasetGenerator::new(GeneratorConfig::default())
            .generate_dataset(200, false)
            .unwrap();
        let config = TrainConfig {
            n_trees: 5,
            ..Default::default()
        };
        train(&data, &config).unwrap().model
    }

    #[test]
    fn test_concurrent_first_use_shares_one_model() {
        let dir = TempDir::new().unwrap();
        small_model().save(&ArtifactPaths::in_dir(dir.path())).unwrap();
        let cache = Arc::new(ArtifactCache::in_dir(dir.path()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get_or_load().unwrap())
            })
            .collect();
        let models: Vec<Arc<TrainedModel>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let first = &models[0];
        assert!(models.iter().all(|m| Arc::ptr_eq(first, m)));
        assert!(Arc::ptr_eq(first, &cache.get_or_load().unwrap()));
    }

    #[test]
    fn test_installed_model_serves_predictions() {
        let cache = ArtifactCache::in_memory();
        let installed = cache.install(small_model());
        assert!(cache.is_loaded());

        let classifier = HealthClassifier::new(Arc::new(cache));
        let result = classifier.predict(400.0, 420.0, 75.0, 98.0, 36.8);
        assert!(!result.is_error(), "{:?}", result.error);
        assert_eq!(result.probabilities.len(), 4);
        assert!(Arc::ptr_eq(
            &installed,
            &classifier.cache().get_or_load().unwrap()
        ));
    }
}
