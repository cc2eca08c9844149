//! Persisted scaler/forest pair
//!
//! Training writes two blobs next to each other:
//! - `health_scaler.bin`: the fitted [`StandardScaler`]
//! - `health_model.bin`: the [`RandomForest`] plus [`ModelMetadata`]
//!
//! Both are `bitcode` encodings of versioned structs and carry the same pair
//! id. Loading a scaler and a model from different training runs is an error.

use super::forest::{argmax, RandomForest};
use super::scaler::StandardScaler;
use super::{ClassifierError, ClassifierResult};
use crate::models::{HealthStatus, PredictionResult, Reading, NUM_CLASSES};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SCALER_FILE: &str = "health_scaler.bin";
pub const MODEL_FILE: &str = "health_model.bin";

/// Bumped whenever a blob layout changes
const FORMAT_VERSION: u32 = 1;

/// Locations of the two artifact files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub scaler: PathBuf,
    pub model: PathBuf,
}

impl ArtifactPaths {
    /// Standard file names inside a model directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            scaler: dir.join(SCALER_FILE),
            model: dir.join(MODEL_FILE),
        }
    }

    pub fn exist(&self) -> bool {
        self.scaler.is_file() && self.model.is_file()
    }
}

/// Provenance recorded alongside the forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Shared with the scaler blob of the same run
    pub pair_id: String,
    pub trained_at: DateTime<Utc>,
    /// SHA-256 of the training dataset
    pub dataset_fingerprint: String,
    pub dataset_size: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub test_fraction: f64,
    pub accuracy: f64,
}

#[derive(Serialize, Deserialize)]
struct ScalerBlob {
    format_version: u32,
    pair_id: String,
    scaler: StandardScaler,
}

#[derive(Serialize, Deserialize)]
struct ModelBlob {
    format_version: u32,
    metadata: ModelMetadata,
    forest: RandomForest,
}

/// A scaler and forest fitted together on one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub scaler: StandardScaler,
    pub forest: RandomForest,
    pub metadata: ModelMetadata,
}

impl TrainedModel {
    /// Per-class vote fractions for a raw reading
    pub fn predict_proba(&self, reading: &Reading) -> ClassifierResult<[f64; NUM_CLASSES]> {
        if let Some(feature) = reading.first_non_finite() {
            return Err(ClassifierError::InvalidInput(format!(
                "{} must be a finite number, got {}",
                feature,
                reading.get(feature)
            )));
        }
        let scaled = self.scaler.transform_row(&reading.to_array());
        Ok(self.forest.predict_proba(&scaled))
    }

    /// Classify a raw reading
    pub fn predict(&self, reading: &Reading) -> ClassifierResult<PredictionResult> {
        let proba = self.predict_proba(reading)?;
        let status = HealthStatus::from_index(argmax(&proba)).unwrap_or(HealthStatus::Healthy);
        Ok(PredictionResult::from_probabilities(status, &proba))
    }

    /// Write both blobs, creating the directories as needed
    pub fn save(&self, paths: &ArtifactPaths) -> ClassifierResult<()> {
        let scaler = ScalerBlob {
            format_version: FORMAT_VERSION,
            pair_id: self.metadata.pair_id.clone(),
            scaler: self.scaler.clone(),
        };
        let model = ModelBlob {
            format_version: FORMAT_VERSION,
            metadata: self.metadata.clone(),
            forest: self.forest.clone(),
        };

        write_blob(&paths.scaler, &scaler)?;
        write_blob(&paths.model, &model)?;

        info!(
            "Saved model {} to {}",
            self.metadata.pair_id,
            paths.model.display()
        );
        Ok(())
    }

    /// Load a matched pair of blobs
    pub fn load(paths: &ArtifactPaths) -> ClassifierResult<Self> {
        let scaler: ScalerBlob = read_blob(&paths.scaler)?;
        let model: ModelBlob = read_blob(&paths.model)?;

        for (path, version) in [
            (&paths.scaler, scaler.format_version),
            (&paths.model, model.format_version),
        ] {
            if version != FORMAT_VERSION {
                return Err(ClassifierError::ArtifactCorrupt {
                    path: path.clone(),
                    message: format!(
                        "format version {version}, expected {FORMAT_VERSION}"
                    ),
                });
            }
        }

        if scaler.pair_id != model.metadata.pair_id {
            return Err(ClassifierError::ArtifactMismatch {
                scaler_pair: scaler.pair_id,
                model_pair: model.metadata.pair_id,
            });
        }

        debug!(
            "Loaded model {} ({} trees, trained {})",
            model.metadata.pair_id,
            model.forest.n_trees(),
            model.metadata.trained_at
        );
        Ok(Self {
            scaler: scaler.scaler,
            forest: model.forest,
            metadata: model.metadata,
        })
    }
}

fn write_blob<T: Serialize>(path: &Path, value: &T) -> ClassifierResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = bitcode::serialize(value).map_err(|e| ClassifierError::ArtifactCorrupt {
        path: path.to_path_buf(),
        message: format!("encode failed: {e}"),
    })?;

    // write-then-rename
    let tmp = path.with_extension("bin.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_blob<T: DeserializeOwned>(path: &Path) -> ClassifierResult<T> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ClassifierError::ArtifactMissing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    bitcode::deserialize(&bytes).map_err(|e| ClassifierError::ArtifactCorrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
