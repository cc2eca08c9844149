//! Health-status classifier
//!
//! A random forest behind a standard scaler, trained on generated datasets
//! and served through a load-once artifact cache.
//!
//! Pipeline: raw reading → [`StandardScaler`] → [`RandomForest`] vote
//! fractions → [`PredictionResult`](crate::models::PredictionResult)
//!
//! Training runs offline ([`train()`]) and persists a scaler blob and a model
//! blob side by side. Inference ([`HealthClassifier::predict`]) loads that
//! pair on first use and never fails the caller: a missing or broken
//! artifact degrades into the error sentinel.

pub mod artifact;
pub mod forest;
pub mod metrics;
pub mod scaler;
pub mod service;
pub mod train;
pub mod tree;

pub use artifact::{ArtifactPaths, ModelMetadata, TrainedModel};
pub use forest::{ForestParams, RandomForest};
pub use metrics::{ClassMetrics, ClassificationReport, ConfusionMatrix};
pub use scaler::StandardScaler;
pub use service::{ArtifactCache, HealthClassifier};
pub use train::{stratified_split, train, FeatureImportance, TrainConfig, TrainResult};
pub use tree::{DecisionTree, MaxFeatures, TreeParams};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by training, artifact persistence and inference
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Model artifact not found: {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("No trained model available in this process")]
    ArtifactNotTrained,

    #[error("Corrupt model artifact {}: {message}", path.display())]
    ArtifactCorrupt { path: PathBuf, message: String },

    #[error("Scaler and model were not trained together (scaler {scaler_pair}, model {model_pair})")]
    ArtifactMismatch {
        scaler_pair: String,
        model_pair: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot train on an empty dataset: {0}")]
    EmptyDataset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ClassifierResult<T> = Result<T, ClassifierError>;
