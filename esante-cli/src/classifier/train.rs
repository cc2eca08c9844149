//! Training for the health classifier
//!
//! Stratified train/test split, scaler fit on the training rows only, forest
//! fit on the scaled training rows, evaluation on the held-out rows.

use super::artifact::{ModelMetadata, TrainedModel};
use super::forest::{ForestParams, RandomForest};
use super::metrics::ClassificationReport;
use super::scaler::StandardScaler;
use super::tree::TreeParams;
use super::{ClassifierError, ClassifierResult};
use crate::generator::Dataset;
use crate::models::{Feature, NUM_CLASSES, NUM_FEATURES};
use chrono::Utc;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::fmt;
use tracing::info;
use uuid::Uuid;

/// Training configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainConfig {
    /// Held-out share of each class (0.0 - 1.0, exclusive)
    pub test_fraction: f64,
    /// Seed for the split and the forest
    pub seed: u64,
    /// Number of trees
    pub n_trees: usize,
    pub tree: TreeParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            n_trees: 100,
            tree: TreeParams::default(),
        }
    }
}

impl TrainConfig {
    fn validate(&self) -> ClassifierResult<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ClassifierError::InvalidConfig(format!(
                "test fraction must be between 0 and 1, got {}",
                self.test_fraction
            )));
        }
        if self.n_trees == 0 {
            return Err(ClassifierError::InvalidConfig(
                "at least one tree is required".into(),
            ));
        }
        Ok(())
    }
}

/// Share of total impurity decrease attributed to one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: Feature,
    pub importance: f64,
}

/// Training result
#[derive(Debug)]
pub struct TrainResult {
    /// Held-out accuracy (0.0 - 1.0)
    pub accuracy: f64,
    pub report: ClassificationReport,
    /// Sorted by descending importance
    pub importances: Vec<FeatureImportance>,
    pub model: TrainedModel,
}

impl fmt::Display for TrainResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = &self.model.metadata;
        writeln!(
            f,
            "Trained on {} samples, evaluated on {}",
            meta.train_size, meta.test_size
        )?;
        writeln!(f, "Accuracy: {:.2}%", self.accuracy * 100.0)?;
        writeln!(f)?;
        write!(f, "{}", self.report)?;
        writeln!(f)?;
        write!(f, "{}", self.report.confusion)?;
        writeln!(f)?;
        writeln!(f, "Feature importance:")?;
        for fi in &self.importances {
            writeln!(
                f,
                "  {:<12} {:>6.2}%  {}",
                fi.feature.column(),
                fi.importance * 100.0,
                "█".repeat((fi.importance * 40.0).round() as usize)
            )?;
        }
        Ok(())
    }
}

/// Split row indices per class, holding out `round(n_class * test_fraction)`
/// of each class. Returns `(train, test)`, each sorted ascending.
pub fn stratified_split(
    labels: &[usize],
    test_fraction: f64,
    seed: u64,
) -> (Vec<usize>, Vec<usize>) {
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); NUM_CLASSES];
    for (i, &label) in labels.iter().enumerate() {
        if let Some(bucket) = by_class.get_mut(label) {
            bucket.push(i);
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();
    for mut bucket in by_class {
        bucket.shuffle(&mut rng);
        let n_test = ((bucket.len() as f64) * test_fraction).round() as usize;
        let n_test = n_test.min(bucket.len());
        test.extend_from_slice(&bucket[..n_test]);
        train.extend_from_slice(&bucket[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

fn select<T: Copy>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i]).collect()
}

/// Train a scaler and forest on a dataset
pub fn train(dataset: &Dataset, config: &TrainConfig) -> ClassifierResult<TrainResult> {
    config.validate()?;
    if dataset.is_empty() {
        return Err(ClassifierError::EmptyDataset("dataset has no samples".into()));
    }

    let x = dataset.features();
    let y = dataset.labels();
    let (train_idx, test_idx) = stratified_split(&y, config.test_fraction, config.seed);
    if train_idx.is_empty() {
        return Err(ClassifierError::EmptyDataset(
            "split left no training samples".into(),
        ));
    }
    if test_idx.is_empty() {
        return Err(ClassifierError::EmptyDataset(
            "split left no test samples".into(),
        ));
    }
    info!(
        "Training: {} samples, Test: {} samples",
        train_idx.len(),
        test_idx.len()
    );

    let scaler = StandardScaler::fit(&select(&x, &train_idx))?;
    let x_train = scaler.transform(&select(&x, &train_idx));
    let x_test = scaler.transform(&select(&x, &test_idx));
    let y_train = select(&y, &train_idx);
    let y_test = select(&y, &test_idx);

    let forest = RandomForest::fit(
        &x_train,
        &y_train,
        ForestParams {
            n_trees: config.n_trees,
            tree: config.tree,
            bootstrap: true,
            seed: config.seed,
        },
    )?;

    let predicted = forest.predict_batch(&x_test);
    let report = ClassificationReport::new(&y_test, &predicted);
    let accuracy = report.accuracy;
    info!("Held-out accuracy: {:.2}%", accuracy * 100.0);

    let importances = ranked_importances(&forest.feature_importances());

    let metadata = ModelMetadata {
        pair_id: Uuid::new_v4().to_string(),
        trained_at: Utc::now(),
        dataset_fingerprint: dataset.fingerprint(),
        dataset_size: dataset.len(),
        train_size: train_idx.len(),
        test_size: test_idx.len(),
        test_fraction: config.test_fraction,
        accuracy,
    };

    Ok(TrainResult {
        accuracy,
        report,
        importances,
        model: TrainedModel {
            scaler,
            forest,
            metadata,
        },
    })
}

fn ranked_importances(values: &[f64; NUM_FEATURES]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = Feature::ALL
        .iter()
        .map(|&feature| FeatureImportance {
            feature,
            importance: values[feature.index()],
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}
