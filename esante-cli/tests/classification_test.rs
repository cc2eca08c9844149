//! End-to-end pipeline tests
//!
//! Generate a dataset, train, persist the artifact pair, then classify
//! through a fresh classifier that loads from disk.

use esante::classifier::{self, ArtifactPaths, HealthClassifier, TrainConfig, TrainedModel};
use esante::generator::{Dataset, DatasetGenerator, GeneratorConfig};
use esante::models::{HealthStatus, PredictionResult};

fn generate(samples: usize) -> Dataset {
    DatasetGenerator::new(GeneratorConfig::default())
        .generate_dataset(samples, true)
        .unwrap()
}

fn trained_dir() -> (tempfile::TempDir, f64) {
    let dir = tempfile::tempdir().unwrap();
    let dataset = generate(2000);
    let result = classifier::train(&dataset, &TrainConfig::default()).unwrap();
    result
        .model
        .save(&ArtifactPaths::in_dir(dir.path()))
        .unwrap();
    (dir, result.accuracy)
}

fn probability_total(result: &PredictionResult) -> f64 {
    result.probabilities.values().sum()
}

#[test]
fn test_full_pipeline_through_saved_artifacts() {
    let (dir, accuracy) = trained_dir();
    assert!(accuracy > 0.8, "held-out accuracy {accuracy}");

    let classifier = HealthClassifier::from_dir(dir.path());

    let healthy = classifier.predict(400.0, 420.0, 75.0, 98.0, 36.8);
    assert!(!healthy.is_error(), "{:?}", healthy.error);
    assert_eq!(healthy.status_name, "healthy");
    assert!(healthy.confidence > 50.0, "confidence {}", healthy.confidence);
    assert!((probability_total(&healthy) - 100.0).abs() <= 0.5);

    let severe = classifier.predict(1000.0, 650.0, 125.0, 82.0, 39.2);
    assert_eq!(severe.status_name, "severe-hypoxia");
    assert_eq!(severe.status(), Some(HealthStatus::SevereHypoxia));
    assert!((probability_total(&severe) - 100.0).abs() <= 0.5);

    for status in HealthStatus::ALL {
        let result = classifier.predict_reading(&status.reference_reading());
        assert_eq!(result.probabilities.len(), HealthStatus::ALL.len());
        assert!(result.confidence >= 0.0 && result.confidence <= 100.0);
    }
}

#[test]
fn test_saved_model_reloads_with_same_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    let dataset = generate(400);
    let config = TrainConfig {
        n_trees: 10,
        ..Default::default()
    };
    let result = classifier::train(&dataset, &config).unwrap();
    result.model.save(&paths).unwrap();

    let loaded = TrainedModel::load(&paths).unwrap();
    assert_eq!(loaded.metadata, result.model.metadata);
    assert_eq!(loaded.metadata.dataset_fingerprint, dataset.fingerprint());

    let reading = HealthStatus::MildInfection.reference_reading();
    assert_eq!(
        loaded.predict(&reading).unwrap(),
        result.model.predict(&reading).unwrap()
    );
}

#[test]
fn test_training_is_reproducible() {
    let dataset = generate(800);
    let config = TrainConfig {
        n_trees: 25,
        ..Default::default()
    };
    let first = classifier::train(&dataset, &config).unwrap();
    let second = classifier::train(&dataset, &config).unwrap();

    assert_eq!(first.accuracy, second.accuracy);
    assert_eq!(first.report.confusion, second.report.confusion);
    let reading = HealthStatus::ModerateInfection.reference_reading();
    assert_eq!(
        first.model.predict(&reading).unwrap(),
        second.model.predict(&reading).unwrap()
    );
}

#[test]
fn test_written_csv_reloads_with_same_counts() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("data").join("health_dataset.csv");
    let dataset = generate(300);
    dataset.write_csv(&csv_path).unwrap();

    let loaded = Dataset::load_csv(&csv_path).unwrap();
    assert_eq!(loaded.len(), dataset.len());
    assert_eq!(loaded.class_counts(), dataset.class_counts());
}

#[test]
fn test_prediction_without_artifacts_returns_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = HealthClassifier::from_dir(dir.path());

    let result = classifier.predict(400.0, 420.0, 75.0, 98.0, 36.8);
    assert!(result.is_error());
    assert_eq!(result.status_class, -1);
    assert_eq!(result.status_name, "error");
    assert_eq!(result.confidence, 0.0);
    assert!(result.probabilities.is_empty());
    assert!(result.error.is_some());
}

#[test]
fn test_sentinel_then_recovery_once_artifacts_exist() {
    let dir = tempfile::tempdir().unwrap();
    let classifier = HealthClassifier::from_dir(dir.path());
    assert!(classifier.predict(400.0, 420.0, 75.0, 98.0, 36.8).is_error());

    let config = TrainConfig {
        n_trees: 10,
        ..Default::default()
    };
    let result = classifier::train(&generate(400), &config).unwrap();
    result
        .model
        .save(&ArtifactPaths::in_dir(dir.path()))
        .unwrap();

    let recovered = classifier.predict(400.0, 420.0, 75.0, 98.0, 36.8);
    assert!(!recovered.is_error(), "{:?}", recovered.error);
}

#[test]
fn test_non_finite_reading_returns_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainConfig {
        n_trees: 5,
        ..Default::default()
    };
    let result = classifier::train(&generate(200), &config).unwrap();
    result
        .model
        .save(&ArtifactPaths::in_dir(dir.path()))
        .unwrap();
    let classifier = HealthClassifier::from_dir(dir.path());

    let result = classifier.predict(f64::NAN, 420.0, 75.0, 98.0, 36.8);
    assert!(result.is_error());
    assert!(classifier.cache().is_loaded());
}
