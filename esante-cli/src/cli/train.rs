//! Train command - fit the classifier and persist its artifacts

use crate::classifier::{self, ArtifactCache, ArtifactPaths, HealthClassifier, TrainConfig};
use crate::generator::Dataset;
use crate::models::HealthStatus;
use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

pub struct TrainArgs {
    pub data: PathBuf,
    pub test_fraction: f64,
    pub seed: u64,
    pub trees: usize,
    pub model_dir: PathBuf,
    pub demo: bool,
}

pub fn run(args: TrainArgs) -> Result<()> {
    if !args.data.exists() {
        anyhow::bail!(
            "Dataset not found: {}\nRun `esante generate -o {}` first.",
            args.data.display(),
            args.data.display()
        );
    }
    let dataset = Dataset::load_csv(&args.data)
        .with_context(|| format!("Failed to load {}", args.data.display()))?;
    println!(
        "{} {} samples from {}",
        style("Loaded").bold().cyan(),
        dataset.len(),
        args.data.display()
    );

    let config = TrainConfig {
        test_fraction: args.test_fraction,
        seed: args.seed,
        n_trees: args.trees,
        ..Default::default()
    };
    let result = classifier::train(&dataset, &config).context("Training failed")?;

    println!();
    print!("{}", result);

    let paths = ArtifactPaths::in_dir(&args.model_dir);
    result
        .model
        .save(&paths)
        .with_context(|| format!("Failed to save model to {}", args.model_dir.display()))?;
    println!();
    println!("{} Scaler saved to {}", style("✓").green(), paths.scaler.display());
    println!("{} Model saved to {}", style("✓").green(), paths.model.display());

    if args.demo {
        let cache = ArtifactCache::new(paths);
        cache.install(result.model);
        print_reference_predictions(&HealthClassifier::new(Arc::new(cache)));
    }
    Ok(())
}

fn print_reference_predictions(classifier: &HealthClassifier) {
    println!();
    println!("{}", style("Reference readings:").bold());
    for expected in HealthStatus::ALL {
        let reading = expected.reference_reading();
        let result = classifier.predict_reading(&reading);
        let mark = if result.status() == Some(expected) {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!(
            "  {} {:<20} -> {:<20} {:>6.2}%",
            mark,
            expected.name(),
            result.status_name,
            result.confidence
        );
    }
}
