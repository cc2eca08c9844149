//! Generate command - build a labeled synthetic dataset

use crate::generator::{DatasetGenerator, GeneratorConfig};
use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;

pub struct GenerateArgs {
    pub samples: usize,
    pub output: PathBuf,
    pub seed: u64,
    pub inject_outliers: bool,
    pub outlier_fraction: f64,
}

pub fn run(args: GenerateArgs) -> Result<()> {
    println!(
        "{} {} samples (seed {}, outliers {})",
        style("Generating").bold().cyan(),
        args.samples,
        args.seed,
        if args.inject_outliers { "on" } else { "off" }
    );

    let mut generator = DatasetGenerator::new(GeneratorConfig {
        seed: args.seed,
        outlier_fraction: args.outlier_fraction,
    });
    let dataset = generator
        .generate_dataset(args.samples, args.inject_outliers)
        .context("Failed to generate dataset")?;

    dataset
        .write_csv(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    println!();
    print!("{}", dataset.summary());
    println!();
    println!(
        "{} Dataset saved to {}",
        style("✓").green(),
        args.output.display()
    );
    Ok(())
}
