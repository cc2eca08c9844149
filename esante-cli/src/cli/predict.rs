//! Predict command - classify one reading with the saved artifacts

use crate::classifier::HealthClassifier;
use crate::models::{HealthStatus, Reading};
use anyhow::Result;
use console::style;
use std::path::Path;

/// Classification failures are reported as the error sentinel, not as a
/// process error.
pub fn run(reading: Reading, json: bool, model_dir: &Path) -> Result<()> {
    let classifier = HealthClassifier::from_dir(model_dir);
    let result = classifier.predict_reading(&reading);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if let Some(message) = &result.error {
        println!("{} {}", style("Classification failed:").red().bold(), message);
        return Ok(());
    }

    println!(
        "{} {} ({:.2}% confidence)",
        style("Status:").bold(),
        style(&result.status_name).cyan().bold(),
        result.confidence
    );
    println!();
    for status in HealthStatus::ALL {
        let pct = result
            .probabilities
            .get(status.name())
            .copied()
            .unwrap_or_default();
        println!(
            "  {:<20} {:>6.2}%  {}",
            status.name(),
            pct,
            "█".repeat((pct / 2.5).round() as usize)
        );
    }
    Ok(())
}
