//! Profiles command - list the clinical archetypes

use crate::generator::ProfileRegistry;
use crate::models::Feature;
use anyhow::Result;
use console::style;

pub fn run() -> Result<()> {
    let registry = ProfileRegistry::default();
    for profile in registry.iter() {
        println!(
            "{} {} (prior {:.0}%)",
            style(profile.name()).bold().cyan(),
            style(format!("- {}", profile.description())).dim(),
            profile.class_prior * 100.0
        );
        for feature in Feature::ALL {
            let range = profile.range(feature);
            println!(
                "  {:<12} {:>7.1} - {:<7.1} {:<4} std {}",
                feature.column(),
                range.min,
                range.max,
                feature.unit(),
                range.std
            );
        }
        println!();
    }
    Ok(())
}
