//! Synthetic physiological dataset generation
//!
//! Builds labeled training data from four clinical profiles. Each sample is
//! drawn per feature from a clipped Normal around the profile's range
//! midpoint, then the dataset as a whole goes through sensor noise,
//! physiological correlation rules and optional outlier injection before a
//! final shuffle.
//!
//! # Example
//!
//! ```rust,ignore
//! use esante::generator::{DatasetGenerator, GeneratorConfig};
//!
//! let mut generator = DatasetGenerator::new(GeneratorConfig::default());
//! let dataset = generator.generate_dataset(2000, true)?;
//! dataset.write_csv("health_dataset.csv")?;
//! ```

mod dataset;
pub mod noise;
mod profile;

pub use dataset::{Dataset, DatasetGenerator, DatasetSummary, FeatureStats, GeneratorConfig};
pub use profile::{FeatureRange, PhysiologicalProfile, ProfileRegistry};

use thiserror::Error;

/// Errors raised while building, writing or loading datasets
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Unknown profile '{0}' (expected one of: healthy, mild-infection, moderate-infection, severe-hypoxia)")]
    UnknownProfile(String),

    #[error("Registry must hold one profile per class, got [{0}]")]
    IncompleteRegistry(String),

    #[error("Profile priors must sum to 1.0, got {0:.6}")]
    InvalidPriors(f64),

    #[error("Invalid distribution for {profile}/{feature}: {message}")]
    InvalidDistribution {
        profile: String,
        feature: String,
        message: String,
    },

    #[error("Cannot allocate a dataset of {0} samples")]
    TooManySamples(usize),

    #[error("Invalid dataset record at line {line}: {message}")]
    InvalidRecord { line: u64, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GeneratorResult<T> = Result<T, GeneratorError>;
