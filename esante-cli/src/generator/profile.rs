//! Clinical profiles
//!
//! A profile is a named archetype with a `(min, max, std)` triple per feature
//! and a class prior. The registry holds exactly one profile per
//! [`HealthStatus`] and its priors sum to one.

use super::{GeneratorError, GeneratorResult};
use crate::models::{Feature, HealthStatus, NUM_CLASSES, NUM_FEATURES};
use serde::Serialize;

const PRIOR_TOLERANCE: f64 = 1e-9;

/// Distribution parameters for one feature within one profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureRange {
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

impl FeatureRange {
    pub const fn new(min: f64, max: f64, std: f64) -> Self {
        Self { min, max, std }
    }

    /// Center of the range, used as the Normal mean
    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clip(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// A named clinical archetype
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhysiologicalProfile {
    pub status: HealthStatus,
    /// Ranges in [`Feature::ALL`] order
    pub ranges: [FeatureRange; NUM_FEATURES],
    pub class_prior: f64,
}

impl PhysiologicalProfile {
    pub fn name(&self) -> &'static str {
        self.status.name()
    }

    pub fn description(&self) -> &'static str {
        self.status.description()
    }

    pub fn range(&self, feature: Feature) -> &FeatureRange {
        &self.ranges[feature.index()]
    }

    fn validate(&self) -> GeneratorResult<()> {
        for feature in Feature::ALL {
            let range = self.range(feature);
            let message = if !(range.min.is_finite() && range.max.is_finite()) {
                Some("bounds must be finite".to_string())
            } else if range.min > range.max {
                Some(format!("min {} exceeds max {}", range.min, range.max))
            } else if !(range.std.is_finite() && range.std >= 0.0) {
                Some(format!("std {} must be finite and non-negative", range.std))
            } else {
                None
            };
            if let Some(message) = message {
                return Err(GeneratorError::InvalidDistribution {
                    profile: self.name().to_string(),
                    feature: feature.column().to_string(),
                    message,
                });
            }
        }
        Ok(())
    }
}

/// Immutable set of profiles, one per class, in class order
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<PhysiologicalProfile>,
}

impl ProfileRegistry {
    /// Build a registry from custom profiles.
    ///
    /// Every class must appear exactly once, every range must be well formed
    /// and the priors must sum to 1.0.
    pub fn new(mut profiles: Vec<PhysiologicalProfile>) -> GeneratorResult<Self> {
        profiles.sort_by_key(|p| p.status);
        let complete = profiles.len() == NUM_CLASSES
            && profiles
                .iter()
                .zip(HealthStatus::ALL)
                .all(|(p, s)| p.status == s);
        if !complete {
            let names: Vec<&str> = profiles.iter().map(|p| p.name()).collect();
            return Err(GeneratorError::IncompleteRegistry(names.join(", ")));
        }

        for profile in &profiles {
            profile.validate()?;
        }

        let total: f64 = profiles.iter().map(|p| p.class_prior).sum();
        if (total - 1.0).abs() > PRIOR_TOLERANCE || profiles.iter().any(|p| p.class_prior < 0.0) {
            return Err(GeneratorError::InvalidPriors(total));
        }

        Ok(Self { profiles })
    }

    /// Look up a profile by its display name
    pub fn get(&self, name: &str) -> GeneratorResult<&PhysiologicalProfile> {
        HealthStatus::from_name(name)
            .map(|status| self.for_status(status))
            .ok_or_else(|| GeneratorError::UnknownProfile(name.to_string()))
    }

    pub fn for_status(&self, status: HealthStatus) -> &PhysiologicalProfile {
        &self.profiles[status.index()]
    }

    /// Profiles in class order
    pub fn iter(&self) -> impl Iterator<Item = &PhysiologicalProfile> {
        self.profiles.iter()
    }
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self {
            profiles: builtin_profiles(),
        }
    }
}

fn builtin_profiles() -> Vec<PhysiologicalProfile> {
    use FeatureRange as R;

    vec![
        PhysiologicalProfile {
            status: HealthStatus::Healthy,
            ranges: [
                R::new(300.0, 500.0, 80.0),
                R::new(380.0, 450.0, 25.0),
                R::new(60.0, 85.0, 8.0),
                R::new(96.0, 100.0, 1.5),
                R::new(36.4, 37.2, 0.3),
            ],
            class_prior: 0.50,
        },
        PhysiologicalProfile {
            status: HealthStatus::MildInfection,
            ranges: [
                R::new(600.0, 900.0, 100.0),
                R::new(450.0, 550.0, 40.0),
                R::new(85.0, 105.0, 12.0),
                R::new(94.0, 97.0, 2.0),
                R::new(37.3, 38.5, 0.5),
            ],
            class_prior: 0.25,
        },
        PhysiologicalProfile {
            status: HealthStatus::ModerateInfection,
            ranges: [
                R::new(700.0, 1100.0, 120.0),
                R::new(500.0, 650.0, 50.0),
                R::new(95.0, 120.0, 15.0),
                R::new(89.0, 94.0, 2.5),
                R::new(37.8, 39.5, 0.6),
            ],
            class_prior: 0.15,
        },
        PhysiologicalProfile {
            status: HealthStatus::SevereHypoxia,
            ranges: [
                R::new(800.0, 1200.0, 130.0),
                R::new(550.0, 700.0, 60.0),
                R::new(105.0, 140.0, 18.0),
                R::new(75.0, 89.0, 4.0),
                R::new(37.5, 40.0, 0.8),
            ],
            class_prior: 0.10,
        },
    ]
}
