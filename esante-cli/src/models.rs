//! Core data models for e-sante
//!
//! These models are shared by the dataset generator and the classifier:
//! the five physiological features, the health-status classes, sensor
//! readings, labeled samples and prediction results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of features in a sensor reading
pub const NUM_FEATURES: usize = 5;

/// Number of health-status classes
pub const NUM_CLASSES: usize = 4;

/// One of the five physiological measurements, in model input order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Feature {
    /// Volatile organic compound concentration (ppb)
    VocPpb,
    /// Estimated CO2 (ppm)
    Eco2Ppm,
    /// Heart rate (bpm)
    HeartRate,
    /// Blood-oxygen saturation (%)
    Spo2,
    /// Body temperature (°C)
    Temperature,
}

impl Feature {
    /// All features in model input order
    pub const ALL: [Feature; NUM_FEATURES] = [
        Feature::VocPpb,
        Feature::Eco2Ppm,
        Feature::HeartRate,
        Feature::Spo2,
        Feature::Temperature,
    ];

    /// Position of this feature in a feature vector
    pub fn index(self) -> usize {
        match self {
            Feature::VocPpb => 0,
            Feature::Eco2Ppm => 1,
            Feature::HeartRate => 2,
            Feature::Spo2 => 3,
            Feature::Temperature => 4,
        }
    }

    /// Column name used in dataset files
    pub fn column(self) -> &'static str {
        match self {
            Feature::VocPpb => "cov_ppb",
            Feature::Eco2Ppm => "eco2_ppm",
            Feature::HeartRate => "heart_rate",
            Feature::Spo2 => "spo2",
            Feature::Temperature => "temperature",
        }
    }

    /// Measurement unit
    pub fn unit(self) -> &'static str {
        match self {
            Feature::VocPpb => "ppb",
            Feature::Eco2Ppm => "ppm",
            Feature::HeartRate => "bpm",
            Feature::Spo2 => "%",
            Feature::Temperature => "°C",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Health-status class assigned to a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HealthStatus {
    Healthy,
    MildInfection,
    ModerateInfection,
    SevereHypoxia,
}

impl HealthStatus {
    /// All classes in label order
    pub const ALL: [HealthStatus; NUM_CLASSES] = [
        HealthStatus::Healthy,
        HealthStatus::MildInfection,
        HealthStatus::ModerateInfection,
        HealthStatus::SevereHypoxia,
    ];

    /// Integer class label (0-3)
    pub fn index(self) -> usize {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::MildInfection => 1,
            HealthStatus::ModerateInfection => 2,
            HealthStatus::SevereHypoxia => 3,
        }
    }

    /// Look up a class from its integer label
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Display name, also used as the profile name
    pub fn name(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::MildInfection => "mild-infection",
            HealthStatus::ModerateInfection => "moderate-infection",
            HealthStatus::SevereHypoxia => "severe-hypoxia",
        }
    }

    /// Clinical description of the archetype
    pub fn description(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Person in good health",
            HealthStatus::MildInfection => "Mild respiratory infection (cold/flu)",
            HealthStatus::ModerateInfection => "Moderate respiratory infection (bronchitis/COVID)",
            HealthStatus::SevereHypoxia => "Severe respiratory distress",
        }
    }

    /// Typical reading for the archetype, used for demo predictions
    pub fn reference_reading(self) -> Reading {
        match self {
            HealthStatus::Healthy => Reading::new(400.0, 420.0, 75.0, 98.0, 36.8),
            HealthStatus::MildInfection => Reading::new(750.0, 500.0, 95.0, 95.0, 37.8),
            HealthStatus::ModerateInfection => Reading::new(900.0, 580.0, 110.0, 91.0, 38.5),
            HealthStatus::SevereHypoxia => Reading::new(1000.0, 650.0, 125.0, 82.0, 39.2),
        }
    }

    /// Look up a class from its display name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Five raw feature values from one sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Reading {
    pub voc_ppb: f64,
    pub eco2_ppm: f64,
    pub heart_rate_bpm: f64,
    pub spo2_pct: f64,
    pub temperature_c: f64,
}

impl Reading {
    pub fn new(
        voc_ppb: f64,
        eco2_ppm: f64,
        heart_rate_bpm: f64,
        spo2_pct: f64,
        temperature_c: f64,
    ) -> Self {
        Self {
            voc_ppb,
            eco2_ppm,
            heart_rate_bpm,
            spo2_pct,
            temperature_c,
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::VocPpb => self.voc_ppb,
            Feature::Eco2Ppm => self.eco2_ppm,
            Feature::HeartRate => self.heart_rate_bpm,
            Feature::Spo2 => self.spo2_pct,
            Feature::Temperature => self.temperature_c,
        }
    }

    pub fn get_mut(&mut self, feature: Feature) -> &mut f64 {
        match feature {
            Feature::VocPpb => &mut self.voc_ppb,
            Feature::Eco2Ppm => &mut self.eco2_ppm,
            Feature::HeartRate => &mut self.heart_rate_bpm,
            Feature::Spo2 => &mut self.spo2_pct,
            Feature::Temperature => &mut self.temperature_c,
        }
    }

    /// Feature vector in model input order
    pub fn to_array(&self) -> [f64; NUM_FEATURES] {
        [
            self.voc_ppb,
            self.eco2_ppm,
            self.heart_rate_bpm,
            self.spo2_pct,
            self.temperature_c,
        ]
    }

    /// First feature holding NaN or an infinity, if any
    pub fn first_non_finite(&self) -> Option<Feature> {
        Feature::ALL.into_iter().find(|f| !self.get(*f).is_finite())
    }
}

/// One labeled training instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub reading: Reading,
    pub status: HealthStatus,
}

impl Sample {
    pub fn new(reading: Reading, status: HealthStatus) -> Self {
        Self { reading, status }
    }
}

/// Output of one inference, serialized with camelCase keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    /// Class label, or -1 when classification failed
    pub status_class: i32,
    pub status_name: String,
    /// Probability of the predicted class, as a percentage
    pub confidence: f64,
    /// Percentage probability for every class name
    pub probabilities: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResult {
    /// Status name reported when classification fails
    pub const ERROR_STATUS: &'static str = "error";

    /// Build a result from a per-class probability vector (fractions in 0..=1).
    ///
    /// Percentages are rounded to two decimals.
    pub fn from_probabilities(status: HealthStatus, probabilities: &[f64; NUM_CLASSES]) -> Self {
        let probabilities = HealthStatus::ALL
            .iter()
            .map(|s| (s.name().to_string(), round2(probabilities[s.index()] * 100.0)))
            .collect::<BTreeMap<_, _>>();
        let confidence = probabilities
            .get(status.name())
            .copied()
            .unwrap_or_default();

        Self {
            status_class: status.index() as i32,
            status_name: status.name().to_string(),
            confidence,
            probabilities,
            error: None,
        }
    }

    /// Sentinel result for a reading that could not be classified
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status_class: -1,
            status_name: Self::ERROR_STATUS.to_string(),
            confidence: 0.0,
            probabilities: BTreeMap::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status_class < 0
    }

    /// Typed status, `None` for the error sentinel
    pub fn status(&self) -> Option<HealthStatus> {
        usize::try_from(self.status_class)
            .ok()
            .and_then(HealthStatus::from_index)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
