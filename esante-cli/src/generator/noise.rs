//! Dataset-wide perturbations
//!
//! Applied after per-profile sampling, in this order:
//! 1. multiplicative/additive sensor noise, then a re-clip to the
//!    system-wide plausibility bounds with per-feature rounding
//! 2. physiological correlation rules (fever and hypoxia raise heart rate)
//! 3. optional outlier injection, which is never re-clipped

use crate::models::{Feature, Reading};
use rand::seq::index;
use rand::seq::IndexedRandom;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// System-wide plausibility bound for one feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlausibilityBound {
    pub min: f64,
    pub max: f64,
    /// Decimal places kept after clipping, `None` leaves the value as is
    pub decimals: Option<i32>,
}

impl PlausibilityBound {
    const fn new(min: f64, max: f64, decimals: Option<i32>) -> Self {
        Self { min, max, decimals }
    }

    pub fn clip(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    fn clip_and_round(&self, value: f64) -> f64 {
        let clipped = self.clip(value);
        match self.decimals {
            Some(d) => {
                let factor = 10f64.powi(d);
                (clipped * factor).round() / factor
            }
            None => clipped,
        }
    }
}

/// Plausibility bounds in [`Feature::ALL`] order
pub const PLAUSIBILITY_BOUNDS: [PlausibilityBound; 5] = [
    PlausibilityBound::new(100.0, 2000.0, None),
    PlausibilityBound::new(350.0, 800.0, None),
    PlausibilityBound::new(40.0, 180.0, Some(0)),
    PlausibilityBound::new(70.0, 100.0, Some(1)),
    PlausibilityBound::new(35.0, 41.0, Some(1)),
];

pub fn bound(feature: Feature) -> &'static PlausibilityBound {
    &PLAUSIBILITY_BOUNDS[feature.index()]
}

/// Relative half-width of the VOC and eCO2 multiplicative noise
const GAS_NOISE: f64 = 0.05;
const HEART_RATE_NOISE: f64 = GAS_NOISE / 2.0;
const SPO2_NOISE: f64 = GAS_NOISE / 10.0;
const TEMPERATURE_NOISE_STD: f64 = 0.1;

/// Fever threshold for the heart-rate correlation (°C)
const FEVER_ONSET_C: f64 = 37.0;
const FEVER_BPM_PER_DEGREE: f64 = 10.0;
const FEVER_MAX_BPM: f64 = 30.0;

/// Saturation below which heart rate compensates (%)
const HYPOXIA_ONSET_PCT: f64 = 95.0;
const HYPOXIA_BPM_PER_POINT: f64 = 2.0;
const HYPOXIA_MAX_POINTS: f64 = 20.0;

/// Features eligible for outlier perturbation
pub const OUTLIER_FEATURES: [Feature; 3] = [Feature::VocPpb, Feature::Eco2Ppm, Feature::HeartRate];
const OUTLIER_FACTOR_MIN: f64 = 1.3;
const OUTLIER_FACTOR_MAX: f64 = 1.7;

/// Simulate sensor measurement error on one reading, then re-clip and round
pub fn apply_sensor_noise<R: Rng + ?Sized>(reading: &mut Reading, rng: &mut R) {
    reading.voc_ppb *= rng.random_range(1.0 - GAS_NOISE..1.0 + GAS_NOISE);
    reading.eco2_ppm *= rng.random_range(1.0 - GAS_NOISE..1.0 + GAS_NOISE);
    reading.heart_rate_bpm *= rng.random_range(1.0 - HEART_RATE_NOISE..1.0 + HEART_RATE_NOISE);
    reading.spo2_pct *= rng.random_range(1.0 - SPO2_NOISE..1.0 + SPO2_NOISE);
    let jitter: f64 = StandardNormal.sample(rng);
    reading.temperature_c += jitter * TEMPERATURE_NOISE_STD;

    clip_to_bounds(reading);
}

/// Clip every feature to its plausibility bound and apply its rounding
pub fn clip_to_bounds(reading: &mut Reading) {
    for feature in Feature::ALL {
        let value = reading.get_mut(feature);
        *value = bound(feature).clip_and_round(*value);
    }
}

/// Apply the heart-rate correlation rules to one reading.
///
/// Fever adds 10 bpm per degree above 37 °C (at most 30), then the heart
/// rate is re-clipped. Hypoxia then adds 2 bpm per point of SpO2 below 95 %
/// (at most 40), followed by a second re-clip.
pub fn apply_correlations(reading: &mut Reading) {
    let hr_bound = bound(Feature::HeartRate);

    let fever = ((reading.temperature_c - FEVER_ONSET_C) * FEVER_BPM_PER_DEGREE)
        .clamp(0.0, FEVER_MAX_BPM);
    reading.heart_rate_bpm = hr_bound.clip(reading.heart_rate_bpm + fever);

    let hypoxia =
        (HYPOXIA_ONSET_PCT - reading.spo2_pct).clamp(0.0, HYPOXIA_MAX_POINTS) * HYPOXIA_BPM_PER_POINT;
    reading.heart_rate_bpm = hr_bound.clip(reading.heart_rate_bpm + hypoxia);
}

/// Perturb `floor(len * fraction)` distinct readings.
///
/// Each selected reading gets one of VOC, eCO2 or heart rate multiplied by a
/// factor in `[1.3, 1.7)`. Values may leave the plausibility bounds. Returns
/// the number of perturbed readings.
pub fn inject_outliers<R: Rng + ?Sized>(readings: &mut [Reading], fraction: f64, rng: &mut R) -> usize {
    let count = ((readings.len() as f64) * fraction.clamp(0.0, 1.0)).floor() as usize;
    if count == 0 {
        return 0;
    }

    for idx in index::sample(rng, readings.len(), count).into_iter() {
        let Some(&feature) = OUTLIER_FEATURES.choose(rng) else {
            continue;
        };
        *readings[idx].get_mut(feature) *= rng.random_range(OUTLIER_FACTOR_MIN..OUTLIER_FACTOR_MAX);
    }
    count
}
