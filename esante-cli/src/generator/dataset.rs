//! Dataset construction, CSV persistence and descriptive statistics

use super::noise;
use super::profile::{PhysiologicalProfile, ProfileRegistry};
use super::{GeneratorError, GeneratorResult};
use crate::models::{Feature, HealthStatus, Reading, Sample, NUM_CLASSES, NUM_FEATURES};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Column order of dataset files
pub const CSV_HEADER: [&str; 7] = [
    "cov_ppb",
    "eco2_ppm",
    "heart_rate",
    "spo2",
    "temperature",
    "status",
    "status_name",
];

/// Generator settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    /// Seed for the generator's random source, applied once at construction
    pub seed: u64,
    /// Fraction of samples perturbed when outlier injection is on
    pub outlier_fraction: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            outlier_fraction: 0.05,
        }
    }
}

/// Seeded synthetic data generator
pub struct DatasetGenerator {
    registry: ProfileRegistry,
    config: GeneratorConfig,
    rng: ChaCha8Rng,
}

impl DatasetGenerator {
    /// Create a generator over the built-in profiles
    pub fn new(config: GeneratorConfig) -> Self {
        Self::with_registry(ProfileRegistry::default(), config)
    }

    pub fn with_registry(registry: ProfileRegistry, config: GeneratorConfig) -> Self {
        Self {
            registry,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    /// Draw one sample for the named profile.
    ///
    /// Each feature comes from a Normal centered on the profile's range
    /// midpoint, clipped to the range. No noise or correlation is applied.
    pub fn generate_sample(&mut self, profile_name: &str) -> GeneratorResult<Sample> {
        let profile = self.registry.get(profile_name)?.clone();
        self.sample_profile(&profile)
    }

    fn sample_profile(&mut self, profile: &PhysiologicalProfile) -> GeneratorResult<Sample> {
        let mut reading = Reading::default();
        for feature in Feature::ALL {
            let range = profile.range(feature);
            let normal = Normal::new(range.midpoint(), range.std).map_err(|e| {
                GeneratorError::InvalidDistribution {
                    profile: profile.name().to_string(),
                    feature: feature.column().to_string(),
                    message: e.to_string(),
                }
            })?;
            *reading.get_mut(feature) = range.clip(normal.sample(&mut self.rng));
        }
        Ok(Sample::new(reading, profile.status))
    }

    /// Build a complete shuffled dataset.
    ///
    /// Each profile contributes `floor(sample_count * prior)` samples, so the
    /// total can fall slightly short of `sample_count`.
    pub fn generate_dataset(
        &mut self,
        sample_count: usize,
        inject_outliers: bool,
    ) -> GeneratorResult<Dataset> {
        let profiles: Vec<PhysiologicalProfile> = self.registry.iter().cloned().collect();

        let class_sizes: Vec<usize> = profiles
            .iter()
            .map(|p| (sample_count as f64 * p.class_prior).floor() as usize)
            .collect();
        let too_large = || GeneratorError::TooManySamples(sample_count);
        let total = class_sizes
            .iter()
            .try_fold(0usize, |acc, &n| acc.checked_add(n))
            .ok_or_else(too_large)?;

        let mut readings = Vec::new();
        let mut labels = Vec::new();
        readings.try_reserve_exact(total).map_err(|_| too_large())?;
        labels.try_reserve_exact(total).map_err(|_| too_large())?;
        for (profile, &n_class) in profiles.iter().zip(&class_sizes) {
            debug!("Sampling {} readings for profile {}", n_class, profile.name());
            for _ in 0..n_class {
                let sample = self.sample_profile(profile)?;
                readings.push(sample.reading);
                labels.push(sample.status);
            }
        }

        for reading in readings.iter_mut() {
            noise::apply_sensor_noise(reading, &mut self.rng);
        }
        for reading in readings.iter_mut() {
            noise::apply_correlations(reading);
        }

        let outliers = if inject_outliers {
            noise::inject_outliers(&mut readings, self.config.outlier_fraction, &mut self.rng)
        } else {
            0
        };

        let mut samples: Vec<Sample> = readings
            .into_iter()
            .zip(labels)
            .map(|(reading, status)| Sample::new(reading, status))
            .collect();
        samples.shuffle(&mut self.rng);

        info!(
            "Generated {} samples ({} outliers, seed {})",
            samples.len(),
            outliers,
            self.config.seed
        );
        Ok(Dataset::new(samples))
    }
}

/// One CSV row
#[derive(Debug, Serialize, Deserialize)]
struct SampleRow {
    cov_ppb: f64,
    eco2_ppm: f64,
    heart_rate: f64,
    spo2: f64,
    temperature: f64,
    status: i64,
    status_name: String,
}

impl From<&Sample> for SampleRow {
    fn from(sample: &Sample) -> Self {
        let r = &sample.reading;
        Self {
            cov_ppb: r.voc_ppb,
            eco2_ppm: r.eco2_ppm,
            heart_rate: r.heart_rate_bpm,
            spo2: r.spo2_pct,
            temperature: r.temperature_c,
            status: sample.status.index() as i64,
            status_name: sample.status.name().to_string(),
        }
    }
}

impl SampleRow {
    fn into_sample(self, line: u64) -> GeneratorResult<Sample> {
        let invalid = |message: String| GeneratorError::InvalidRecord { line, message };

        let status = usize::try_from(self.status)
            .ok()
            .and_then(HealthStatus::from_index)
            .ok_or_else(|| invalid(format!("unknown status {}", self.status)))?;
        if status.name() != self.status_name {
            return Err(invalid(format!(
                "status {} is '{}', not '{}'",
                self.status,
                status.name(),
                self.status_name
            )));
        }

        let reading = Reading::new(
            self.cov_ppb,
            self.eco2_ppm,
            self.heart_rate,
            self.spo2,
            self.temperature,
        );
        if let Some(feature) = reading.first_non_finite() {
            return Err(invalid(format!("{} is not a finite number", feature)));
        }
        Ok(Sample::new(reading, status))
    }
}

/// Ordered collection of labeled samples
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Feature matrix in row order
    pub fn features(&self) -> Vec<[f64; NUM_FEATURES]> {
        self.samples.iter().map(|s| s.reading.to_array()).collect()
    }

    /// Integer class labels in row order
    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.status.index()).collect()
    }

    pub fn class_counts(&self) -> [usize; NUM_CLASSES] {
        let mut counts = [0; NUM_CLASSES];
        for sample in &self.samples {
            counts[sample.status.index()] += 1;
        }
        counts
    }

    /// SHA-256 over the feature bits and labels, as lowercase hex
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for sample in &self.samples {
            for value in sample.reading.to_array() {
                hasher.update(value.to_bits().to_le_bytes());
            }
            hasher.update([sample.status.index() as u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary::from_dataset(self)
    }

    /// Write the dataset as CSV with a header row
    pub fn write_csv(&self, path: impl AsRef<Path>) -> GeneratorResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        if self.samples.is_empty() {
            writer.write_record(CSV_HEADER)?;
        }
        for sample in &self.samples {
            writer.serialize(SampleRow::from(sample))?;
        }
        writer.flush()?;

        debug!("Wrote {} rows to {}", self.samples.len(), path.display());
        Ok(())
    }

    /// Read a dataset written by [`Dataset::write_csv`].
    ///
    /// The header must match exactly, every status must be a known class
    /// agreeing with its name, and every feature must be finite.
    pub fn load_csv(path: impl AsRef<Path>) -> GeneratorResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;

        let headers = reader.headers()?.clone();
        if headers.iter().ne(CSV_HEADER.iter().copied()) {
            return Err(GeneratorError::InvalidRecord {
                line: 1,
                message: format!(
                    "expected header '{}', found '{}'",
                    CSV_HEADER.join(","),
                    headers.iter().collect::<Vec<_>>().join(",")
                ),
            });
        }

        let mut samples = Vec::new();
        for (i, row) in reader.deserialize::<SampleRow>().enumerate() {
            let line = i as u64 + 2;
            let row = row.map_err(|e| GeneratorError::InvalidRecord {
                line,
                message: e.to_string(),
            })?;
            samples.push(row.into_sample(line)?);
        }

        info!("Loaded {} samples from {}", samples.len(), path.display());
        Ok(Self::new(samples))
    }
}

/// Count, mean, std and quartiles of one feature
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FeatureStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator)
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl FeatureStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        } else {
            0.0
        };

        Self {
            count: n,
            mean,
            std,
            min: sorted[0],
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted[n - 1],
        }
    }
}

/// Linear-interpolated quantile of sorted, non-empty values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Class distribution and per-feature statistics of a dataset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub total: usize,
    pub class_counts: [usize; NUM_CLASSES],
    pub features: [FeatureStats; NUM_FEATURES],
}

impl DatasetSummary {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut features = [FeatureStats::default(); NUM_FEATURES];
        for feature in Feature::ALL {
            let values: Vec<f64> = dataset
                .samples()
                .iter()
                .map(|s| s.reading.get(feature))
                .collect();
            features[feature.index()] = FeatureStats::from_values(&values);
        }
        Self {
            total: dataset.len(),
            class_counts: dataset.class_counts(),
            features,
        }
    }

    /// Share of the dataset in one class, as a percentage
    pub fn class_percentage(&self, status: HealthStatus) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.class_counts[status.index()] as f64 * 100.0 / self.total as f64
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Samples: {}", self.total)?;
        writeln!(f)?;
        writeln!(f, "Class distribution:")?;
        for status in HealthStatus::ALL {
            writeln!(
                f,
                "  {:<20} {:>6}  ({:>5.1}%)",
                status.name(),
                self.class_counts[status.index()],
                self.class_percentage(status)
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "  {:<12} {:>7} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "feature", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        for feature in Feature::ALL {
            let s = &self.features[feature.index()];
            writeln!(
                f,
                "  {:<12} {:>7} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
                feature.column(),
                s.count,
                s.mean,
                s.std,
                s.min,
                s.q25,
                s.median,
                s.q75,
                s.max
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::noise::bound;
    use tempfile::TempDir;

    fn generator(seed: u64) -> DatasetGenerator {
        DatasetGenerator::new(GeneratorConfig {
            seed,
            ..Default::default()
        })
    }

    #[test]
    fn test_generate_sample_within_profile_range() {
        let mut g = generator(42);
        let registry = ProfileRegistry::default();
        for profile in registry.iter() {
            for _ in 0..200 {
                let sample = g.generate_sample(profile.name()).unwrap();
                assert_eq!(sample.status, profile.status);
                for feature in Feature::ALL {
                    let value = sample.reading.get(feature);
                    assert!(
                        profile.range(feature).contains(value),
                        "{} {} = {}",
                        profile.name(),
                        feature,
                        value
                    );
                }
            }
        }
    }

    #[test]
    fn test_generate_sample_unknown_profile() {
        let mut g = generator(42);
        let err = g.generate_sample("sain").unwrap_err();
        assert!(matches!(err, GeneratorError::UnknownProfile(_)));
    }

    #[test]
    fn test_class_counts_follow_priors() {
        let dataset = generator(42).generate_dataset(2000, false).unwrap();
        assert_eq!(dataset.len(), 2000);
        assert_eq!(dataset.class_counts(), [1000, 500, 300, 200]);
    }

    #[test]
    fn test_counts_truncate() {
        let dataset = generator(1).generate_dataset(15, false).unwrap();
        // floor(7.5) + floor(3.75) + floor(2.25) + floor(1.5)
        assert_eq!(dataset.class_counts(), [7, 3, 2, 1]);
        assert_eq!(dataset.len(), 13);
    }

    #[test]
    fn test_oversized_request_is_an_error() {
        let err = generator(1).generate_dataset(usize::MAX, false).unwrap_err();
        assert!(matches!(err, GeneratorError::TooManySamples(n) if n == usize::MAX));

        let err = generator(1)
            .generate_dataset(usize::MAX / 2, false)
            .unwrap_err();
        assert!(matches!(err, GeneratorError::TooManySamples(_)));
    }

    #[test]
    fn test_without_outliers_values_in_bounds() {
        let dataset = generator(3).generate_dataset(2000, false).unwrap();
        for sample in dataset.samples() {
            for feature in Feature::ALL {
                let b = bound(feature);
                let v = sample.reading.get(feature);
                assert!(v >= b.min && v <= b.max, "{feature} = {v}");
            }
        }
    }

    #[test]
    fn test_outliers_may_leave_bounds() {
        let clean = generator(5).generate_dataset(2000, false).unwrap();
        let noisy = generator(5).generate_dataset(2000, true).unwrap();
        assert_eq!(clean.len(), noisy.len());

        let out_of_bounds = noisy
            .samples()
            .iter()
            .filter(|s| {
                Feature::ALL.iter().any(|f| {
                    let b = bound(*f);
                    let v = s.reading.get(*f);
                    v < b.min || v > b.max
                })
            })
            .count();
        assert!(out_of_bounds > 0);
        assert!(out_of_bounds <= 100);
    }

    #[test]
    fn test_dataset_is_shuffled() {
        let dataset = generator(42).generate_dataset(400, false).unwrap();
        let head: Vec<HealthStatus> = dataset.samples()[..200].iter().map(|s| s.status).collect();
        assert!(head.iter().any(|s| *s != HealthStatus::Healthy));
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let a = generator(11).generate_dataset(500, true).unwrap();
        let b = generator(11).generate_dataset(500, true).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());

        let c = generator(12).generate_dataset(500, true).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("health.csv");
        let dataset = generator(42).generate_dataset(200, true).unwrap();

        dataset.write_csv(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("cov_ppb,eco2_ppm,heart_rate,spo2,temperature,status,status_name"));

        let loaded = Dataset::load_csv(&path).unwrap();
        assert_eq!(loaded, dataset);
    }

    #[test]
    fn test_load_rejects_bad_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a,b,c\n1,2,3\n").unwrap();
        let err = Dataset::load_csv(&path).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidRecord { line: 1, .. }));
    }

    #[test]
    fn test_load_rejects_mismatched_status_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "cov_ppb,eco2_ppm,heart_rate,spo2,temperature,status,status_name\n\
             400,420,75,98,36.8,0,healthy\n\
             400,420,75,98,36.8,3,healthy\n",
        )
        .unwrap();
        let err = Dataset::load_csv(&path).unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidRecord { line: 3, .. }));
    }

    #[test]
    fn test_load_rejects_unknown_status() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "cov_ppb,eco2_ppm,heart_rate,spo2,temperature,status,status_name\n\
             400,420,75,98,36.8,7,critical\n",
        )
        .unwrap();
        assert!(Dataset::load_csv(&path).is_err());
    }

    #[test]
    fn test_feature_stats() {
        let stats = FeatureStats::from_values(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.q25, 1.75);
        assert_eq!(stats.q75, 3.25);
        assert!((stats.std - 1.2909944487358056).abs() < 1e-12);
    }

    #[test]
    fn test_summary_display() {
        let dataset = generator(42).generate_dataset(100, false).unwrap();
        let summary = dataset.summary();
        assert_eq!(summary.total, 100);
        assert_eq!(summary.class_percentage(HealthStatus::Healthy), 50.0);

        let text = summary.to_string();
        assert!(text.contains("severe-hypoxia"));
        assert!(text.contains("heart_rate"));
    }
}
