//! User-level configuration for esante
//!
//! Supports loading config from:
//! - Environment variables
//! - ~/.config/esante/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_SAMPLES: usize = 2000;
pub const DEFAULT_OUTLIER_FRACTION: f64 = 0.05;
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_TREES: usize = 100;

/// Overrides the model directory
pub const ENV_MODEL_DIR: &str = "ESANTE_MODEL_DIR";
/// Overrides both the generator and the training seed
pub const ENV_SEED: &str = "ESANTE_SEED";

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserConfig {
    #[serde(default)]
    pub generator: GeneratorSection,

    #[serde(default)]
    pub model: ModelSection,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct GeneratorSection {
    /// Random seed for dataset generation
    pub seed: Option<u64>,

    /// Number of samples to generate
    pub samples: Option<usize>,

    /// Share of samples turned into outliers
    pub outlier_fraction: Option<f64>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelSection {
    /// Directory holding health_scaler.bin and health_model.bin
    pub dir: Option<PathBuf>,

    /// Random seed for the split and the forest
    pub seed: Option<u64>,

    /// Held-out share of each class
    pub test_fraction: Option<f64>,

    /// Number of trees in the forest
    pub trees: Option<usize>,
}

impl UserConfig {
    /// Load config from all sources, with priority:
    /// 1. Environment variables (highest)
    /// 2. User config (~/.config/esante/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Self::user_config_path().as_deref());
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults when it is absent or invalid
    pub fn load_from(path: Option<&Path>) -> Self {
        let mut config = UserConfig::default();

        let Some(path) = path.filter(|p| p.exists()) else {
            return config;
        };
        let parsed = std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|content| toml::from_str::<UserConfig>(&content).map_err(Into::into));
        match parsed {
            Ok(file_config) => config.merge(file_config),
            Err(e) => warn!("Ignoring invalid config {}: {}", path.display(), e),
        }
        config
    }

    /// Apply environment overrides read through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = var(ENV_MODEL_DIR).filter(|v| !v.is_empty()) {
            self.model.dir = Some(PathBuf::from(dir));
        }
        if let Some(seed) = var(ENV_SEED).filter(|v| !v.is_empty()) {
            let seed: u64 = seed
                .trim()
                .parse()
                .with_context(|| format!("{ENV_SEED} must be an unsigned integer, got '{seed}'"))?;
            self.generator.seed = Some(seed);
            self.model.seed = Some(seed);
        }
        Ok(())
    }

    /// Get the user config directory path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("esante").join("config.toml"))
    }

    /// Default location of trained artifacts
    pub fn default_model_dir() -> PathBuf {
        dirs::data_dir()
            .map(|p| p.join("esante").join("models"))
            .unwrap_or_else(|| PathBuf::from(".esante").join("models"))
    }

    /// Merge another config into this one (other takes priority)
    fn merge(&mut self, other: UserConfig) {
        let UserConfig { generator, model } = other;
        if generator.seed.is_some() {
            self.generator.seed = generator.seed;
        }
        if generator.samples.is_some() {
            self.generator.samples = generator.samples;
        }
        if generator.outlier_fraction.is_some() {
            self.generator.outlier_fraction = generator.outlier_fraction;
        }
        if model.dir.is_some() {
            self.model.dir = model.dir;
        }
        if model.seed.is_some() {
            self.model.seed = model.seed;
        }
        if model.test_fraction.is_some() {
            self.model.test_fraction = model.test_fraction;
        }
        if model.trees.is_some() {
            self.model.trees = model.trees;
        }
    }

    pub fn generator_seed(&self) -> u64 {
        self.generator.seed.unwrap_or(DEFAULT_SEED)
    }

    pub fn samples(&self) -> usize {
        self.generator.samples.unwrap_or(DEFAULT_SAMPLES)
    }

    pub fn outlier_fraction(&self) -> f64 {
        self.generator
            .outlier_fraction
            .unwrap_or(DEFAULT_OUTLIER_FRACTION)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.model.dir.clone().unwrap_or_else(Self::default_model_dir)
    }

    pub fn model_seed(&self) -> u64 {
        self.model.seed.unwrap_or(DEFAULT_SEED)
    }

    pub fn test_fraction(&self) -> f64 {
        self.model.test_fraction.unwrap_or(DEFAULT_TEST_FRACTION)
    }

    pub fn trees(&self) -> usize {
        self.model.trees.unwrap_or(DEFAULT_TREES)
    }

    /// Initialize user config directory and create example config
    pub fn init_user_config() -> Result<PathBuf> {
        let config_path = Self::user_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Self::write_example(&config_path)?;
        Ok(config_path)
    }

    /// Write the commented example config unless a file already exists
    pub fn write_example(config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if !config_path.exists() {
            let example = r#"# esante User Configuration

[generator]
# seed = 42
# samples = 2000
# outlier_fraction = 0.05

[model]
# Where health_scaler.bin and health_model.bin live
# (also settable with ESANTE_MODEL_DIR)
# dir = "/var/lib/esante/models"
# seed = 42
# test_fraction = 0.2
# trees = 100
"#;
            std::fs::write(config_path, example)?;
        }
        Ok(())
    }

    /// Set one `section.key` value in a config file, keeping other entries
    pub fn set_value(config_path: &Path, key: &str, value: &str) -> Result<()> {
        let (section, field) = key
            .split_once('.')
            .ok_or_else(|| anyhow::anyhow!("Config key must look like 'section.key', got '{key}'"))?;

        let parsed_value = match (section, field) {
            ("generator", "seed") | ("model", "seed") => {
                toml::Value::Integer(value.parse::<u64>().context("seed must be an unsigned integer")? as i64)
            }
            ("generator", "samples") | ("model", "trees") => toml::Value::Integer(
                value.parse::<usize>().context("expected an unsigned integer")? as i64,
            ),
            ("generator", "outlier_fraction") | ("model", "test_fraction") => {
                toml::Value::Float(value.parse::<f64>().context("expected a number")?)
            }
            ("model", "dir") => toml::Value::String(value.to_string()),
            _ => anyhow::bail!("Unknown config key '{key}'"),
        };

        let mut table: toml::Table = if config_path.exists() {
            toml::from_str(&std::fs::read_to_string(config_path)?)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            toml::Table::new()
        };

        let section_table = table
            .entry(section)
            .or_insert(toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("'{section}' in config is not a table"))?;
        section_table.insert(field.to_string(), parsed_value);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(config_path, toml::to_string_pretty(&table)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = UserConfig::default();
        assert_eq!(config.generator_seed(), 42);
        assert_eq!(config.samples(), 2000);
        assert_eq!(config.outlier_fraction(), 0.05);
        assert_eq!(config.model_seed(), 42);
        assert_eq!(config.test_fraction(), 0.2);
        assert_eq!(config.trees(), 100);
        assert!(config.model_dir().ends_with("models"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = UserConfig::load_from(Some(&dir.path().join("nope.toml")));
        assert_eq!(config, UserConfig::default());
        assert_eq!(UserConfig::load_from(None), UserConfig::default());
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
[generator]
seed = 7
samples = 500

[model]
dir = "/tmp/esante-models"
trees = 50
"#;
        let config: UserConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.generator_seed(), 7);
        assert_eq!(config.samples(), 500);
        assert_eq!(config.outlier_fraction(), 0.05);
        assert_eq!(config.model_dir(), PathBuf::from("/tmp/esante-models"));
        assert_eq!(config.trees(), 50);
        assert_eq!(config.model_seed(), 42);
    }

    #[test]
    fn test_toml_parsing_minimal() {
        let config: UserConfig = toml::from_str("").unwrap();
        assert_eq!(config, UserConfig::default());
    }

    #[test]
    fn test_invalid_toml_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is [[ not valid toml {{{}}}").unwrap();
        assert_eq!(UserConfig::load_from(Some(&path)), UserConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[model]\ndir = \"/from/file\"\nseed = 3\n").unwrap();

        let mut config = UserConfig::load_from(Some(&path));
        assert_eq!(config.model_seed(), 3);

        config
            .apply_env(env(&[(ENV_MODEL_DIR, "/from/env"), (ENV_SEED, "99")]))
            .unwrap();
        assert_eq!(config.model_dir(), PathBuf::from("/from/env"));
        assert_eq!(config.model_seed(), 99);
        assert_eq!(config.generator_seed(), 99);
    }

    #[test]
    fn test_invalid_env_seed_is_an_error() {
        let mut config = UserConfig::default();
        assert!(config.apply_env(env(&[(ENV_SEED, "forty-two")])).is_err());
    }

    #[test]
    fn test_merge_preserves_base_when_other_is_none() {
        let mut base = UserConfig::default();
        base.model.trees = Some(10);
        base.merge(UserConfig::default());
        assert_eq!(base.trees(), 10);
    }

    #[test]
    fn test_write_example_is_valid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("esante").join("config.toml");
        UserConfig::write_example(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let config: UserConfig = toml::from_str(&content).unwrap();
        assert_eq!(config, UserConfig::default());
    }

    #[test]
    fn test_set_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        UserConfig::write_example(&path).unwrap();

        UserConfig::set_value(&path, "model.trees", "25").unwrap();
        UserConfig::set_value(&path, "generator.outlier_fraction", "0.1").unwrap();
        UserConfig::set_value(&path, "model.dir", "/srv/models").unwrap();

        let config = UserConfig::load_from(Some(&path));
        assert_eq!(config.trees(), 25);
        assert_eq!(config.outlier_fraction(), 0.1);
        assert_eq!(config.model_dir(), PathBuf::from("/srv/models"));

        assert!(UserConfig::set_value(&path, "model.depth", "3").is_err());
        assert!(UserConfig::set_value(&path, "trees", "3").is_err());
        assert!(UserConfig::set_value(&path, "model.trees", "many").is_err());
    }

    #[test]
    fn test_user_config_path_returns_some() {
        if let Some(p) = UserConfig::user_config_path() {
            assert!(p.ends_with("esante/config.toml"));
        }
    }
}
