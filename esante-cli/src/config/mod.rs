//! Configuration module for esante
//!
//! This module handles:
//! - User-level configuration (~/.config/esante/config.toml)
//! - Environment overrides (ESANTE_MODEL_DIR, ESANTE_SEED)
//! - Defaults for generation and training

mod user_config;

pub use user_config::{
    GeneratorSection, ModelSection, UserConfig, DEFAULT_OUTLIER_FRACTION, DEFAULT_SAMPLES,
    DEFAULT_SEED, DEFAULT_TEST_FRACTION, DEFAULT_TREES, ENV_MODEL_DIR, ENV_SEED,
};
