//! esante - physiological health-status classification
//!
//! Generates labeled synthetic sensor datasets from four clinical profiles
//! and classifies readings (VOC, eCO2, heart rate, SpO2, temperature) into
//! a health state with a random forest behind a standard scaler.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod generator;
pub mod models;
