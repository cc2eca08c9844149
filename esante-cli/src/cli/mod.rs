//! CLI command definitions and handlers

mod generate;
mod predict;
mod profiles;
mod train;

use crate::config::UserConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;

/// Parse a fraction strictly between 0 and 1
fn parse_fraction(s: &str) -> Result<f64, String> {
    let v: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if v > 0.0 && v < 1.0 {
        Ok(v)
    } else {
        Err("must be between 0 and 1 (exclusive)".to_string())
    }
}

/// Parse a count of at least 1
fn parse_positive(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("must be at least 1".to_string())
    } else {
        Ok(n)
    }
}

/// esante - physiological health-status classification
#[derive(Parser, Debug)]
#[command(name = "esante")]
#[command(
    version,
    about = "Generate synthetic physiological datasets and classify sensor readings into health states",
    after_help = "\
Examples:
  esante generate -o health_dataset.csv          Generate 2000 labeled samples
  esante train --data health_dataset.csv         Train and persist the classifier
  esante predict 400 420 75 98 36.8              Classify one reading
  esante predict 1000 650 125 82 39.2 --json     JSON output for the ingestion endpoint
  esante profiles                                List the clinical profiles"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a labeled synthetic dataset from the clinical profiles
    Generate {
        /// Number of samples (each profile contributes floor(samples * prior))
        #[arg(long, short = 'n', value_parser = parse_positive)]
        samples: Option<usize>,

        /// Output CSV path
        #[arg(long, short = 'o', default_value = "health_dataset.csv")]
        output: PathBuf,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Skip outlier injection
        #[arg(long)]
        no_outliers: bool,

        /// Share of samples turned into outliers
        #[arg(long, value_parser = parse_fraction)]
        outlier_fraction: Option<f64>,
    },

    /// Train the classifier on a generated dataset and save the artifacts
    Train {
        /// Dataset CSV produced by `esante generate`
        #[arg(long, short = 'd', default_value = "health_dataset.csv")]
        data: PathBuf,

        /// Held-out share of each class
        #[arg(long, value_parser = parse_fraction)]
        test_fraction: Option<f64>,

        /// Random seed for the split and the forest
        #[arg(long)]
        seed: Option<u64>,

        /// Number of trees
        #[arg(long, value_parser = parse_positive)]
        trees: Option<usize>,

        /// Directory for health_scaler.bin and health_model.bin
        #[arg(long, env = "ESANTE_MODEL_DIR")]
        model_dir: Option<PathBuf>,

        /// Skip the reference-reading predictions after training
        #[arg(long)]
        no_demo: bool,
    },

    /// Classify one sensor reading
    #[command(allow_negative_numbers = true)]
    Predict {
        /// VOC concentration (ppb)
        voc: f64,
        /// Estimated CO2 (ppm)
        eco2: f64,
        /// Heart rate (bpm)
        heart_rate: f64,
        /// Blood-oxygen saturation (%)
        spo2: f64,
        /// Body temperature (°C)
        temperature: f64,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Directory holding the trained artifacts
        #[arg(long, env = "ESANTE_MODEL_DIR")]
        model_dir: Option<PathBuf>,
    },

    /// List the clinical profiles used for generation
    Profiles,

    /// Manage configuration (init, show, or set config values)
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Initialize config file with example settings
    Init,
    /// Show current config and paths
    Show,
    /// Set a config value
    Set {
        /// Config key (e.g., model.trees)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate {
            samples,
            output,
            seed,
            no_outliers,
            outlier_fraction,
        } => {
            let config = UserConfig::load()?;
            generate::run(generate::GenerateArgs {
                samples: samples.unwrap_or_else(|| config.samples()),
                output,
                seed: seed.unwrap_or_else(|| config.generator_seed()),
                inject_outliers: !no_outliers,
                outlier_fraction: outlier_fraction.unwrap_or_else(|| config.outlier_fraction()),
            })
        }

        Commands::Train {
            data,
            test_fraction,
            seed,
            trees,
            model_dir,
            no_demo,
        } => {
            let config = UserConfig::load()?;
            train::run(train::TrainArgs {
                data,
                test_fraction: test_fraction.unwrap_or_else(|| config.test_fraction()),
                seed: seed.unwrap_or_else(|| config.model_seed()),
                trees: trees.unwrap_or_else(|| config.trees()),
                model_dir: model_dir.unwrap_or_else(|| config.model_dir()),
                demo: !no_demo,
            })
        }

        Commands::Predict {
            voc,
            eco2,
            heart_rate,
            spo2,
            temperature,
            json,
            model_dir,
        } => {
            let model_dir = match model_dir {
                Some(dir) => dir,
                None => UserConfig::load()?.model_dir(),
            };
            predict::run(
                crate::models::Reading::new(voc, eco2, heart_rate, spo2, temperature),
                json,
                &model_dir,
            )
        }

        Commands::Profiles => profiles::run(),

        Commands::Config { action } => run_config_action(action),

        Commands::Version => {
            println!("esante {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_config_action(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = UserConfig::init_user_config()?;
            println!("✅ Config initialized at: {}", path.display());
            println!("\nOr set the model directory via environment:");
            println!("  export {}=/path/to/models", crate::config::ENV_MODEL_DIR);
            Ok(())
        }
        ConfigAction::Show => show_config(),
        ConfigAction::Set { key, value } => {
            let path = UserConfig::user_config_path()
                .ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
            UserConfig::set_value(&path, &key, &value)?;
            println!("✅ Set {} in {}", key, path.display());
            Ok(())
        }
    }
}

fn show_config() -> Result<()> {
    let config = UserConfig::load()?;
    println!("{}", style("Config paths:").bold());
    if let Some(user_path) = UserConfig::user_config_path() {
        let status = if user_path.exists() { "✓" } else { "(not found)" };
        println!("  User:  {} {}", user_path.display(), status);
    }
    let model_dir = config.model_dir();
    let paths = crate::classifier::ArtifactPaths::in_dir(&model_dir);
    let status = if paths.exist() { "✓ trained" } else { "(no model)" };
    println!("  Model: {} {}", model_dir.display(), status);
    println!();

    println!("{}", style("Generator:").bold());
    println!("  seed:             {}", config.generator_seed());
    println!("  samples:          {}", config.samples());
    println!("  outlier_fraction: {}", config.outlier_fraction());
    println!();
    println!("{}", style("Model:").bold());
    println!("  seed:             {}", config.model_seed());
    println!("  test_fraction:    {}", config.test_fraction());
    println!("  trees:            {}", config.trees());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_predict_with_negative_values() {
        let cli = Cli::try_parse_from(["esante", "predict", "400", "420", "75", "98", "-1.5"]).unwrap();
        match cli.command {
            Commands::Predict { temperature, json, .. } => {
                assert_eq!(temperature, -1.5);
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_predict_rejects_non_numeric() {
        assert!(Cli::try_parse_from(["esante", "predict", "400", "abc", "75", "98", "36.8"]).is_err());
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_fraction("0.25"), Ok(0.25));
        assert!(parse_fraction("0").is_err());
        assert!(parse_fraction("1.0").is_err());
        assert!(parse_fraction("x").is_err());
    }

    #[test]
    fn test_parse_positive() {
        assert_eq!(parse_positive("3"), Ok(3));
        assert!(parse_positive("0").is_err());
        assert!(parse_positive("-2").is_err());
    }

    #[test]
    fn test_log_level_is_global() {
        let cli = Cli::try_parse_from(["esante", "profiles", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level, "debug");
    }
}
