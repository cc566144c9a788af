//! Kolosal Attrition CLI Module
//!
//! Command-line interface for the attrition workflow, dataset profiling
//! and the model registry.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use crate::analysis::ProfileOptions;
use crate::config::PipelineConfig;
use crate::preprocessing::MissingValuePolicy;
use crate::reporting::{render_profile, render_registry, render_report};
use crate::training::ModelId;
use crate::workflow::AttritionWorkflow;

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-attrition")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Employee attrition modelling and retention-risk segmentation")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by `run` and `profile`
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Dataset CSV path or http(s) URL
    #[arg(short, long)]
    pub data: Option<String>,

    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Random seed for split, oversampling and estimators
    #[arg(long)]
    pub seed: Option<u64>,

    /// Drop rows with missing values instead of failing
    #[arg(long)]
    pub allow_missing: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full workflow: prepare, search every model, segment
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Number of stratified cross-validation folds
        #[arg(long)]
        folds: Option<usize>,

        /// Comma-separated model codes (LR, RF, GB)
        #[arg(short, long, value_delimiter = ',')]
        models: Option<Vec<ModelId>>,

        /// Fraction of rows held out
        #[arg(long)]
        test_size: Option<f64>,

        /// SMOTE neighbour count
        #[arg(long)]
        k_neighbors: Option<usize>,

        /// Preserve the class ratio in the train/test split
        #[arg(long)]
        stratify: bool,

        /// Print the JSON report instead of the rendered one
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Profile the dataset without training
    Profile {
        #[command(flatten)]
        data: DataArgs,

        /// Largest k of the k-means elbow curve
        #[arg(long, default_value = "10")]
        max_k: usize,

        /// Print the profile as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the model registry
    Models,
}

/// Merge a config file and command-line flags
pub fn build_config(args: &DataArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(data) = &args.data {
        config.data_source = data.clone();
    }
    if let Some(seed) = args.seed {
        config.random_state = seed;
    }
    if args.allow_missing {
        config.missing_values = MissingValuePolicy::DropRows;
    }
    Ok(config)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_run(
    data: &DataArgs,
    folds: Option<usize>,
    models: Option<Vec<ModelId>>,
    test_size: Option<f64>,
    k_neighbors: Option<usize>,
    stratify: bool,
    json: bool,
    output: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    let mut config = build_config(data)?;
    if let Some(folds) = folds {
        config = config.with_cv_folds(folds);
    }
    if let Some(models) = models {
        config = config.with_models(models);
    }
    if let Some(test_size) = test_size {
        config = config.with_test_size(test_size);
    }
    if let Some(k) = k_neighbors {
        config = config.with_smote_k_neighbors(k);
    }
    if stratify {
        config = config.with_stratified_split(true);
    }

    let workflow = AttritionWorkflow::new(config)?;
    let (_, report) = workflow.run()?;

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!("  {} report written to {}", "✓".green(), path.display());
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}

pub fn cmd_profile(data: &DataArgs, max_k: usize, json: bool) -> anyhow::Result<()> {
    let config = build_config(data)?;
    let options = ProfileOptions {
        elbow_max_k: max_k,
        random_state: config.random_state,
        ..Default::default()
    };
    let profile = AttritionWorkflow::new(config)?.profile(&options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        print!("{}", render_profile(&profile));
    }
    Ok(())
}

pub fn cmd_models() -> anyhow::Result<()> {
    print!("{}", render_registry());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "kolosal-attrition",
            "run",
            "--data",
            "hr.csv",
            "--models",
            "LR,gb",
            "--folds",
            "3",
            "--allow-missing",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                data, models, folds, ..
            } => {
                assert_eq!(
                    models,
                    Some(vec![ModelId::LogisticRegression, ModelId::GradientBoosting])
                );
                assert_eq!(folds, Some(3));
                let config = build_config(&data).unwrap();
                assert_eq!(config.data_source, "hr.csv");
                assert_eq!(config.missing_values, MissingValuePolicy::DropRows);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_rejects_unknown_model() {
        assert!(Cli::try_parse_from(["kolosal-attrition", "run", "--models", "svm"]).is_err());
    }
}
