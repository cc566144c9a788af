//! Kolosal Attrition - Main Entry Point
//!
//! Employee attrition modelling and retention-risk segmentation from the
//! command line.

use clap::Parser;
use kolosal_attrition::cli::{cmd_models, cmd_profile, cmd_run, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_attrition=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            folds,
            models,
            test_size,
            k_neighbors,
            stratify,
            json,
            output,
        } => {
            cmd_run(
                &data,
                folds,
                models,
                test_size,
                k_neighbors,
                stratify,
                json,
                output.as_deref(),
            )?;
        }
        Commands::Profile { data, max_k, json } => {
            cmd_profile(&data, max_k, json)?;
        }
        Commands::Models => {
            cmd_models()?;
        }
    }

    Ok(())
}
