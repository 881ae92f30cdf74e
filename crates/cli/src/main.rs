//! usagectl - charging-station usage classifier CLI
//!
//! Trains and inspects the usage-tier pipeline, and queries a running
//! prediction server.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, predict, stats, status, train, TrainingOverrides};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use usage_lib::StationFeatures;

/// Charging-station usage classifier CLI
#[derive(Parser)]
#[command(name = "usagectl")]
#[command(author, version, about = "CLI for the charging-station usage classifier", long_about = None)]
pub struct Cli {
    /// Prediction server URL (can also be set via USAGE_API_URL env var)
    #[arg(long, env = "USAGE_API_URL", default_value = "http://localhost:5001")]
    pub api_url: String,

    /// Station database URL, used by train and stats
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train candidate models and persist the best pipeline
    Train {
        /// Artifact path (defaults to USAGE_MODEL_PATH or model.json)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Trailing window in days
        #[arg(long)]
        window_days: Option<u32>,

        /// Share of stations held out for evaluation
        #[arg(long)]
        test_fraction: Option<f64>,

        /// Seed for the split and the random forest
        #[arg(long)]
        seed: Option<u64>,

        /// Evaluate candidates without writing the artifact
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the labeled per-station table without training
    Stats {
        /// Trailing window in days
        #[arg(long)]
        window_days: Option<u32>,
    },

    /// Show metadata of a persisted pipeline
    Inspect {
        /// Artifact path (same default as `train --output`)
        #[arg(env = "USAGE_MODEL_PATH", default_value = "model.json")]
        path: PathBuf,
    },

    /// Classify one station through the prediction server
    Predict {
        /// Rated power in kW
        #[arg(long)]
        power_kw: f64,

        /// Neighborhood code
        #[arg(long)]
        nil: String,

        /// Average sessions per day
        #[arg(long)]
        daily_sessions: f64,

        /// Average session duration in minutes
        #[arg(long)]
        duration_min: f64,

        /// Average energy per session in kWh
        #[arg(long)]
        energy_kwh: f64,
    },

    /// Show prediction server readiness and health
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Train {
            output,
            window_days,
            test_fraction,
            seed,
            dry_run,
        } => {
            let overrides = TrainingOverrides {
                database_url: cli.database_url,
                output,
                window_days,
                test_fraction,
                seed,
            };
            train::run_train(&overrides, dry_run, cli.format).await?;
        }
        Commands::Stats { window_days } => {
            let overrides = TrainingOverrides {
                database_url: cli.database_url,
                window_days,
                ..TrainingOverrides::default()
            };
            stats::show_stats(&overrides, cli.format).await?;
        }
        Commands::Inspect { path } => {
            inspect::inspect_artifact(&path, cli.format)?;
        }
        Commands::Predict {
            power_kw,
            nil,
            daily_sessions,
            duration_min,
            energy_kwh,
        } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            let features = StationFeatures {
                power_kw,
                neighborhood: nil,
                avg_daily_sessions: daily_sessions,
                avg_duration_min: duration_min,
                avg_energy_kwh: energy_kwh,
            };
            predict::predict(&client, features, cli.format).await?;
        }
        Commands::Status => {
            let client = client::ApiClient::new(&cli.api_url)?;
            status::show_status(&client, cli.format).await?;
        }
    }

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
    fn test_parse_train_flags() {
        let cli = Cli::try_parse_from([
            "usagectl",
            "--database-url",
            "mysql://localhost/colonnine",
            "train",
            "--window-days",
            "30",
            "--seed",
            "7",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.database_url.as_deref(), Some("mysql://localhost/colonnine"));
        match cli.command {
            Commands::Train {
                window_days,
                seed,
                dry_run,
                output,
                ..
            } => {
                assert_eq!(window_days, Some(30));
                assert_eq!(seed, Some(7));
                assert!(dry_run);
                assert!(output.is_none());
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_inspect_reads_model_path_from_env() {
        let cmd = Cli::command();
        let inspect = cmd.find_subcommand("inspect").unwrap();
        let path = inspect
            .get_arguments()
            .find(|a| a.get_id() == "path")
            .unwrap();
        assert_eq!(path.get_env(), Some(std::ffi::OsStr::new("USAGE_MODEL_PATH")));
    }

    #[test]
    fn test_inspect_path_argument_wins() {
        let cli = Cli::try_parse_from(["usagectl", "inspect", "out/model.json"]).unwrap();
        match cli.command {
            Commands::Inspect { path } => assert_eq!(path, PathBuf::from("out/model.json")),
            _ => panic!("expected inspect"),
        }
    }

    #[test]
    fn test_predict_requires_every_feature() {
        let result = Cli::try_parse_from([
            "usagectl",
            "predict",
            "--power-kw",
            "50",
            "--daily-sessions",
            "0.05",
            "--duration-min",
            "30",
            "--energy-kwh",
            "20",
        ]);
        assert!(result.is_err());
    }
}
