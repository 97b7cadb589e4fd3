mod cli;

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use alarmlog_compute::{
    AnomalyEngine, AnomalyRequest, Figure, ForecastEngine, ForecastRequest, SyntheticDataGenerator,
};
use alarmlog_core::{load_dotenv, EngineConfig};

use crate::cli::{CliArgs, Command};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    load_dotenv();
    let args = CliArgs::parse();
    let mut config = match args.profile.as_deref() {
        Some(profile) => EngineConfig::for_profile(profile),
        None => EngineConfig::from_env(),
    };

    match args.command {
        Command::Anomaly {
            path,
            window_size,
            forecast_horizon,
            machine_serial,
            no_figures,
        } => {
            if no_figures {
                config.anomaly.visualize = false;
            }
            config.log_summary();
            let engine = AnomalyEngine::from_config(&config);
            let request = AnomalyRequest {
                path,
                window_size,
                forecast_horizon,
                machine_serial,
            };
            let outcome = engine.run(&request);
            if let Some(dir) = &args.figures_dir {
                write_figures(dir, "anomaly", outcome.figures())?;
            }
            print_json(&outcome, args.pretty)?;
            if !outcome.is_success() {
                std::process::exit(2);
            }
        }
        Command::Forecast {
            path,
            steps,
            no_secondary,
        } => {
            if no_secondary {
                config.forecast.secondary_forecaster = false;
            }
            config.log_summary();
            let engine = ForecastEngine::from_config(&config);
            let outcome = engine.run(&ForecastRequest { path, steps });
            if let Some(dir) = &args.figures_dir {
                write_figures(dir, "forecast", outcome.figures())?;
            }
            print_json(&outcome, args.pretty)?;
            if !outcome.is_success() {
                std::process::exit(2);
            }
        }
        Command::Synthetic {
            path,
            task,
            anomaly_pct,
            series_noise,
            output,
            seed,
        } => {
            if let Some(output) = output {
                config.synthetic.output_path = output;
            }
            if seed.is_some() {
                config.synthetic.seed = seed;
            }
            if args.figures_dir.is_some() {
                bail!("--figures-dir does not apply to the synthetic command");
            }
            config.log_summary();
            let generator = SyntheticDataGenerator::from_config(&config);
            let written = generator
                .generate(&path, task, anomaly_pct, series_noise)
                .with_context(|| format!("failed to generate {task} data from {}", path.display()))?;
            print_json(&serde_json::json!({ "output_path": written }), args.pretty)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("failed to serialize result")?;
    println!("{text}");
    Ok(())
}

/// Decode each figure into `<dir>/<prefix>_<n>_<slug>.png`.
fn write_figures(dir: &Path, prefix: &str, figures: &[Figure]) -> Result<()> {
    if figures.is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for (i, figure) in figures.iter().enumerate() {
        let file = dir.join(format!("{prefix}_{}_{}.png", i + 1, figure.slug()));
        let bytes = figure
            .png_bytes()
            .with_context(|| format!("failed to decode figure '{}'", figure.title))?;
        fs::write(&file, bytes).with_context(|| format!("failed to write {}", file.display()))?;
        info!(path = %file.display(), "figure written");
    }
    Ok(())
}
