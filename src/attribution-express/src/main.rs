//! Attribution Express: multi-touch marketing attribution over a touchpoint feed.
//!
//! Loads configuration and a JSON feed, runs one engine operation, and prints
//! the result as JSON on stdout. Logs go to stderr.

mod feed;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use attribution_core::{AppConfig, AttributionModel, DateRange, TouchpointSource};
use attribution_engine::{analyze_journey, AttributionEngine, BatchRunner};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "attribution-express")]
#[command(about = "Multi-touch marketing attribution over a touchpoint feed")]
#[command(version)]
struct Cli {
    /// TOML config file (environment variables still apply on top)
    #[arg(long, env = "ATTRIBUTION_CONFIG")]
    config: Option<String>,

    /// JSON touchpoint feed
    #[arg(long, env = "ATTRIBUTION_FEED")]
    feed: Option<PathBuf>,

    /// Attribution window in days (overrides config)
    #[arg(long)]
    window_days: Option<u32>,

    /// Time-decay half-life in days (overrides config)
    #[arg(long)]
    half_life_days: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Attribute a single conversion
    Attribute {
        #[arg(long)]
        customer: String,
        #[arg(long)]
        conversion: Uuid,
        #[arg(long)]
        model: Option<AttributionModel>,
    },
    /// Describe a customer's full journey
    Journey {
        #[arg(long)]
        customer: String,
    },
    /// Compare all models over a date range
    Compare {
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
    },
    /// Channel report for one model over a date range
    Report {
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
        #[arg(long)]
        model: Option<AttributionModel>,
    },
    /// List the available attribution models
    Models,
}

#[derive(Serialize)]
struct ModelListing {
    model: AttributionModel,
    name: &'static str,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_source(cli: &Cli) -> anyhow::Result<Arc<dyn TouchpointSource>> {
    let path = cli
        .feed
        .as_deref()
        .context("--feed is required for this command")?;
    let source: Arc<dyn TouchpointSource> = Arc::new(feed::load(path)?);
    Ok(source)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attribution_express=info,attribution_engine=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    // Unknown models and malformed values must stop the run, not fall back.
    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    if let Some(days) = cli.window_days {
        config.attribution.attribution_window_days = days;
    }
    if let Some(days) = cli.half_life_days {
        config.attribution.time_decay_half_life_days = days;
    }
    config.validate()?;

    info!(
        window_days = config.attribution.attribution_window_days,
        half_life_days = config.attribution.time_decay_half_life_days,
        model = %config.attribution.model,
        workers = config.batch.workers,
        "Configuration loaded"
    );

    let engine = AttributionEngine::new(config.attribution.clone())?;

    match &cli.command {
        Command::Models => {
            let models: Vec<ModelListing> = AttributionModel::ALL
                .iter()
                .map(|m| ModelListing {
                    model: *m,
                    name: m.display_name(),
                })
                .collect();
            print_json(&models)?;
        }
        Command::Attribute {
            customer,
            conversion,
            model,
        } => {
            let source = load_source(&cli)?;
            let model = model.unwrap_or(config.attribution.model);
            let result = engine.attribute(source.as_ref(), customer, *conversion, model)?;
            print_json(&result)?;
        }
        Command::Journey { customer } => {
            let source = load_source(&cli)?;
            print_json(&analyze_journey(source.as_ref(), customer))?;
        }
        Command::Compare { start, end } => {
            let source = load_source(&cli)?;
            let range = DateRange::new(*start, *end)?;
            let runner = BatchRunner::new(engine, config.batch.clone())?;
            print_json(&runner.compare_models(source, range).await?)?;
        }
        Command::Report { start, end, model } => {
            let source = load_source(&cli)?;
            let range = DateRange::new(*start, *end)?;
            let runner = BatchRunner::new(engine, config.batch.clone())?;
            print_json(&runner.channel_report(source, range, *model).await?)?;
        }
    }

    Ok(())
}
