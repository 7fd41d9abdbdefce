use anyhow::Context;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use storecast::application::service::{ForecastService, PredictorKind};
use storecast::config::Config;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Train one predictor from labelled JSON samples", long_about = None)]
struct Args {
    /// creative_fatigue, budget_optimizer, customer_purchase, product_velocity or cross_merchant
    #[arg(short, long)]
    predictor: String,

    /// JSON array of training samples (stdin when absent)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Override MODEL_STORAGE_PATH
    #[arg(long)]
    storage: Option<PathBuf>,
}

fn read_samples(path: Option<&PathBuf>) -> anyhow::Result<serde_json::Value> {
    match path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
            serde_json::from_reader(BufReader::new(file)).context("Invalid JSON samples")
        }
        None => serde_json::from_reader(io::stdin().lock()).context("Invalid JSON samples on stdin"),
    }
}

fn main() -> anyhow::Result<()> {
    let mut config = Config::from_env()?;

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.observability.log_level)),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let args = Args::parse();
    let kind: PredictorKind = args.predictor.parse()?;
    if let Some(storage) = args.storage {
        config.model.storage_path = storage;
    }
    // Training replaces the artifact, no need to load the old one first
    config.model.auto_load = false;

    let samples = read_samples(args.input.as_ref())?;
    let mut service = ForecastService::from_config(&config)?;

    info!("Training {} with artifacts in {:?}", kind, config.model.storage_path);
    match service.train_json(kind, samples) {
        Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
        Err(e) => {
            error!("Training {} failed: {}", kind, e);
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            std::process::exit(1);
        }
    }

    Ok(())
}
