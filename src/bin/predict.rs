use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use storecast::application::analytics::{DataProcessor, HistoryReport, HistoryRequest};
use storecast::application::batch::BatchRequest;
use storecast::application::predictors::{
    BudgetRequest, CreativeFatigueRequest, InsightsRequest, PurchaseRequest, VelocityRequest,
};
use storecast::application::service::{ForecastService, PredictorKind};
use storecast::config::Config;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "E-commerce forecasts from JSON requests", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print Prometheus metrics to stderr after the command
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Days until an ad creative fatigues
    Creative {
        /// JSON request file (stdin when absent)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Optimal spend for the next period
    Budget {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Next purchase timing for one customer, or a JSON array of customers
    Customer {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Product sales velocity change, or a JSON array of products
    Velocity {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Merchant benchmarking against peers
    Insights {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Peer averages for one archetype
    Benchmarks {
        #[arg(short, long, default_value = "mid_market")]
        archetype: String,
    },
    /// Several predictions for one merchant payload
    Batch {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Summarize a raw history (JSON request, or a CSV export with --csv)
    Analyze {
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// History as CSV with a header row
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Resampling period (D, W, M, Q, Y)
        #[arg(long)]
        period: Option<String>,
    },
    /// Readiness of every predictor
    Health,
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<String> {
    let mut content = String::new();
    match path {
        Some(path) => {
            File::open(path)
                .with_context(|| format!("Failed to open {:?}", path))?
                .read_to_string(&mut content)?;
        }
        None => {
            io::stdin().read_to_string(&mut content).context("Failed to read stdin")?;
        }
    }
    Ok(content)
}

fn parse_request<T: DeserializeOwned>(path: Option<&PathBuf>) -> anyhow::Result<T> {
    let content = read_input(path)?;
    serde_json::from_str(&content).context("Invalid JSON request")
}

/// Accepts either one request object or an array of them.
fn parse_one_or_many<T: DeserializeOwned>(path: Option<&PathBuf>) -> anyhow::Result<Vec<T>> {
    let value: serde_json::Value = parse_request(path)?;
    if value.is_array() {
        serde_json::from_value(value).context("Invalid JSON request array")
    } else {
        Ok(vec![serde_json::from_value(value).context("Invalid JSON request")?])
    }
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn require_enabled(service: &ForecastService, kind: PredictorKind) -> anyhow::Result<()> {
    if !service.is_enabled(kind) {
        anyhow::bail!("{} is disabled by configuration", kind);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.observability.log_level)),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();
    let service = ForecastService::from_config(&config)?;

    match cli.command {
        Commands::Creative { input } => {
            require_enabled(&service, PredictorKind::CreativeFatigue)?;
            let request: CreativeFatigueRequest = parse_request(input.as_ref())?;
            emit(&service.predict_creative_fatigue(&request))?;
        }
        Commands::Budget { input } => {
            require_enabled(&service, PredictorKind::BudgetOptimizer)?;
            let request: BudgetRequest = parse_request(input.as_ref())?;
            emit(&service.optimize_budget(&request))?;
        }
        Commands::Customer { input } => {
            require_enabled(&service, PredictorKind::CustomerPurchase)?;
            let requests: Vec<PurchaseRequest> = parse_one_or_many(input.as_ref())?;
            match requests.as_slice() {
                [single] => emit(&service.predict_next_purchase(single))?,
                many => emit(&service.predict_customers(many))?,
            }
        }
        Commands::Velocity { input } => {
            require_enabled(&service, PredictorKind::ProductVelocity)?;
            let requests: Vec<VelocityRequest> = parse_one_or_many(input.as_ref())?;
            match requests.as_slice() {
                [single] => emit(&service.predict_velocity(single))?,
                many => emit(&service.predict_products(many))?,
            }
        }
        Commands::Insights { input } => {
            require_enabled(&service, PredictorKind::CrossMerchant)?;
            let request: InsightsRequest = parse_request(input.as_ref())?;
            emit(&service.get_insights(&request))?;
        }
        Commands::Benchmarks { archetype } => match service.benchmark_report(&archetype) {
            Some(report) => emit(&report)?,
            None => anyhow::bail!("Unknown archetype: {}", archetype),
        },
        Commands::Batch { input } => {
            let request: BatchRequest = parse_request(input.as_ref())?;
            emit(&service.run_batch(&request))?;
        }
        Commands::Analyze { input, csv, period } => {
            let mut request = match (&input, &csv) {
                (None, Some(_)) => HistoryRequest::default(),
                _ => parse_request(input.as_ref())?,
            };
            if let Some(path) = &csv {
                let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
                request.history = DataProcessor::read_csv_rows(BufReader::new(file))?;
                info!("Read {} CSV rows from {:?}", request.history.len(), path);
            }
            if period.is_some() {
                request.period = period;
            }
            let report = HistoryReport::from_request(&request, service.now().date_naive())
                .map_err(anyhow::Error::msg)?;
            emit(&report)?;
        }
        Commands::Health => emit(&service.health())?,
    }

    if cli.metrics {
        match service.metrics() {
            Some(metrics) => eprintln!("{}", metrics.render()),
            None => eprintln!("metrics disabled (METRICS_ENABLED=false)"),
        }
    }

    Ok(())
}
