mod calendar;
mod config;
mod ml;
mod prediction;
mod web;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use crate::calendar::Region;
use crate::config::{LogFormat, Settings};
use crate::ml::ModelStore;
use crate::prediction::{model_name, PredictionService};
use crate::web::{start_server, AppState};

#[derive(Parser)]
#[command(name = "silenus")]
#[command(version)]
#[command(about = "Polynomial regression prediction server for B3 tickers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, default_value = "silenus.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP prediction server (default)
    Serve {
        /// Bind address, overrides server.host
        #[arg(long)]
        host: Option<String>,
        /// Port, overrides server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print predictions for a symbol without starting the server
    Predict {
        /// Ticker symbol (e.g., PETR4)
        #[arg(short, long)]
        symbol: String,
        /// Start date (YY-MM-DD)
        #[arg(short, long)]
        from: String,
        /// End date (YY-MM-DD)
        #[arg(short, long)]
        to: String,
    },
    /// List the holidays of a calendar region
    Holidays {
        #[arg(short, long)]
        year: i32,
        /// Region (brazil, brazil_b3), defaults to calendar.region
        #[arg(short, long)]
        region: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let settings = Settings::load(Some(cli.config.as_path()))?;
    init_logging(&settings, cli.verbose)?;

    info!("{} v{}", settings.app_name, settings.app_version);

    match cli.command.unwrap_or(Commands::Serve { host: None, port: None }) {
        Commands::Serve { host, port } => {
            run_server(settings, host, port).await?;
        }
        Commands::Predict { symbol, from, to } => {
            run_prediction(&settings, &symbol, &from, &to).await?;
        }
        Commands::Holidays { year, region } => {
            let region = match region {
                Some(r) => r.parse::<Region>()?,
                None => settings.calendar.region,
            };
            list_holidays(region, year);
        }
    }

    Ok(())
}

fn init_logging(settings: &Settings, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&settings.log_level))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let result = match settings.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}

fn build_predictor(settings: &Settings) -> PredictionService {
    let store = Arc::new(ModelStore::new(&settings.models.dir, &settings.models.extension));
    let calendar = settings.calendar.region.calendar();
    info!(
        "Serving models from {} with the {} calendar",
        store.models_dir().display(),
        calendar.name()
    );
    PredictionService::new(store, calendar)
}

async fn run_server(settings: Settings, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))?;

    let predictor = build_predictor(&settings);

    if !settings.models.preload.is_empty() {
        let names: Vec<String> = settings.models.preload.iter().map(|s| model_name(s)).collect();
        let loaded = predictor.models().preload(&names).await;
        info!("Preloaded {}/{} models", loaded, names.len());
    }

    let span = info_span!("server", logger = %settings.logger, app = %settings.app_name);
    let state = AppState::new(settings, predictor);
    start_server(state, addr).instrument(span).await
}

async fn run_prediction(settings: &Settings, symbol: &str, from: &str, to: &str) -> Result<()> {
    let predictor = build_predictor(settings);
    let forecast = predictor.predict(symbol, from, to).await?;

    info!("Start index for {}: {}", symbol, forecast.start_index);
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "prediction": forecast.predictions }))?
    );
    Ok(())
}

fn list_holidays(region: Region, year: i32) {
    let calendar = region.calendar();
    println!("{} holidays in {}:", calendar.name(), year);
    for holiday in calendar.holidays(year) {
        println!("  {}  {:<10}  {}", holiday.date, holiday.date.format("%A"), holiday.label);
    }
}
