//! airwatch - run one ingest or forecast job and print its outcome as JSON.

use std::env;
use std::process;

use chrono::Utc;
use clap::{Parser, Subcommand};

use airwatch_service::archive::FsArchive;
use airwatch_service::config::Config;
use airwatch_service::db;
use airwatch_service::ingest;
use airwatch_service::logging::{self, DataSource, LogLevel};
use airwatch_service::model::Result;
use airwatch_service::pipeline::{self, RunOutcome};

#[derive(Parser)]
#[command(name = "airwatch", version)]
#[command(about = "Air quality ingest and AQI forecasting", long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    \
    AIRWATCH_CONFIG      Config file (default ./airwatch.toml)\n    \
    DATABASE_URL         PostgreSQL connection string\n    \
    AIRVISUAL_API_KEY    AirVisual API key\n    \
    FIRMS_MAP_KEY        FIRMS map key\n    \
    ARCHIVE_ROOT         Raw payload archive directory\n    \
    AIRWATCH_LOG_LEVEL   debug | info | warning | error\n    \
    AIRWATCH_LOG_FILE    Also append log lines to this file")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq)]
enum Commands {
    /// Fetch current AirVisual AQI for the configured city
    IngestAir,
    /// Fetch NASA FIRMS fire detections for the configured area
    IngestFires,
    /// Fetch USGS earthquakes for the configured area
    IngestQuakes,
    /// Train the trend model and store the AQI forecast
    Forecast,
}

fn main() {
    let cli = Cli::parse();

    init_logging();
    logging::info(DataSource::System, None, &format!("Starting {:?}", cli.command));

    let outcome = match run(cli.command) {
        Ok(outcome) => outcome,
        Err(e) => {
            logging::error(DataSource::System, None, &e.to_string());
            RunOutcome::failure(e.to_string())
        }
    };

    match serde_json::to_string_pretty(&outcome) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("cannot serialize outcome: {}", e),
    }

    if !outcome.is_success() {
        process::exit(1);
    }
}

/// Setup failures (config, connection, HTTP client) surface here; job
/// failures come back inside the outcome.
fn run(command: Commands) -> Result<RunOutcome> {
    let config = Config::load_default()?;
    let mut client = db::connect(&config.database)?;
    let now = Utc::now();

    let outcome = match command {
        Commands::Forecast => pipeline::run_forecast(&mut client, &config, now),
        Commands::IngestAir => {
            let (http, mut archive) = ingest_tools(&config)?;
            pipeline::run_ingest_air(&http, &mut client, &mut archive, &config, now)
        }
        Commands::IngestFires => {
            let (http, mut archive) = ingest_tools(&config)?;
            pipeline::run_ingest_fires(&http, &mut client, &mut archive, &config, now)
        }
        Commands::IngestQuakes => {
            let (http, mut archive) = ingest_tools(&config)?;
            pipeline::run_ingest_quakes(&http, &mut client, &mut archive, &config, now)
        }
    };
    Ok(outcome)
}

fn ingest_tools(config: &Config) -> Result<(reqwest::blocking::Client, FsArchive)> {
    Ok((ingest::http_client()?, FsArchive::new(&config.archive.root)))
}

fn init_logging() {
    let level = env::var("AIRWATCH_LOG_LEVEL")
        .ok()
        .and_then(|s| LogLevel::parse(&s))
        .unwrap_or(LogLevel::Info);
    let log_file = env::var("AIRWATCH_LOG_FILE").ok();
    logging::init_logger(level, log_file.as_deref(), true);
}
