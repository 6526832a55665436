//! `extract-load`: run the brokerage extract-load pipeline once.
//!
//! Configuration comes from the environment (a `.env` file is honoured) or from `--config`.
//! Exits non-zero with the error message when the run fails; retries belong to the scheduler.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use brokerage_pipeline::config::{PipelineConfig, WarehouseSettings};
use brokerage_pipeline::pipeline::{
    CompositeObserver, FileObserver, Pipeline, PipelineObserver, PipelineOptions, TracingObserver,
};

#[derive(Parser, Debug)]
#[command(name = "extract-load", about = "Fetch the source CSV files and replace-load them into the warehouse")]
struct Args {
    /// JSON configuration file (defaults to environment variables)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Load into this local DuckDB file instead of MotherDuck
    #[arg(long)]
    local: Option<PathBuf>,

    /// Also append run events to this file
    #[arg(long)]
    event_log: Option<PathBuf>,

    /// Print load records as a JSON array
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "extract-load failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::from_env()?,
    };
    if let Some(path) = &args.local {
        config.warehouse = WarehouseSettings::local_file(path);
    }

    let mut observers: Vec<Arc<dyn PipelineObserver>> = vec![Arc::new(TracingObserver)];
    if let Some(path) = &args.event_log {
        observers.push(Arc::new(FileObserver::new(path)));
    }
    let options = PipelineOptions {
        observer: Some(Arc::new(CompositeObserver::new(observers))),
        ..Default::default()
    };

    let pipeline = Pipeline::from_config(&config)?.with_options(options);
    let records = pipeline.run(&config.sources)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for r in &records {
            println!("{}.{}\t{} rows\tloaded_at={}", config.schema, r.table, r.rows, r.loaded_at);
        }
    }
    Ok(())
}
