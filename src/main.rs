//! WSI Anonymizer - removes patient-identifying data from Whole Slide Images.
//!
//! This binary parses the command line, installs logging and runs one engine
//! operation.

use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_anonymizer::{
    config::{AnonymizeConfig, CheckConfig, Cli, Command, InspectConfig},
    Engine, WsiData,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.command.verbose());

    let engine = Engine::new();
    match cli.command {
        Command::Check(config) => run_check(&engine, config).await,
        Command::Inspect(config) => run_inspect(&engine, config).await,
        Command::Anonymize(config) => run_anonymize(&engine, config).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_anonymizer=debug"
    } else {
        "wsi_anonymizer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(engine: &Engine, config: CheckConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let vendor = engine.check_file_format(&config.path).await;
    println!("{}", vendor);

    if vendor.is_supported() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// =============================================================================
// Inspect Command
// =============================================================================

async fn run_inspect(engine: &Engine, config: InspectConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let data = match engine.get_wsi_data(&config.path).await {
        Ok(data) => data,
        Err(e) => {
            error!("Cannot inspect {}: {}", config.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if config.json {
        match serde_json::to_string_pretty(&data) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_attributes(&data);
    }

    ExitCode::SUCCESS
}

fn print_attributes(data: &WsiData) {
    println!("Vendor: {}", data.vendor);
    if data.metadata.is_empty() {
        return;
    }

    let width = data.metadata.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    println!();
    for (key, value) in data.metadata.iter() {
        println!("  {:<width$}  {}", key, value, width = width);
    }
    if data.metadata.truncated {
        println!();
        println!("  (list truncated after {} entries)", data.metadata.len());
    }
}

// =============================================================================
// Anonymize Command
// =============================================================================

async fn run_anonymize(engine: &Engine, config: AnonymizeConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match engine.anonymize_wsi(&config.request()).await {
        Ok(output) => {
            println!("{}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Anonymization failed ({}): {}", e.code(), e);
            ExitCode::FAILURE
        }
    }
}
