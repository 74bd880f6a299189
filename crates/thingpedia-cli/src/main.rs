//! Thingpedia CLI - Main entry point
//!
//! Fetches manifests and example datasets through the configured client
//! and resolves device modules from them.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use thingpedia_client::{ModuleRegistry, ThingpediaClient};

#[derive(Parser, Debug)]
#[command(name = "thingpedia")]
#[command(about = "Thingpedia manifest and example dataset tool")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "thingpedia.toml")]
    config: PathBuf,

    /// Locale tag (overrides the configuration file)
    #[arg(long)]
    locale: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the class source of a device
    DeviceCode { kind: String },
    /// Print the manifests of the given kinds (all when none are given)
    Schemas { kinds: Vec<String> },
    /// Print the example dataset for the given kinds, in order
    Examples {
        #[arg(required = true)]
        kinds: Vec<String>,
    },
    /// Resolve a device module and print its summary as JSON
    Module { kind: String },
    /// Print how a device is set up as JSON
    Factories { kind: String },
    /// Write a default configuration file to the --config path
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries command output
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Thingpedia v{}", env!("CARGO_PKG_VERSION"));

    let output = match &args.command {
        Command::InitConfig => {
            config::save_default_config(&args.config)?;
            info!(path = %args.config.display(), "Wrote default configuration");
            return Ok(());
        }
        Command::DeviceCode { kind } => {
            commands::device_code(open_client(&args)?.as_ref(), kind).await?
        }
        Command::Schemas { kinds } => commands::schemas(open_client(&args)?.as_ref(), kinds).await?,
        Command::Examples { kinds } => {
            commands::examples(open_client(&args)?.as_ref(), kinds).await?
        }
        Command::Module { kind } => {
            let registry = ModuleRegistry::new(open_client(&args)?);
            commands::module(&registry, kind).await?
        }
        Command::Factories { kind } => {
            commands::factories(open_client(&args)?.as_ref(), kind).await?
        }
    };

    println!("{}", output.trim_end());
    Ok(())
}

/// Load the configuration, apply CLI overrides and build the client
fn open_client(args: &Args) -> Result<Arc<dyn ThingpediaClient>> {
    let mut config = config::load_config(&args.config)?;
    if let Some(locale) = &args.locale {
        config.client.locale = locale.clone();
    }

    info!(
        backend = ?config.client.backend,
        locale = %config.client.locale,
        "Configuration loaded"
    );

    config.build_client()
}
