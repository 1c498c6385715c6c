//! watchpost agent
//!
//! Reports the local host's state to a collector over mutually
//! authenticated HTTPS. Exits with `EX_TEMPFAIL` when its certificate is
//! due for rotation; the supervisor is expected to restart it.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use watchpost_client::HttpConnector;
use watchpost_core::{Agent, CertificateManager, CredentialPolicy, RunOutcome, SessionSettings};

mod config;
mod factory;

use config::{Config, LogFormat, LoggingConfig};

/// sysexits.h `EX_TEMPFAIL`
const EX_TEMPFAIL: u8 = 75;

#[derive(Parser)]
#[command(name = "watchpost", version)]
#[command(about = "Host monitoring agent", long_about = None)]
struct Cli {
    /// Configuration file (default: search the usual locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level or filter directive, overriding the configuration file
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    init_tracing(&config.logging, cli.log_level.as_deref())?;

    match run(&config).await? {
        RunOutcome::ExitingForRotation => {
            info!("{}", RunOutcome::ExitingForRotation);
            Ok(ExitCode::from(EX_TEMPFAIL))
        }
    }
}

async fn run(config: &Config) -> Result<RunOutcome> {
    let connector = HttpConnector::new(config.collector_url()?)?;
    let certificates =
        CertificateManager::open(config.credentials.clone(), CredentialPolicy::default()).await?;

    let registry = factory::build_registry();
    let host = factory::local_host(&registry).await;

    let agent = Agent::new(
        Arc::new(connector),
        certificates,
        host,
        SessionSettings::default(),
    );
    Ok(agent.run().await?)
}

/// `--log-level` wins over `RUST_LOG`, which wins over the config file
fn init_tracing(logging: &LoggingConfig, log_level: Option<&str>) -> Result<()> {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&logging.level)?,
        },
    };

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Pretty => registry.with(fmt::layer()).try_init()?,
    }
    Ok(())
}
