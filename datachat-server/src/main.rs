// datachat-server/src/main.rs
mod http;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use datachat_core::{AppConfig, RuntimeConfig};

use tracing::{error, info, Level};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const LOG_FILE_NAME: &str = "datachat-server.log";

/// Datachat: a chat service that answers questions with live weather,
/// seismic, FX, crypto and equity data.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase message verbosity.
    ///
    /// Specify multiple times for more verbose output:
    ///  -v:  INFO level
    ///  -vv: DEBUG level
    ///  -vvv: TRACE level (most verbose)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Path to the configuration file.
    #[arg(short, long, default_value = "datachat.toml")]
    config: PathBuf,

    /// Override the configured listen host.
    #[arg(long)]
    host: Option<String>,

    /// Override the configured listen port.
    #[arg(long)]
    port: Option<u16>,
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    if cli.config.exists() {
        AppConfig::load(&cli.config)
    } else {
        info!(
            "Config file {} not found, using defaults",
            cli.config.display()
        );
        AppConfig::from_toml_str("").context("Failed to build default configuration")
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    let log_dir = env::temp_dir().join("datachat");
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!(
            "Error: Failed to create log directory {}: {}",
            log_dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }
    let log_path = log_dir.join(LOG_FILE_NAME);

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Error: Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        "Logging initialized. Level determined by RUST_LOG or -v flags (default: {}). Logging to stderr and {}",
        default_level,
        log_path.display()
    );

    let app_config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let host = cli.host.unwrap_or_else(|| app_config.server.host.clone());
    let port = cli.port.unwrap_or(app_config.server.port);

    let runtime_config = RuntimeConfig::from_app(&app_config);
    if runtime_config.model.api_key.is_empty() {
        // The server still starts; each chat turn will fail with a
        // configuration error until the variable is set.
        tracing::warn!(
            "Model API key variable {} is not set",
            app_config.model.api_key_env_var
        );
    }
    if runtime_config.storage.is_none() {
        info!("No storage backend configured, session persistence is disabled");
    }

    let state = Arc::new(http::AppState::new(runtime_config));
    if let Err(e) = http::serve(state, &host, port).await {
        error!("Server failed: {:#}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
