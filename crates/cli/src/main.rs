mod config_commands;
mod db_commands;
mod payload_commands;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    switchboard_config::SwitchboardConfig,
    switchboard_metrics::MetricsRecorderConfig,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "switchboard", about = "Switchboard: webhook ingestion and live message gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Directory searched first for `switchboard.{toml,yaml,json}`.
    #[arg(long, global = true, env = "SWITCHBOARD_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway,
    /// Run every `*.json` webhook payload in a directory through the pipeline.
    ProcessPayloads {
        /// Directory holding the payload files.
        dir: PathBuf,
    },
    /// Database management (migrate, clear, seed).
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Discover the config file, then layer env and CLI overrides on top.
fn load_config(cli: &Cli) -> anyhow::Result<SwitchboardConfig> {
    let mut config = switchboard_config::discover_and_load(cli.config_dir.as_deref());
    switchboard_config::apply_env_overrides(&mut config)
        .context("invalid SWITCHBOARD_* environment override")?;
    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "switchboard starting");

    let config = load_config(&cli)?;

    match cli.command {
        // Default: start gateway when no subcommand is provided
        None | Some(Commands::Gateway) => {
            let metrics_handle = switchboard_metrics::init_metrics(MetricsRecorderConfig {
                enabled: config.metrics.enabled,
            })?;
            switchboard_gateway::start_gateway(&config, Some(metrics_handle)).await
        },
        Some(Commands::ProcessPayloads { dir }) => {
            payload_commands::process_payloads(&config, &dir).await
        },
        Some(Commands::Db { action }) => db_commands::handle_db(action, &config).await,
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, cli.config_dir.as_deref())
        },
    }
}
