mod check_commands;
mod relay;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    meshrelay_config::{LogLevel, Severity, ValidationResult, validate::validate},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "meshrelay", about = "Relay MeshCore channel messages from MQTT to Discord")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, env = "RELAY_LOG_JSON", default_value_t = false)]
    json_logs: bool,

    /// Channel mapping document (JSON, TOML or YAML).
    #[arg(long, global = true, env = "CHANNELS_FILE")]
    channels_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay (default when no subcommand is provided).
    Run,
    /// Validate configuration and print the channel mappings, then exit.
    Check,
}

/// Filter directive for `LOG_LEVEL`; unset or unknown is `info`.
fn level_directive(raw: Option<&str>) -> &'static str {
    LogLevel::parse(raw.unwrap_or_default()).as_str()
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL`. Runs before the config is loaded
/// so loader warnings reach the subscriber.
fn init_telemetry(cli: &Cli) {
    let level = level_directive(std::env::var("LOG_LEVEL").ok().as_deref());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

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

fn log_diagnostics(report: &ValidationResult) {
    for d in &report.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => info!(path = %d.path, "{}", d.message),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    let config = meshrelay_config::load_config(cli.channels_file.clone());
    let report = validate(&config);

    match cli.command {
        Some(Commands::Check) => check_commands::handle_check(&config, &report),
        None | Some(Commands::Run) => {
            log_diagnostics(&report);
            if report.has_errors() {
                std::process::exit(1);
            }
            info!(version = env!("CARGO_PKG_VERSION"), "meshrelay starting");
            relay::run(config).await
        },
    }
}
