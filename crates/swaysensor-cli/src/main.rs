//! swaysensor CLI
//!
//! Inspection tool for swaysensor: checks the configuration and talks to the
//! compositor the daemon would drive.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use swaysensor::backend::Lifetime;
use swaysensor::{resolve_device_identity, select_backend, Command, IpcClient, Selection};
use swaysensor_config::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(name = "swaysensorctl")]
#[command(about = "Inspect swaysensor configuration and compositor connection")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration file
    Validate,

    /// Show which compositor backend would be used
    Backend {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the display that rotate and power commands target
    Outputs,

    /// Send one raw command to the compositor
    Send {
        /// Command text, joined with spaces
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
}

/// Backend selection as printed by `backend --json`
#[derive(Debug, Serialize)]
struct BackendReport {
    backend: &'static str,
    socket: PathBuf,
    source: &'static str,
    persistent: bool,
    max_payload: usize,
}

impl From<&Selection> for BackendReport {
    fn from(selection: &Selection) -> Self {
        Self {
            backend: selection.backend.name(),
            socket: selection.socket_path.clone(),
            source: selection.source,
            persistent: selection.backend.lifetime() == Lifetime::Persistent,
            max_payload: selection.backend.max_payload(),
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&cli.config).into_owned().into();

    match cli.command {
        Commands::Validate => cmd_validate(&config_path),
        Commands::Backend { json } => cmd_backend(json),
        Commands::Outputs => cmd_outputs().await,
        Commands::Send { command } => cmd_send(&command.join(" ")).await,
    }
}

fn cmd_validate(config_path: &Path) -> miette::Result<()> {
    println!("Validating configuration: {}", config_path.display());

    if !config_path.exists() {
        println!("No configuration file, defaults apply");
        return Ok(());
    }

    let config = swaysensor_config::parse_config(config_path)?;

    println!("Configuration is valid!");
    println!("  Log level: {}", config.global.log_level.as_filter());
    println!("  Sensors:");
    println!("    accelerometer: {}", config.sensors.accelerometer);
    println!("    light: {}", config.sensors.light);
    println!("    proximity: {}", config.sensors.proximity);
    println!("  Light calibration:");
    println!("    vendor-max: {}", config.light.vendor_max);
    println!("    lux-max: {}", config.light.lux_max);

    if !config.sensors.any() {
        println!("\nNo sensors enabled; the daemon needs -a, -l or -p to do anything.");
    }

    Ok(())
}

fn cmd_backend(json: bool) -> miette::Result<()> {
    let selection = select_backend().into_diagnostic()?;
    let report = BackendReport::from(&selection);

    if json {
        let out = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{}", out);
        return Ok(());
    }

    println!("Backend: {}", report.backend);
    println!("  Socket: {}", report.socket.display());
    println!("  Selected by: {}", report.source);
    println!(
        "  Connection: {}",
        if report.persistent { "persistent" } else { "per request" }
    );
    println!("  Max command payload: {} bytes", report.max_payload);

    Ok(())
}

async fn cmd_outputs() -> miette::Result<()> {
    let selection = select_backend().into_diagnostic()?;
    let client = IpcClient::connect(&selection).await.into_diagnostic()?;

    let identity = resolve_device_identity(&client).await.into_diagnostic()?;
    println!("{}", identity);

    client.close().await.into_diagnostic()
}

async fn cmd_send(text: &str) -> miette::Result<()> {
    let selection = select_backend().into_diagnostic()?;
    let command = Command::new(selection.backend, text).into_diagnostic()?;
    let client = IpcClient::connect(&selection).await.into_diagnostic()?;

    let result = client.run_command(&command).await;
    if let Err(e) = client.close().await {
        tracing::warn!(error = %e, "Failed to close compositor connection");
    }
    result.into_diagnostic()?;

    println!("ok: {}", command);
    Ok(())
}
