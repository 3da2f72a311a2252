//! swaysensor daemon
//!
//! Claims sensors from iio-sensor-proxy and turns their readings into
//! compositor commands until interrupted.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use futures::StreamExt;
use swaysensor::instance::InstanceLock;
use swaysensor::sensors::SensorDispatcher;
use swaysensor::{resolve_device_identity, select_backend, IpcClient, SensorBus, Session};
use swaysensor_config::{Config, SensorSelection, DEFAULT_CONFIG_PATH};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "swaysensord")]
#[command(about = "Rotate, blank and dim the display from iio-sensor-proxy readings")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Rotate the display with the accelerometer
    #[arg(short, long)]
    accelerometer: bool,

    /// Set backlight brightness from the ambient light sensor
    #[arg(short, long)]
    light: bool,

    /// Switch the display off while the proximity sensor is covered
    #[arg(short, long)]
    proximity: bool,
}

impl Args {
    fn selection(&self) -> SensorSelection {
        SensorSelection {
            accelerometer: self.accelerometer,
            light: self.light,
            proximity: self.proximity,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&args.config).into_owned().into();
    let mut config = load_config(&config_path)?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.global.log_level.as_filter())),
        )
        .init();

    config.sensors.merge(args.selection());

    if !config.sensors.any() {
        Args::command().print_help()?;
        return Ok(());
    }

    let _lock = InstanceLock::acquire().context("Failed to take the instance lock")?;

    let selection = select_backend().context("No supported compositor found")?;
    tracing::info!(
        backend = %selection.backend,
        socket = %selection.socket_path.display(),
        source = selection.source,
        "Selected compositor backend"
    );

    let client = IpcClient::connect(&selection)
        .await
        .context("Failed to connect to the compositor")?;

    let display = if config.sensors.needs_display() {
        let identity = resolve_device_identity(&client)
            .await
            .context("Failed to get display identifier")?;
        Some(identity)
    } else {
        None
    };

    let bus = SensorBus::connect(config.sensors)
        .await
        .context("Failed to claim sensors from iio-sensor-proxy")?;

    let session = Session::new(selection.backend, display, config.light);
    let dispatcher = SensorDispatcher::new(session, client, bus.claimed());

    // Apply current readings before waiting for the first change
    let report = dispatcher.dispatch(bus.snapshot().await).await;
    tracing::debug!(?report, "Applied initial sensor readings");

    tracing::info!("swaysensor daemon running");

    let result = run(&bus, &dispatcher).await;

    tracing::info!("Shutting down...");

    bus.release().await;
    if let Err(e) = dispatcher.into_client().close().await {
        tracing::warn!(error = %e, "Failed to close compositor connection");
    }

    result
}

/// Load the configuration file, or defaults when it does not exist
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    swaysensor_config::parse_config(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

async fn run(bus: &SensorBus, dispatcher: &SensorDispatcher) -> Result<()> {
    let mut changes = bus
        .changes()
        .await
        .context("Failed to subscribe to sensor changes")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    loop {
        tokio::select! {
            batch = changes.next() => match batch {
                Some(batch) => {
                    let report = dispatcher.dispatch(batch).await;
                    tracing::trace!(?report, "Dispatched sensor changes");
                }
                None => {
                    tracing::warn!("Sensor change stream ended");
                    return Ok(());
                }
            },
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT");
                return Ok(());
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
                return Ok(());
            }
        }
    }
}
