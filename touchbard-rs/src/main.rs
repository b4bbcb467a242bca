/* touchbard: keeps a keyboard touch bar strip in step with user activity
 * (active, dimmed, idle) and applies its function-key mode. */
mod activity;
mod actor;
mod config;
mod controller;
mod dbus;
mod error;
mod input;
mod keymap;
mod mode;
mod scheduler;
mod settings;
mod transport;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::transport::ibridge::IbridgeTransport;
use crate::transport::{DryRunTransport, Transport};

/// touchbard: activity-driven power and key-mode control for a touch bar.
#[derive(Parser)]
#[command(name = "touchbard", version, about)]
struct Args {
    /// Settings file.
    #[arg(short, long, default_value = settings::DEFAULT_SETTINGS_PATH)]
    config: PathBuf,

    /// Log commands instead of sending them to the hardware.
    #[arg(long)]
    dry_run: bool,

    /// Serve on the session bus instead of the system bus.
    #[arg(long)]
    session: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("touchbard {} starting", env!("CARGO_PKG_VERSION"));

    let settings = settings::load_settings(&args.config)
        .with_context(|| format!("Loading settings from {}", args.config.display()))?;

    let transport: Box<dyn Transport> = match (&settings.hidraw, args.dry_run) {
        (Some(path), false) => Box::new(
            IbridgeTransport::open(path, settings.report_ids)
                .await
                .with_context(|| format!("Opening touch bar at {}", path.display()))?,
        ),
        (None, false) => {
            warn!("No hidraw device configured, running in dry-run mode");
            Box::new(DryRunTransport)
        }
        (_, true) => Box::new(DryRunTransport),
    };

    let controller = controller::spawn_mode_controller(settings.touchbar, transport);

    if settings.inputs.is_empty() {
        warn!("No input devices configured, activity must be reported over DBus");
    }
    let readers = input::ActivityReaders::spawn(settings.inputs, &controller);
    debug!("Started {} activity reader(s)", readers.len());

    let mode = controller.enable().await?;
    info!("Touch bar control enabled, starting in {mode} mode");

    let served = dbus::run_server(controller, args.session).await;
    readers.shutdown().await;
    served
}
