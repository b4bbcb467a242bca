pub mod controller;

use anyhow::Result;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info};
use zbus::connection::Builder;

use crate::controller::ControllerHandle;
use crate::error::ControllerError;

pub const BUS_NAME: &str = "org.freedesktop.touchbar1";
pub const OBJECT_PATH: &str = "/org/freedesktop/touchbar1";

impl From<ControllerError> for zbus::fdo::Error {
    fn from(err: ControllerError) -> Self {
        match err {
            ControllerError::InvalidArgument { .. } => Self::InvalidArgs(err.to_string()),
            other => Self::Failed(other.to_string()),
        }
    }
}

/* Starts the DBus server and registers the controller interface.
 *
 * This function blocks until SIGINT/SIGTERM, then disables the controller
 * so no re-evaluation runs during teardown. */
pub async fn run_server(controller: ControllerHandle, session_bus: bool) -> Result<()> {
    let iface = controller::TouchbarController::new(controller.clone());

    let builder = if session_bus {
        Builder::session()?
    } else {
        Builder::system()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, iface)?
        .build()
        .await?;

    info!("DBus server ready on {BUS_NAME}");

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
        _ = sigterm.recv() => info!("Terminated, shutting down"),
        _ = controller.closed() => {
            info!("Mode controller stopped, shutting down");
            return Ok(());
        }
    }

    if let Err(e) = controller.disable().await {
        debug!("Disable on shutdown: {e}");
    }
    Ok(())
}
