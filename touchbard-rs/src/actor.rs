/* Transport actor: serializes all hardware I/O for the touch bar.
 *
 * The actor task (`tokio::spawn`) owns the `Transport` instance. The mode
 * controller hands it commands through a bounded `mpsc` channel without
 * waiting, so device I/O never stalls activity or timer handling. The
 * outcome of every command is sent back on a separate report channel. */

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ControllerError;
use crate::transport::{Transport, TransportCommand, TransportReport};

/* Number of commands that may be queued before submissions fail. */
const COMMAND_QUEUE_DEPTH: usize = 16;

/* Messages the transport actor understands. */
#[derive(Debug)]
pub enum ActorMessage {
    /* Apply a command to the hardware and report the outcome. */
    Apply(TransportCommand),
    /* Gracefully shut down the actor. */
    Shutdown,
}

/* Handle used by the mode controller to reach the transport actor. */
#[derive(Clone)]
pub struct TransportHandle {
    tx: mpsc::Sender<ActorMessage>,
}

impl TransportHandle {
    /* Queue a command without waiting for it to be applied. Fails only if
     * the queue is full or the actor is gone. */
    pub fn submit(&self, command: TransportCommand) -> Result<(), ControllerError> {
        self.tx
            .try_send(ActorMessage::Apply(command))
            .map_err(|e| ControllerError::TransportFailure {
                command,
                reason: match e {
                    mpsc::error::TrySendError::Full(_) => "command queue is full".to_string(),
                    mpsc::error::TrySendError::Closed(_) => {
                        "transport actor is no longer running".to_string()
                    }
                },
            })
    }

    /* Request the actor to shut down gracefully. */
    pub async fn shutdown(&self) {
        let _ = self.tx.send(ActorMessage::Shutdown).await;
    }
}

/* The transport actor itself. */
struct TransportActor {
    transport: Box<dyn Transport>,
    rx: mpsc::Receiver<ActorMessage>,
    reports: mpsc::UnboundedSender<TransportReport>,
}

impl TransportActor {
    /* Main actor loop: process messages until shutdown or channel close. */
    async fn run(mut self) {
        info!("Transport actor started (transport: {})", self.transport.name());

        while let Some(msg) = self.rx.recv().await {
            match msg {
                ActorMessage::Apply(command) => {
                    let result = self
                        .transport
                        .apply(command)
                        .await
                        .map_err(|e| format!("{e:#}"));
                    match &result {
                        Ok(()) => debug!("Applied {command}"),
                        Err(e) => warn!("Failed to apply {command}: {e}"),
                    }
                    let _ = self.reports.send(TransportReport { command, result });
                }
                ActorMessage::Shutdown => {
                    info!("Transport actor shutting down");
                    break;
                }
            }
        }

        debug!("Transport actor loop exited");
    }
}

/* Spawn the transport actor. Command outcomes are delivered on `reports`. */
pub fn spawn_transport_actor(
    transport: Box<dyn Transport>,
    reports: mpsc::UnboundedSender<TransportReport>,
) -> TransportHandle {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

    let actor = TransportActor {
        transport,
        rx,
        reports,
    };

    tokio::spawn(async move {
        actor.run().await;
    });

    TransportHandle { tx }
}
