pub mod ibridge;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::config::FnMode;
use crate::mode::Mode;

/* The only two side effects the mode controller ever produces. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    SetDisplayMode(Mode),
    SetFunctionKeyMapping(FnMode),
}

impl fmt::Display for TransportCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetDisplayMode(mode) => write!(f, "display mode {mode}"),
            Self::SetFunctionKeyMapping(mode) => write!(f, "function-key mode {mode}"),
        }
    }
}

/* Outcome of one command, sent back from the transport actor. */
#[derive(Debug, Clone)]
pub struct TransportReport {
    pub command: TransportCommand,
    pub result: Result<(), String>,
}

/* The hardware-facing side of the controller.
 *
 * Implementations must tolerate being asked to re-apply the mode they are
 * already in. Errors are reported but never retried synchronously. */
#[async_trait]
pub trait Transport: Send {
    /* Returns the transport name for logging purposes. */
    fn name(&self) -> &str;

    async fn set_display_mode(&mut self, mode: Mode) -> Result<()>;

    async fn set_function_key_mapping(&mut self, mode: FnMode) -> Result<()>;

    /* Dispatch a command to the matching method. */
    async fn apply(&mut self, command: TransportCommand) -> Result<()> {
        match command {
            TransportCommand::SetDisplayMode(mode) => self.set_display_mode(mode).await,
            TransportCommand::SetFunctionKeyMapping(mode) => {
                self.set_function_key_mapping(mode).await
            }
        }
    }
}

/* Transport that only logs, for running without hardware. */
#[derive(Debug, Default)]
pub struct DryRunTransport;

#[async_trait]
impl Transport for DryRunTransport {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn set_display_mode(&mut self, mode: Mode) -> Result<()> {
        info!("[dry-run] display mode -> {mode}");
        Ok(())
    }

    async fn set_function_key_mapping(&mut self, mode: FnMode) -> Result<()> {
        info!("[dry-run] function-key mode -> {mode}");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::bail;
    use tokio::sync::mpsc;

    use super::*;

    /* Forwards every attempted command to a channel. The next `failures`
     * commands of either kind fail after being recorded. */
    pub struct RecordingTransport {
        tx: mpsc::UnboundedSender<TransportCommand>,
        failures: Arc<AtomicUsize>,
    }

    impl RecordingTransport {
        pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportCommand>, Arc<AtomicUsize>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let failures = Arc::new(AtomicUsize::new(0));
            let transport = Self {
                tx,
                failures: Arc::clone(&failures),
            };
            (transport, rx, failures)
        }

        fn record(&self, command: TransportCommand) -> Result<()> {
            let _ = self.tx.send(command);
            let pending = self.failures.load(Ordering::SeqCst);
            if pending > 0 {
                self.failures.store(pending - 1, Ordering::SeqCst);
                bail!("device busy");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &str {
            "recording"
        }

        async fn set_display_mode(&mut self, mode: Mode) -> Result<()> {
            self.record(TransportCommand::SetDisplayMode(mode))
        }

        async fn set_function_key_mapping(&mut self, mode: FnMode) -> Result<()> {
            self.record(TransportCommand::SetFunctionKeyMapping(mode))
        }
    }
}
