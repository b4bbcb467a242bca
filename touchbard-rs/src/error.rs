use thiserror::Error;

use crate::config::ConfigField;
use crate::transport::TransportCommand;

/* Every recoverable condition the mode controller reports. None of them is
 * fatal; the state machine itself has no invalid states. */
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /* A tunable was given a malformed or out-of-range value. */
    #[error("Invalid value {value} for {field}")]
    InvalidArgument { field: ConfigField, value: i64 },

    /* The transport could not apply a command. The controller keeps the
     * intended state and re-emits on the next state change. */
    #[error("Transport failed to apply {command}: {reason}")]
    TransportFailure {
        command: TransportCommand,
        reason: String,
    },

    #[error("Controller is not enabled")]
    NotEnabled,

    #[error("Controller is already disabled")]
    AlreadyDisabled,

    #[error("Mode controller is no longer running")]
    Stopped,
}
