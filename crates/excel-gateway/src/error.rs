//! Error types for excel-gateway

use excel_gateway_core::NameError;
use thiserror::Error;

use crate::batch::ContextState;

/// Result type alias using [`GatewayError`]
pub type Result<T> = std::result::Result<T, GatewayError>;

/// A failure reported by the spreadsheet host.
///
/// `code` follows the host's vocabulary (`ItemNotFound`, `InvalidArgument`,
/// `AccessDenied`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct HostError {
    pub code: String,
    pub message: String,
}

impl HostError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub(crate) fn connection(message: impl Into<String>) -> Self {
        Self::new("ConnectionLost", message)
    }
}

/// Everything that can go wrong inside a batch-context operation.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Command aborted: another command in the batch failed")]
    Aborted,

    #[error("Batch context was dropped before the command was flushed")]
    ContextDropped,

    #[error("Value read before the batch carrying it was flushed")]
    NotFlushed,

    #[error("Batch context is {0} and cannot accept work")]
    ContextClosed(ContextState),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error(transparent)]
    InvalidName(#[from] NameError),

    #[error("Failed to decode host value: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Failed to spawn host process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Host I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Host process not running")]
    NotRunning,

    #[error("Unexpected response data")]
    UnexpectedResponse,

    #[error("Launcher not found: {0}")]
    LauncherNotFound(String),

    #[error("Bridge executable not found at: {0}")]
    BridgeExeNotFound(String),
}

/// Why a single queued command produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CommandFailure {
    Host(HostError),
    Aborted,
}

impl From<CommandFailure> for GatewayError {
    fn from(failure: CommandFailure) -> Self {
        match failure {
            CommandFailure::Host(err) => GatewayError::Host(err),
            CommandFailure::Aborted => GatewayError::Aborted,
        }
    }
}
