use thiserror::Error;

use crate::engine::Operation;

/// Failures at the engine boundary, before anything touches client state.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("request could not complete: {0}")]
    Transport(String),
    #[error("engine returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("engine rejected the request: {0}")]
    Rejected(String),
    #[error("engine response could not be decoded: {0}")]
    Decode(String),
    #[error("invalid engine url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Everything the client surfaces to the player. None of these are fatal;
/// each leaves the last known-good turn state in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("{message}")]
    Transport {
        operation: Operation,
        message: String,
    },
    #[error("{message}")]
    Protocol {
        operation: Operation,
        message: String,
    },
    #[error("{0}")]
    IllegalSelection(String),
    #[error("{0}")]
    GodCardSelection(String),
    #[error("Still waiting for the engine to answer {operation}; try again in a moment.")]
    RequestPending { operation: Operation },
}

pub(crate) const RESTART_NOTICE: &str =
    "There was an error loading the game. Please start a new game.";

impl ClientError {
    pub fn from_engine(operation: Operation, error: EngineError) -> Self {
        match error {
            EngineError::Rejected(message) | EngineError::Status { message, .. }
                if !message.trim().is_empty() =>
            {
                ClientError::Transport { operation, message }
            }
            EngineError::Decode(_) => ClientError::Protocol {
                operation,
                message: RESTART_NOTICE.to_string(),
            },
            _ => ClientError::Transport {
                operation,
                message: operation.failure_notice().to_string(),
            },
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, ClientError::Protocol { .. })
    }
}
