use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body the engine returns when it refuses an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineErrorBody {
    pub error: String,
}

impl EngineErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown game phase '{0}'")]
pub struct UnknownPhase(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown god card '{0}'")]
pub struct UnknownGodCard(pub String);
