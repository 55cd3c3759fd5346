use thiserror::Error;

use crate::transport::TransportStage;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("co-host capacity exceeded (max {max})")]
    CapacityExceeded { max: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("session start failed: {0}")]
    SessionStartFailed(String),

    #[error("join failed: {0}")]
    JoinFailed(String),

    #[error("transport error at {stage} stage: {message}")]
    Transport {
        stage: TransportStage,
        message: String,
    },

    #[error("signaling channel unavailable: {0}")]
    SignalingUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build a relay-level transport error tagged with the failed stage.
    pub fn transport(stage: TransportStage, message: impl Into<String>) -> Self {
        Self::Transport {
            stage,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
