use thiserror::Error;

/// Errors raised inside the engine. None of them is allowed to stop the tick
/// loop; callers log them and fall back.
#[derive(Error, Debug)]
pub enum SimError {
    #[error("green-time policy failed: {0}")]
    Policy(String),

    #[error("counts feed unavailable: {0}")]
    Feed(String),

    #[error("event delivery failed: {0}")]
    Delivery(String),

    #[error("invalid control command: {0}")]
    InvalidCommand(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type SimResult<T> = std::result::Result<T, SimError>;
