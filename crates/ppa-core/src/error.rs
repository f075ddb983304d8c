//! Error types for PPA core.

use thiserror::Error;

/// Core error type for shared operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Interface error: {0}")]
    Interface(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Wire codec errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("Short buffer: need {needed} bytes, got {got}")]
    ShortBuffer { needed: usize, got: usize },

    #[error("Volume {0} is outside 0.0..=1.0")]
    InvalidVolume(f32),

    #[error("Live command path has {0} entries, at most 5 allowed")]
    PathTooLong(usize),
}

/// Client lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Client for {0} already exists")]
    Exists(String),

    #[error("Client for {0} not found")]
    NotFound(String),

    #[error("Client is busy with {0}")]
    Busy(String),

    #[error("Client {0} is already running")]
    AlreadyRunning(String),

    #[error("Write to {0} timed out")]
    WriteTimeout(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
