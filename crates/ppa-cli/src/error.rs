//! Error types for PPA CLI.
//!
//! CliError wraps CoreError from the shared library and adds CLI-specific variants.

use ppa_core::error::{ClientError, CoreError, ProtocolError};
use thiserror::Error;

/// Exit codes for the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NETWORK_ERROR: i32 = 2;
    pub const INVALID_ARGS: i32 = 4;
}

/// Main error type for the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(e) => match e {
                CoreError::Io(_) | CoreError::Interface(_) => exit_codes::NETWORK_ERROR,
                CoreError::Client(ClientError::WriteTimeout(_)) => exit_codes::NETWORK_ERROR,
                CoreError::Client(_) => exit_codes::GENERAL_ERROR,
                CoreError::Protocol(ProtocolError::InvalidVolume(_)) => exit_codes::INVALID_ARGS,
                CoreError::Protocol(_) => exit_codes::GENERAL_ERROR,
                CoreError::Other(_) => exit_codes::GENERAL_ERROR,
            },
            CliError::InvalidArgument(_) => exit_codes::INVALID_ARGS,
        }
    }
}

impl From<ClientError> for CliError {
    fn from(e: ClientError) -> Self {
        CliError::Core(CoreError::Client(e))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
