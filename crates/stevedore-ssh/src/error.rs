//! Error types for the SSH transport

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SshError {
    #[error("Failed to connect to remote host: {0}")]
    ConnectionError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Exec failed: {0}")]
    ExecError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SshError>;
