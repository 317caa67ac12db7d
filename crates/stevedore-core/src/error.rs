//! Error types for stevedore-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] stevedore_config::ConfigError),

    #[error("Transport error: {0}")]
    Ssh(#[from] stevedore_ssh::SshError),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
