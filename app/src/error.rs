//! FILENAME: app/src/error.rs
// PURPOSE: Errors raised by the host layer outside of individual commands.

use std::path::PathBuf;

use engine::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    #[error("logger already installed")]
    Logger(#[from] log::SetLoggerError),

    #[error("{0}")]
    Command(String),
}

impl From<String> for AppError {
    fn from(message: String) -> Self {
        AppError::Command(message)
    }
}
