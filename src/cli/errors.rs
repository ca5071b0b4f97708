//! CLI-specific error type
//!
//! Everything that reaches main is fatal; the variants exist so each
//! subsystem's failure prints with its own message.

use thiserror::Error;

use crate::config::ConfigError;
use crate::container::ContainerError;
use crate::save::SaveError;
use crate::state::StateError;
use crate::store::StoreError;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("container: {0}")]
    Container(#[from] ContainerError),

    #[error("save: {0}")]
    Save(#[from] SaveError),

    #[error("state: {0}")]
    State(#[from] StateError),

    #[error("io: {0}")]
    Io(String),

    #[error("{0}")]
    Input(String),
}

impl CliError {
    pub fn io(e: impl std::fmt::Display) -> Self {
        CliError::Io(e.to_string())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        CliError::Input(msg.into())
    }
}
