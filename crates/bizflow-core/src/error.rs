//! Bizflow error type.

use thiserror::Error;

/// Errors surfaced across crate boundaries.
#[derive(Debug, Error)]
pub enum BizflowError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BizflowError>;
