//! Error types for pasos

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No value bound for input: {0}")]
    UnboundInput(String),

    #[error("Shared variable updated more than once: {0}")]
    DuplicateUpdate(String),

    #[error("Training algorithm has not been initialized")]
    NotInitialized,

    #[error("Training algorithm is already initialized")]
    AlreadyInitialized,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
