//! Error types for flowmeter.

use thiserror::Error;

/// Main error type for flowmeter operations.
#[derive(Error, Debug)]
pub enum FlowmeterError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The slot array of a counter could not be allocated
    #[error("Out of memory allocating {slots} slots for counter '{name}'")]
    OutOfMemory { name: String, slots: usize },

    /// A periodic task was launched twice
    #[error("Periodic task is already running")]
    AlreadyLaunched,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for FlowmeterError {
    fn from(e: ::config::ConfigError) -> Self {
        FlowmeterError::Config(e.to_string())
    }
}

/// Result type alias for flowmeter operations.
pub type Result<T> = std::result::Result<T, FlowmeterError>;
