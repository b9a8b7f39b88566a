// src/error.rs

//! Error types for the rebuild engine

use thiserror::Error;

/// Errors that can occur while driving a rebuild session
#[derive(Error, Debug)]
pub enum Error {
    /// A build transcript could not be read
    ///
    /// Transcript reads are the one detector-adjacent failure that is not
    /// expressed as a state mutation: a missing or unreadable log aborts
    /// the round instead of being treated as "no matches".
    #[error("Failed to read build transcript '{path}': {reason}")]
    Transcript { path: String, reason: String },

    /// Sandbox tool invocation failed (spawn error or timeout)
    #[error("Sandbox invocation failed: {0}")]
    Sandbox(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file parse error
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Regex error
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for rebuild operations
pub type Result<T> = std::result::Result<T, Error>;
