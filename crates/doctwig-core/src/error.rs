//! Error types for template preparation

use thiserror::Error;

/// Errors that can occur while reading, repairing or writing a template part
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading the input or writing the output stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing a repair configuration file
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration parsed but is not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Charset label not known to the decoder
    #[error("Unknown charset: {0}")]
    UnknownCharset(String),
}

/// Result type for template operations
pub type Result<T> = std::result::Result<T, Error>;
