//! Error types for `hubrelay` core library.

use thiserror::Error;

/// Result type alias using `hubrelay` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `hubrelay` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML deserialization error
    #[error("TOML error")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
