//! `hubrelay` Core Library
//!
//! Shared functionality for `hubrelay` components:
//! - Layered relay configuration (defaults, TOML file, environment)
//! - Common error types
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod tracing_init;

pub use config::{DEFAULT_DEVICE_HUB_PORT, RelayConfig};
pub use error::{Error, Result};
