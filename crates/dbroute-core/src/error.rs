//! Error types for dbroute Core

use crate::config::Role;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration not found")]
    ConfigNotFound,

    #[error("No {role} hosts configured")]
    NoHosts { role: Role },

    // Connection errors
    #[error("Failed to connect to {host}: {message}")]
    Connect { host: String, message: String },

    #[error("Connection to {host} timed out after {}ms", timeout.as_millis())]
    ConnectTimeout { host: String, timeout: Duration },

    #[error("Could not connect to any {role} host after {attempts} attempt(s) (last host: {last_host})")]
    ConnectionExhausted {
        role: Role,
        attempts: u32,
        last_host: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error stems from invalid or incomplete configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::ConfigNotFound | Error::NoHosts { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
