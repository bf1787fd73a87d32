//! Server setup errors

use std::path::PathBuf;

/// Errors raised while configuring or starting the server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration file could not be read
    #[error("cannot read {path}: {source}")]
    Read {
        /// File that was requested
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`crate::ServerConfig`]
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A setting is missing or out of range
    #[error("invalid setting: {0}")]
    Invalid(String),

    /// HTTP client could not be built
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),

    /// Language model adapter could not be built
    #[error("language model: {0}")]
    Model(#[from] parley_intent::ModelError),

    /// Logging could not be installed
    #[error("telemetry: {0}")]
    Telemetry(String),
}

impl ServerError {
    /// Create invalid-setting error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
