//! Crate-level error taxonomy.
//!
//! Packet loss is never an error here: it is absorbed by the sampler's
//! round/tolerance arithmetic. Only conditions that prevent a fetch cycle
//! from producing trustworthy output surface as [`PingError`].

use thiserror::Error;

use crate::config::ConfigError;
use crate::probe::ProbeError;

/// Errors that abort endpoint resolution or a fetch cycle.
#[derive(Debug, Error)]
pub enum PingError {
    /// Sampling parameters are unusable (e.g. non-positive round count).
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A host specification token had an empty host portion.
    #[error("malformed host token: '{0}'")]
    MalformedToken(String),

    /// Hostname lookup failed while resolving in strict mode.
    #[error("failed to resolve host '{host}': {source}")]
    Resolution {
        /// Host that could not be resolved.
        host: String,
        /// Underlying lookup error.
        #[source]
        source: std::io::Error,
    },

    /// The echo prober could not run a round at all.
    #[error("probe dispatch failed: {0}")]
    ProbeDispatch(#[from] ProbeError),

    /// Configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Writing plugin output failed.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),

    /// Serializing graph definitions failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate result alias.
pub type Result<T, E = PingError> = std::result::Result<T, E>;
