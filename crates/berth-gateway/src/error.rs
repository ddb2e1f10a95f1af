//! Error types for the Berth gateway.

use std::path::PathBuf;

use thiserror::Error;

use crate::runner::ExitOutcome;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid credential")]
    InvalidCredential,

    #[error("invalid host {0:?}")]
    InvalidHost(String),

    #[error("{tool} failed: {outcome}")]
    ExternalToolFailure { tool: String, outcome: ExitOutcome },

    #[error("{tool} did not finish within {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    #[error("no command configured for {0}")]
    NotConfigured(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("gateway {0} already registered")]
    AlreadyRegistered(String),

    #[error("unknown gateway {0}")]
    UnknownGateway(String),

    #[error("failed to parse gateways file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render gateways file: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("registration failed: {0}")]
    Registration(String),
}

impl GatewayError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| GatewayError::Io { path, source }
    }
}
