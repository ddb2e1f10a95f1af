//! Error types for the Berth registry.

use berth_core::InvalidName;
use thiserror::Error;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures surfaced by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid credential")]
    InvalidCredential,

    #[error("{kind} {name} already exists")]
    DuplicateName { kind: &'static str, name: String },

    #[error("version {version} of {application} already exists")]
    DuplicateVersion { application: String, version: String },

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    InvalidName(#[from] InvalidName),

    #[error("unknown application {0}")]
    UnknownApplication(String),

    #[error("unknown version {version} of {application}")]
    UnknownVersion { application: String, version: String },

    #[error("artifact for {application} {version} already uploaded")]
    ArtifactExists { application: String, version: String },

    #[error("artifact for {application} {version} not uploaded yet")]
    ArtifactMissing { application: String, version: String },

    #[error("registry already installed")]
    AlreadyInstalled,

    #[error("registry not installed")]
    NotInstalled,

    #[error("corrupt record {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of the underlying record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("upload stream failed after {written} bytes: {source}")]
    Stream {
        written: u64,
        source: std::io::Error,
    },

    #[error("{0} is not a directory")]
    NotADirectory(String),
}
