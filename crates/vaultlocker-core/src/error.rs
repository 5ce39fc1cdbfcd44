//! Error taxonomy shared by every vaultlocker crate.
//!
//! `BackendNotReady` is the only transient variant; everything else aborts the
//! current invocation on first occurrence.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultlockerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration file {} does not exist", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid identifier `{identifier}`: {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("unable to gather entropy for key material: {0}")]
    Entropy(String),

    #[error("vault is not ready: {0}")]
    BackendNotReady(String),

    #[error("vault authentication failed: {0}")]
    Auth(String),

    #[error("vault write to path {path} failed: {cause}")]
    StoreWrite { path: String, cause: String },

    #[error("vault read of path {path} failed: {cause}")]
    StoreRead { path: String, cause: String },

    #[error("vault delete of path {path} failed: {cause}")]
    StoreDelete { path: String, cause: String },

    #[error("key read back from vault path {path} does not match the generated key")]
    KeyMismatch { path: String },

    #[error("unable to locate key for {identifier}")]
    KeyNotFound { identifier: String },

    #[error("luksFormat of {device} failed with exit code {exit_code}: {output}")]
    DeviceFormat {
        device: String,
        exit_code: i32,
        output: String,
    },

    #[error("luksOpen of {identifier} failed with exit code {exit_code}: {output}")]
    DeviceOpen {
        identifier: String,
        exit_code: i32,
        output: String,
    },

    #[error("LUKS failure on {device}: {output}")]
    DeviceFailure { device: String, output: String },

    #[error("LUKS failure on {device}: {output}; removing the committed key also failed: {rollback}")]
    RollbackFailed {
        device: String,
        output: String,
        rollback: Box<VaultlockerError>,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("failed to parse TOML configuration {}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse YAML configuration {}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type VaultlockerResult<T> = Result<T, VaultlockerError>;

impl VaultlockerError {
    /// True for failures that may clear up on their own (sealed or
    /// uninitialised backend) and are therefore worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, VaultlockerError::BackendNotReady(_))
    }
}
