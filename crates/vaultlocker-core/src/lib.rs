//! Core building blocks shared by vaultlocker binaries.
//!
//! Configuration, the Vault client, key lifecycle workflows, and the retrying
//! service live here so the CLI only has to parse arguments and print results.

pub mod config;
pub mod error;
pub mod keymaterial;
pub mod logging;
pub mod provider;
pub mod retry;
pub mod service;
pub mod store;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use config::{ConfigFormat, DeviceCfg, KvVersion, VaultConfig, VaultlockerConfig};
pub use error::{VaultlockerError, VaultlockerResult};
pub use keymaterial::generate_key;
pub use provider::{KeyMaterial, LuksDriver, ReadOutcome, SecretPath, SecretStore};
pub use retry::RetryPolicy;
pub use service::{VaultConnector, VaultlockerService};
pub use store::VaultClient;
pub use workflow::{ProvisionReport, ProvisionStage, RecoveryOutcome, RecoveryReport};
