//! Contracts used by `vaultlocker-core` workflows.
//!
//! The traits and shared value types are sourced from `vaultlocker-provider` so
//! that driver crates such as `vaultlocker-luks` can implement them without
//! depending on the workflow layer.

pub use vaultlocker_provider::key::KeyMaterial;
pub use vaultlocker_provider::luks::{mapped_name, LuksDriver, MAPPED_NAME_PREFIX};
pub use vaultlocker_provider::store::{KeyRecord, ReadOutcome, SecretPath, SecretStore};
