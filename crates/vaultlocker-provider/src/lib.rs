#![forbid(unsafe_code)]

//! Contracts shared across vaultlocker.
//!
//! Workflows in `vaultlocker-core` are written against these traits so the
//! Vault client and the `cryptsetup` driver can be swapped for fakes in tests.

pub mod key;
pub mod luks;
pub mod store;

pub use key::KeyMaterial;
pub use luks::{mapped_name, LuksDriver, MAPPED_NAME_PREFIX};
pub use store::{KeyRecord, ReadOutcome, SecretPath, SecretStore};
