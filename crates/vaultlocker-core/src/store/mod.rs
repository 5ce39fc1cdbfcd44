//! Secret-store integration.
//!
//! `VaultClient` talks to the Vault HTTP API over one authenticated session.
//! The KV engine version only changes request paths and payload shape, so it
//! is isolated behind the `SecretBackend` strategy picked at construction.

mod backend;
mod vault;

pub use backend::{backend_for, KvV1, KvV2, SecretBackend, KEY_FIELD};
pub use vault::VaultClient;
