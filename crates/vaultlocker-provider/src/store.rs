//! Secret-store contract.
//!
//! Stores hold one record per identifier. Absence of a record is a normal
//! outcome (`ReadOutcome::NotFound`), not an error, so callers decide whether
//! a missing key is exceptional.

use crate::key::KeyMaterial;
use std::error::Error;
use std::fmt;

/// Location of a key record inside the store, relative to the KV mount.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretPath(String);

impl SecretPath {
    /// Derive the path for `identifier`, optionally scoped under `host`.
    ///
    /// The mapping is pure: the same inputs always yield the same path, which
    /// is what makes recovery by identifier repeatable.
    pub fn for_identifier(identifier: &str, host: Option<&str>) -> Self {
        match host.map(str::trim).filter(|host| !host.is_empty()) {
            Some(host) => Self(format!("{host}/{identifier}")),
            None => Self(identifier.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One key and the identifier it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub identifier: String,
    pub key: KeyMaterial,
}

/// Result of looking a record up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found(KeyMaterial),
    NotFound,
}

impl ReadOutcome {
    pub fn into_key(self) -> Option<KeyMaterial> {
        match self {
            ReadOutcome::Found(key) => Some(key),
            ReadOutcome::NotFound => None,
        }
    }
}

/// Create/read/delete of key records over an authenticated session.
pub trait SecretStore {
    type Error: Error + Send + Sync + 'static;

    /// Write `record` at `path`, replacing any existing record.
    fn create_or_update(&self, path: &SecretPath, record: &KeyRecord) -> Result<(), Self::Error>;

    /// Fetch the key currently stored at `path`.
    fn read(&self, path: &SecretPath) -> Result<ReadOutcome, Self::Error>;

    /// Remove every version of the record at `path`.
    fn delete(&self, path: &SecretPath) -> Result<(), Self::Error>;
}
