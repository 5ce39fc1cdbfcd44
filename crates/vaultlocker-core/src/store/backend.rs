//! KV secrets engine request shapes.

use crate::config::KvVersion;
use serde_json::{json, Map, Value};
use std::fmt;
use vaultlocker_provider::{KeyRecord, SecretPath};

/// Field holding the key inside a stored secret.
pub const KEY_FIELD: &str = "dmcrypt_key";

/// Per-version request/response layout of a KV engine mounted at `mount`.
///
/// Paths returned here are relative to `/v1/`.
pub trait SecretBackend: fmt::Debug + Send + Sync {
    fn version(&self) -> KvVersion;

    fn write_path(&self, mount: &str, path: &SecretPath) -> String;

    fn write_body(&self, record: &KeyRecord) -> Value;

    fn read_path(&self, mount: &str, path: &SecretPath) -> String;

    /// Key/value payload of a read response; `None` when the response carries
    /// no live data (e.g. a deleted KV v2 version).
    fn payload<'a>(&self, body: &'a Value) -> Option<&'a Map<String, Value>>;

    /// Path whose deletion removes every version of the secret.
    fn delete_path(&self, mount: &str, path: &SecretPath) -> String;
}

/// Unversioned KV engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct KvV1;

impl SecretBackend for KvV1 {
    fn version(&self) -> KvVersion {
        KvVersion::V1
    }

    fn write_path(&self, mount: &str, path: &SecretPath) -> String {
        format!("{mount}/{path}")
    }

    fn write_body(&self, record: &KeyRecord) -> Value {
        json!({ KEY_FIELD: record.key.expose() })
    }

    fn read_path(&self, mount: &str, path: &SecretPath) -> String {
        format!("{mount}/{path}")
    }

    fn payload<'a>(&self, body: &'a Value) -> Option<&'a Map<String, Value>> {
        body.get("data")?.as_object()
    }

    fn delete_path(&self, mount: &str, path: &SecretPath) -> String {
        format!("{mount}/{path}")
    }
}

/// Versioned KV engine; data lives under `data/`, history under `metadata/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KvV2;

impl SecretBackend for KvV2 {
    fn version(&self) -> KvVersion {
        KvVersion::V2
    }

    fn write_path(&self, mount: &str, path: &SecretPath) -> String {
        format!("{mount}/data/{path}")
    }

    fn write_body(&self, record: &KeyRecord) -> Value {
        json!({ "data": { KEY_FIELD: record.key.expose() } })
    }

    fn read_path(&self, mount: &str, path: &SecretPath) -> String {
        format!("{mount}/data/{path}")
    }

    fn payload<'a>(&self, body: &'a Value) -> Option<&'a Map<String, Value>> {
        body.get("data")?.get("data")?.as_object()
    }

    fn delete_path(&self, mount: &str, path: &SecretPath) -> String {
        format!("{mount}/metadata/{path}")
    }
}

pub fn backend_for(version: KvVersion) -> Box<dyn SecretBackend> {
    match version {
        KvVersion::V1 => Box::new(KvV1),
        KvVersion::V2 => Box::new(KvV2),
    }
}
