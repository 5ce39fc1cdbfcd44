//! In-memory store and driver doubles shared by unit tests.

use crate::config::{ConfigFormat, DeviceCfg, KvVersion, VaultConfig, VaultlockerConfig};
use crate::error::{VaultlockerError, VaultlockerResult};
use crate::provider::{KeyMaterial, KeyRecord, LuksDriver, ReadOutcome, SecretPath, SecretStore};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub(crate) fn config() -> VaultlockerConfig {
    crate::logging::init_test();
    VaultlockerConfig {
        vault: VaultConfig {
            url: "http://127.0.0.1:8200".into(),
            role_id: Some("role".into()),
            secret_id: None,
            token: None,
            backend: "secrets".into(),
            ca_bundle: None,
            namespace: None,
            auth_mount: "approle".into(),
            kv_version: KvVersion::V1,
            host_scoped_paths: false,
        },
        device: DeviceCfg::default(),
        host: None,
        path: PathBuf::from("/etc/vaultlocker/vaultlocker.toml"),
        format: ConfigFormat::Toml,
    }
}

#[derive(Default)]
pub(crate) struct StoreState {
    pub(crate) records: HashMap<String, KeyMaterial>,
    pub(crate) reads: usize,
    pub(crate) deletes: usize,
    pub(crate) corrupt_reads: bool,
    pub(crate) fail_reads: bool,
    pub(crate) fail_deletes: bool,
}

#[derive(Clone, Default)]
pub(crate) struct MockStore {
    pub(crate) state: Arc<Mutex<StoreState>>,
}

impl MockStore {
    pub(crate) fn with_record(path: &str, key: &str) -> Self {
        let store = Self::default();
        store
            .state
            .lock()
            .unwrap()
            .records
            .insert(path.to_string(), KeyMaterial::new(key));
        store
    }

    pub(crate) fn configure(&self, apply: impl FnOnce(&mut StoreState)) {
        apply(&mut self.state.lock().unwrap());
    }

    pub(crate) fn stored(&self, path: &str) -> Option<KeyMaterial> {
        self.state.lock().unwrap().records.get(path).cloned()
    }

    pub(crate) fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }

    pub(crate) fn deletes(&self) -> usize {
        self.state.lock().unwrap().deletes
    }
}

impl SecretStore for MockStore {
    type Error = VaultlockerError;

    fn create_or_update(&self, path: &SecretPath, record: &KeyRecord) -> VaultlockerResult<()> {
        self.state
            .lock()
            .unwrap()
            .records
            .insert(path.to_string(), record.key.clone());
        Ok(())
    }

    fn read(&self, path: &SecretPath) -> VaultlockerResult<ReadOutcome> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        if state.fail_reads {
            return Err(VaultlockerError::StoreRead {
                path: path.to_string(),
                cause: "HTTP 500".into(),
            });
        }
        if state.corrupt_reads {
            return Ok(ReadOutcome::Found(KeyMaterial::new("tampered")));
        }
        Ok(match state.records.get(path.as_str()) {
            Some(key) => ReadOutcome::Found(key.clone()),
            None => ReadOutcome::NotFound,
        })
    }

    fn delete(&self, path: &SecretPath) -> VaultlockerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.deletes += 1;
        if state.fail_deletes {
            return Err(VaultlockerError::StoreDelete {
                path: path.to_string(),
                cause: "HTTP 403: permission denied".into(),
            });
        }
        state.records.remove(path.as_str());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct DriverState {
    pub(crate) calls: Vec<String>,
    pub(crate) opened: HashSet<String>,
    pub(crate) formatted_keys: Vec<KeyMaterial>,
    pub(crate) opened_keys: Vec<KeyMaterial>,
    pub(crate) fail_format: bool,
    pub(crate) fail_settle: bool,
    pub(crate) fail_open: bool,
}

#[derive(Clone, Default)]
pub(crate) struct MockDriver {
    pub(crate) state: Arc<Mutex<DriverState>>,
}

impl MockDriver {
    pub(crate) fn configure(&self, apply: impl FnOnce(&mut DriverState)) {
        apply(&mut self.state.lock().unwrap());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl LuksDriver for MockDriver {
    type Error = VaultlockerError;

    fn format(&self, key: &KeyMaterial, device: &str, identifier: &str) -> VaultlockerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("format {device} {identifier}"));
        state.formatted_keys.push(key.clone());
        if state.fail_format {
            return Err(VaultlockerError::DeviceFormat {
                device: device.to_string(),
                exit_code: 1,
                output: format!("Cannot format device {device} which is still in use."),
            });
        }
        Ok(())
    }

    fn settle(&self, device: &str, identifier: &str) -> VaultlockerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("settle {device} {identifier}"));
        if state.fail_settle {
            return Err(VaultlockerError::DeviceFormat {
                device: device.to_string(),
                exit_code: 1,
                output: "timeout waiting for udev queue".into(),
            });
        }
        Ok(())
    }

    fn open(&self, key: &KeyMaterial, identifier: &str) -> VaultlockerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("open {identifier}"));
        state.opened_keys.push(key.clone());
        if state.fail_open {
            return Err(VaultlockerError::DeviceOpen {
                identifier: identifier.to_string(),
                exit_code: 2,
                output: "No key available with this passphrase.".into(),
            });
        }
        state.opened.insert(identifier.to_string());
        Ok(())
    }

    fn exists(&self, identifier: &str) -> bool {
        self.state.lock().unwrap().opened.contains(identifier)
    }
}
