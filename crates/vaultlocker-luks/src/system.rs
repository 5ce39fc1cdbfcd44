//! System-backed `LuksDriver` implementation.

use crate::command::{CryptsetupCommand, UdevadmCommand};
use log::debug;
use std::env;
use std::path::{Path, PathBuf};
use vaultlocker_core::config::{detect_cryptsetup_path, detect_udevadm_path};
use vaultlocker_core::error::{VaultlockerError, VaultlockerResult};
use vaultlocker_core::VaultlockerConfig;
use vaultlocker_provider::{mapped_name, KeyMaterial, LuksDriver};

/// Driver that formats and opens devices with the host `cryptsetup`.
#[derive(Debug, Clone)]
pub struct SystemLuksDriver {
    cryptsetup: CryptsetupCommand,
    udevadm: UdevadmCommand,
    mapper_dir: PathBuf,
}

impl SystemLuksDriver {
    /// Build a driver from configuration, resolving tool binaries from the
    /// `[device]` overrides, then well-known locations, then `PATH`.
    pub fn from_config(config: &VaultlockerConfig) -> VaultlockerResult<Self> {
        let cryptsetup = resolve_binary(
            "cryptsetup",
            config.device.cryptsetup_path(),
            detect_cryptsetup_path,
        )?;
        let udevadm = resolve_binary("udevadm", config.device.udevadm_path(), detect_udevadm_path)?;
        debug!(
            "using {} and {}, mappings under {}",
            cryptsetup.display(),
            udevadm.display(),
            config.mapper_dir().display()
        );

        Ok(Self {
            cryptsetup: CryptsetupCommand::new(cryptsetup),
            udevadm: UdevadmCommand::new(udevadm),
            mapper_dir: config.mapper_dir().to_path_buf(),
        })
    }

    /// Device-mapper node an opened identifier appears as.
    pub fn mapped_path(&self, identifier: &str) -> PathBuf {
        self.mapper_dir.join(mapped_name(identifier))
    }
}

impl LuksDriver for SystemLuksDriver {
    type Error = VaultlockerError;

    fn format(&self, key: &KeyMaterial, device: &str, identifier: &str) -> VaultlockerResult<()> {
        self.cryptsetup.luks_format(key, device, identifier)
    }

    fn settle(&self, device: &str, identifier: &str) -> VaultlockerResult<()> {
        self.udevadm.rescan(device, identifier)
    }

    fn open(&self, key: &KeyMaterial, identifier: &str) -> VaultlockerResult<()> {
        self.cryptsetup.open(key, identifier)
    }

    fn exists(&self, identifier: &str) -> bool {
        self.mapped_path(identifier).exists()
    }
}

fn resolve_binary(
    name: &str,
    configured: Option<&Path>,
    detect: fn() -> Option<PathBuf>,
) -> VaultlockerResult<PathBuf> {
    if let Some(candidate) = configured {
        if !candidate.exists() {
            return Err(VaultlockerError::InvalidConfig(format!(
                "{name} binary not found at {}",
                candidate.display()
            )));
        }
        return Ok(candidate.to_path_buf());
    }

    detect().or_else(|| find_in_path(name)).ok_or_else(|| {
        VaultlockerError::InvalidConfig(format!(
            "unable to locate {name} binary; tried well-known sbin locations and PATH"
        ))
    })
}

fn find_in_path(binary: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}
