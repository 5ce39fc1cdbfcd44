//! Driver contract for dm-crypt/LUKS block devices.
//!
//! A driver formats a raw block device with vaultlocker-managed key material
//! and maps it under the device-mapper as `crypt-<identifier>`. The mapping
//! itself is owned by the kernel; drivers only create it and check for it.

use crate::key::KeyMaterial;
use std::error::Error;

/// Prefix applied to the identifier to build the device-mapper name.
pub const MAPPED_NAME_PREFIX: &str = "crypt-";

/// Device-mapper name used for `identifier`.
pub fn mapped_name(identifier: &str) -> String {
    format!("{MAPPED_NAME_PREFIX}{identifier}")
}

/// Abstraction over the disk-encryption tool-chain.
pub trait LuksDriver {
    type Error: Error + Send + Sync + 'static;

    /// Initialise a LUKS header on `device` using `key`, recording `identifier`
    /// as the header UUID. Destroys any existing data on the device.
    fn format(&self, key: &KeyMaterial, device: &str, identifier: &str) -> Result<(), Self::Error>;

    /// Re-enumerate `device` and block until udev has published the
    /// `by-uuid` link for `identifier`. Must run between `format` and `open`.
    fn settle(&self, device: &str, identifier: &str) -> Result<(), Self::Error>;

    /// Map the formatted device for `identifier` using `key`.
    fn open(&self, key: &KeyMaterial, identifier: &str) -> Result<(), Self::Error>;

    /// Return true when the mapping for `identifier` already exists.
    fn exists(&self, identifier: &str) -> bool;
}
