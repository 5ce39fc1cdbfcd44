//! Provisioning: generate a key, commit it to the store, prove it reads back,
//! then format and open the device with it.

use super::{event, validate_identifier, WorkflowEvent, WorkflowLevel};
use crate::config::VaultlockerConfig;
use crate::error::{VaultlockerError, VaultlockerResult};
use crate::keymaterial::generate_key;
use crate::provider::{KeyMaterial, KeyRecord, LuksDriver, ReadOutcome, SecretPath, SecretStore};
use std::fmt;

/// Last stage a provisioning run reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStage {
    Generated,
    Committed,
    Verified,
    Applied,
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProvisionStage::Generated => "generated",
            ProvisionStage::Committed => "committed",
            ProvisionStage::Verified => "verified",
            ProvisionStage::Applied => "applied",
        };
        f.write_str(label)
    }
}

/// Outcome of a successful provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub identifier: String,
    pub path: SecretPath,
    pub stage: ProvisionStage,
    pub events: Vec<WorkflowEvent>,
}

/// Provision `device` under `identifier`.
///
/// The store is written before the device is touched, and the device is only
/// formatted once the stored key has been read back intact. If formatting,
/// settling, or opening fails, the committed key is deleted again so no
/// orphaned secret is left behind.
pub fn provision<S, D>(
    config: &VaultlockerConfig,
    store: &S,
    driver: &D,
    device: &str,
    identifier: &str,
) -> VaultlockerResult<ProvisionReport>
where
    S: SecretStore<Error = VaultlockerError>,
    D: LuksDriver<Error = VaultlockerError>,
{
    validate_identifier(identifier)?;
    let path = config.secret_path(identifier);
    let mut events = Vec::new();

    let key = generate_key()?;
    let mut stage = ProvisionStage::Generated;

    let record = KeyRecord {
        identifier: identifier.to_string(),
        key,
    };
    store.create_or_update(&path, &record)?;
    stage = advance(&mut events, stage, ProvisionStage::Committed, || {
        format!("Stored key for {identifier} at {path}")
    });

    verify(store, &path, &record.key)?;
    stage = advance(&mut events, stage, ProvisionStage::Verified, || {
        format!("Verified stored key for {identifier}")
    });

    if let Err(err) = apply(driver, &record.key, device, identifier) {
        return Err(roll_back(store, &path, device, stage, err));
    }
    stage = advance(&mut events, stage, ProvisionStage::Applied, || {
        format!("Formatted {device} as {identifier} and opened it")
    });

    Ok(ProvisionReport {
        identifier: identifier.to_string(),
        path,
        stage,
        events,
    })
}

fn advance(
    events: &mut Vec<WorkflowEvent>,
    from: ProvisionStage,
    to: ProvisionStage,
    message: impl FnOnce() -> String,
) -> ProvisionStage {
    log::debug!("provisioning stage {from} -> {to}");
    let level = if to == ProvisionStage::Applied {
        WorkflowLevel::Success
    } else {
        WorkflowLevel::Info
    };
    events.push(event(level, message()));
    to
}

fn verify<S>(store: &S, path: &SecretPath, expected: &KeyMaterial) -> VaultlockerResult<()>
where
    S: SecretStore<Error = VaultlockerError>,
{
    match store.read(path)? {
        ReadOutcome::Found(stored) if stored == *expected => Ok(()),
        ReadOutcome::Found(_) | ReadOutcome::NotFound => Err(VaultlockerError::KeyMismatch {
            path: path.to_string(),
        }),
    }
}

fn apply<D>(driver: &D, key: &KeyMaterial, device: &str, identifier: &str) -> VaultlockerResult<()>
where
    D: LuksDriver<Error = VaultlockerError>,
{
    driver.format(key, device, identifier)?;
    driver.settle(device, identifier)?;
    driver.open(key, identifier)
}

fn roll_back<S>(
    store: &S,
    path: &SecretPath,
    device: &str,
    stage: ProvisionStage,
    failure: VaultlockerError,
) -> VaultlockerError
where
    S: SecretStore<Error = VaultlockerError>,
{
    let output = device_output(failure);
    event(
        WorkflowLevel::Warn,
        format!("Provisioning of {device} aborted after stage {stage}; removing key at {path}"),
    );

    match store.delete(path) {
        Ok(()) => VaultlockerError::DeviceFailure {
            device: device.to_string(),
            output,
        },
        Err(rollback) => {
            event(
                WorkflowLevel::Error,
                format!("Unable to remove key at {path}: {rollback}"),
            );
            VaultlockerError::RollbackFailed {
                device: device.to_string(),
                output,
                rollback: Box::new(rollback),
            }
        }
    }
}

fn device_output(failure: VaultlockerError) -> String {
    match failure {
        VaultlockerError::DeviceFormat { output, .. }
        | VaultlockerError::DeviceOpen { output, .. }
        | VaultlockerError::DeviceFailure { output, .. } => output,
        other => other.to_string(),
    }
}
