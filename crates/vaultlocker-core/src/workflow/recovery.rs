//! Recovery: reopen a provisioned device with its stored key.

use super::{event, validate_identifier, WorkflowEvent, WorkflowLevel};
use crate::config::VaultlockerConfig;
use crate::error::{VaultlockerError, VaultlockerResult};
use crate::provider::{mapped_name, LuksDriver, ReadOutcome, SecretPath, SecretStore};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The mapping already existed; nothing was read or opened.
    Skipped,
    Opened,
}

#[derive(Debug, Clone)]
pub struct RecoveryReport {
    pub identifier: String,
    pub path: SecretPath,
    pub outcome: RecoveryOutcome,
    pub events: Vec<WorkflowEvent>,
}

/// Open the device provisioned under `identifier`.
///
/// Safe to repeat: once `crypt-<identifier>` exists the store is not
/// consulted again.
pub fn recover<S, D>(
    config: &VaultlockerConfig,
    store: &S,
    driver: &D,
    identifier: &str,
) -> VaultlockerResult<RecoveryReport>
where
    S: SecretStore<Error = VaultlockerError>,
    D: LuksDriver<Error = VaultlockerError>,
{
    validate_identifier(identifier)?;
    let path = config.secret_path(identifier);
    let mut events = Vec::new();

    if driver.exists(identifier) {
        events.push(event(
            WorkflowLevel::Info,
            format!("{} already open, skipping", mapped_name(identifier)),
        ));
        return Ok(RecoveryReport {
            identifier: identifier.to_string(),
            path,
            outcome: RecoveryOutcome::Skipped,
            events,
        });
    }

    let key = match store.read(&path) {
        Ok(ReadOutcome::Found(key)) => key,
        Ok(ReadOutcome::NotFound) => {
            return Err(VaultlockerError::KeyNotFound {
                identifier: identifier.to_string(),
            })
        }
        Err(err) => {
            debug!("reading {path} failed: {err}");
            return Err(VaultlockerError::KeyNotFound {
                identifier: identifier.to_string(),
            });
        }
    };

    driver
        .open(&key, identifier)
        .map_err(|err| VaultlockerError::DeviceFailure {
            device: format!("UUID={identifier}"),
            output: match err {
                VaultlockerError::DeviceOpen { output, .. } => output,
                other => other.to_string(),
            },
        })?;
    events.push(event(
        WorkflowLevel::Success,
        format!("Opened UUID={identifier} as {}", mapped_name(identifier)),
    ));

    Ok(RecoveryReport {
        identifier: identifier.to_string(),
        path,
        outcome: RecoveryOutcome::Opened,
        events,
    })
}
