//! Key lifecycle orchestration: provisioning of new devices and recovery of
//! existing ones.

mod provisioning;
mod recovery;

use crate::error::{VaultlockerError, VaultlockerResult};
use log::{error, info, warn};
use uuid::Uuid;

pub use provisioning::{provision, ProvisionReport, ProvisionStage};
pub use recovery::{recover, RecoveryOutcome, RecoveryReport};

/// Severity levels used when reporting workflow events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowLevel {
    Info,
    Success,
    Warn,
    Error,
}

/// Single line of output produced by a workflow step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowEvent {
    pub level: WorkflowLevel,
    pub message: String,
}

/// Record an event and mirror it to the log.
///
/// Messages must never contain key material.
pub(crate) fn event(level: WorkflowLevel, message: impl Into<String>) -> WorkflowEvent {
    let message = message.into();
    match level {
        WorkflowLevel::Info | WorkflowLevel::Success => info!("{message}"),
        WorkflowLevel::Warn => warn!("{message}"),
        WorkflowLevel::Error => error!("{message}"),
    }
    WorkflowEvent { level, message }
}

/// Fresh random (v4) identifier in hyphenated form.
pub fn new_identifier() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// Reject identifiers that cannot serve as both a store path component and a
/// device-mapper name suffix.
pub fn validate_identifier(identifier: &str) -> VaultlockerResult<()> {
    let invalid = |reason: &str| VaultlockerError::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason: reason.to_string(),
    };

    if identifier.is_empty() {
        return Err(invalid("identifier is empty"));
    }
    if identifier.starts_with('-') {
        return Err(invalid("identifier must not start with '-'"));
    }
    if identifier == "." || identifier == ".." {
        return Err(invalid("identifier must not be a relative path segment"));
    }
    if let Some(bad) = identifier
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.')))
    {
        return Err(invalid(&format!("unsupported character {bad:?}")));
    }
    Ok(())
}
