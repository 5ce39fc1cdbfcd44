//! Entry points used by the CLI: one retryable "connect, then run a workflow"
//! unit per invocation.

use crate::config::{VaultConfig, VaultlockerConfig};
use crate::error::{VaultlockerError, VaultlockerResult};
use crate::provider::{LuksDriver, SecretStore};
use crate::retry::RetryPolicy;
use crate::store::VaultClient;
use crate::workflow::{
    new_identifier, provision, recover, validate_identifier, ProvisionReport, RecoveryReport,
};
use log::debug;
use std::sync::Arc;

/// Signature of the default connector.
pub type VaultConnector = fn(&VaultConfig) -> VaultlockerResult<VaultClient>;

/// Couples configuration, a store connector, and a device driver.
///
/// A fresh store session is opened for every attempt so that a sealed or
/// restarting Vault is picked up again on retry.
pub struct VaultlockerService<D, C> {
    config: Arc<VaultlockerConfig>,
    connect: C,
    driver: D,
    retry: RetryPolicy,
}

impl<D> VaultlockerService<D, VaultConnector>
where
    D: LuksDriver<Error = VaultlockerError>,
{
    /// Service backed by the real Vault HTTP client.
    pub fn vault(config: Arc<VaultlockerConfig>, driver: D, retry: RetryPolicy) -> Self {
        Self::new(config, VaultClient::connect as VaultConnector, driver, retry)
    }
}

impl<D, C> VaultlockerService<D, C>
where
    D: LuksDriver<Error = VaultlockerError>,
{
    pub fn new(config: Arc<VaultlockerConfig>, connect: C, driver: D, retry: RetryPolicy) -> Self {
        Self {
            config,
            connect,
            driver,
            retry,
        }
    }

    pub fn config(&self) -> &VaultlockerConfig {
        &self.config
    }

    /// Provision `device`, generating an identifier when none is given.
    ///
    /// The identifier is fixed before the first attempt so retries never
    /// scatter keys across several paths.
    pub fn encrypt<S>(
        &self,
        device: &str,
        identifier: Option<String>,
    ) -> VaultlockerResult<ProvisionReport>
    where
        C: Fn(&VaultConfig) -> VaultlockerResult<S>,
        S: SecretStore<Error = VaultlockerError>,
    {
        let identifier = identifier.unwrap_or_else(new_identifier);
        validate_identifier(&identifier)?;
        debug!("provisioning {device} as {identifier}");

        self.retry.run(
            || {
                let store = (self.connect)(&self.config.vault)?;
                provision(&self.config, &store, &self.driver, device, &identifier)
            },
            VaultlockerError::is_transient,
        )
    }

    /// Open the device provisioned under `identifier`.
    pub fn decrypt<S>(&self, identifier: &str) -> VaultlockerResult<RecoveryReport>
    where
        C: Fn(&VaultConfig) -> VaultlockerResult<S>,
        S: SecretStore<Error = VaultlockerError>,
    {
        validate_identifier(identifier)?;
        self.retry.run(
            || {
                let store = (self.connect)(&self.config.vault)?;
                recover(&self.config, &store, &self.driver, identifier)
            },
            VaultlockerError::is_transient,
        )
    }
}
