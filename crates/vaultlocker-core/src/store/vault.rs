//! Blocking Vault HTTP client.

use super::backend::{backend_for, SecretBackend, KEY_FIELD};
use crate::config::VaultConfig;
use crate::error::{VaultlockerError, VaultlockerResult};
use log::{debug, info};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Certificate, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs;
use std::time::Duration;
use vaultlocker_provider::{KeyMaterial, KeyRecord, ReadOutcome, SecretPath, SecretStore};
use zeroize::Zeroizing;

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Authenticated session against one Vault server and KV mount.
pub struct VaultClient {
    http: Client,
    base_url: String,
    token: Zeroizing<String>,
    namespace: Option<String>,
    mount: String,
    backend: Box<dyn SecretBackend>,
}

impl fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultClient")
            .field("base_url", &self.base_url)
            .field("namespace", &self.namespace)
            .field("mount", &self.mount)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct AppRoleLogin<'a> {
    role_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: Option<LoginAuth>,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

#[derive(Deserialize)]
struct VaultErrors {
    #[serde(default)]
    errors: Vec<String>,
}

impl VaultClient {
    /// Build the HTTP client and authenticate.
    ///
    /// AppRole credentials take precedence over a static token. A sealed,
    /// uninitialised, or unreachable server fails with `BackendNotReady`;
    /// rejected credentials fail with `Auth`.
    pub fn connect(config: &VaultConfig) -> VaultlockerResult<Self> {
        let http = build_http_client(config)?;
        let base_url = config.url.trim().trim_end_matches('/').to_string();
        let namespace = config.namespace().map(str::to_string);

        let mut client = Self {
            http,
            base_url,
            token: Zeroizing::new(String::new()),
            namespace,
            mount: config.mount().to_string(),
            backend: backend_for(config.kv_version),
        };

        if let Some(role_id) = config.role_id() {
            let token = client.approle_login(
                config.auth_mount.trim().trim_matches('/'),
                role_id,
                config.secret_id(),
            )?;
            client.token = token;
        } else {
            let token = config.token().ok_or_else(|| {
                VaultlockerError::Auth("no AppRole or token credentials configured".into())
            })?;
            client.token = Zeroizing::new(token.to_string());
            client.lookup_self()?;
        }

        info!(
            "authenticated to vault at {} (kv {:?}, mount {})",
            client.base_url,
            client.backend.version(),
            client.mount
        );
        Ok(client)
    }

    fn endpoint(&self, api_path: &str) -> String {
        format!("{}/v1/{}", self.base_url, api_path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, api_path: &str) -> RequestBuilder {
        let mut builder = self.http.request(method, self.endpoint(api_path));
        if !self.token.is_empty() {
            builder = builder.header(TOKEN_HEADER, self.token.as_str());
        }
        if let Some(namespace) = &self.namespace {
            builder = builder.header(NAMESPACE_HEADER, namespace);
        }
        builder
    }

    fn approle_login(
        &self,
        auth_mount: &str,
        role_id: &str,
        secret_id: Option<&str>,
    ) -> VaultlockerResult<Zeroizing<String>> {
        let api_path = format!("auth/{auth_mount}/login");
        debug!("logging in to vault via {api_path}");
        let response = self
            .request(Method::POST, &api_path)
            .json(&AppRoleLogin { role_id, secret_id })
            .send()
            .map_err(|err| self.connect_error(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(auth_failure(status, response));
        }

        let parsed: LoginResponse = response.json().map_err(|err| {
            VaultlockerError::Auth(format!("unreadable AppRole login response: {err}"))
        })?;
        parsed
            .auth
            .map(|auth| Zeroizing::new(auth.client_token))
            .filter(|token| !token.is_empty())
            .ok_or_else(|| VaultlockerError::Auth("AppRole login returned no client token".into()))
    }

    fn lookup_self(&self) -> VaultlockerResult<()> {
        let response = self
            .request(Method::GET, "auth/token/lookup-self")
            .send()
            .map_err(|err| self.connect_error(err))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(auth_failure(status, response))
        }
    }

    fn connect_error(&self, err: reqwest::Error) -> VaultlockerError {
        if err.is_connect() || err.is_timeout() {
            VaultlockerError::BackendNotReady(format!("unable to reach {}: {err}", self.base_url))
        } else {
            VaultlockerError::Auth(format!("request to {} failed: {err}", self.base_url))
        }
    }
}

impl SecretStore for VaultClient {
    type Error = VaultlockerError;

    fn create_or_update(&self, path: &SecretPath, record: &KeyRecord) -> VaultlockerResult<()> {
        let write_error = |cause: String| VaultlockerError::StoreWrite {
            path: path.to_string(),
            cause,
        };

        let response = self
            .request(Method::POST, &self.backend.write_path(&self.mount, path))
            .json(&self.backend.write_body(record))
            .send()
            .map_err(|err| write_error(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("stored key for {} at {}/{}", record.identifier, self.mount, path);
            Ok(())
        } else {
            Err(write_error(describe_failure(status, response)))
        }
    }

    fn read(&self, path: &SecretPath) -> VaultlockerResult<ReadOutcome> {
        let read_error = |cause: String| VaultlockerError::StoreRead {
            path: path.to_string(),
            cause,
        };

        let response = self
            .request(Method::GET, &self.backend.read_path(&self.mount, path))
            .send()
            .map_err(|err| read_error(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(ReadOutcome::NotFound);
        }
        if !status.is_success() {
            return Err(read_error(describe_failure(status, response)));
        }

        let body: Value = response
            .json()
            .map_err(|err| read_error(format!("unreadable response: {err}")))?;
        let Some(payload) = self.backend.payload(&body) else {
            return Ok(ReadOutcome::NotFound);
        };

        payload
            .get(KEY_FIELD)
            .and_then(Value::as_str)
            .map(|key| ReadOutcome::Found(KeyMaterial::new(key)))
            .ok_or_else(|| read_error(format!("secret has no `{KEY_FIELD}` string field")))
    }

    fn delete(&self, path: &SecretPath) -> VaultlockerResult<()> {
        let delete_error = |cause: String| VaultlockerError::StoreDelete {
            path: path.to_string(),
            cause,
        };

        let response = self
            .request(Method::DELETE, &self.backend.delete_path(&self.mount, path))
            .send()
            .map_err(|err| delete_error(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(delete_error(describe_failure(status, response)))
        }
    }
}

/// Calls wait as long as the server takes; reqwest's blocking default of 30s
/// is switched off.
fn build_http_client(config: &VaultConfig) -> VaultlockerResult<Client> {
    let mut builder = Client::builder().timeout(None::<Duration>);
    if let Some(bundle) = config.ca_bundle() {
        let pem = fs::read(bundle).map_err(|err| {
            VaultlockerError::InvalidConfig(format!(
                "unable to read vault.ca_bundle {}: {err}",
                bundle.display()
            ))
        })?;
        let certs = Certificate::from_pem_bundle(&pem).map_err(|err| {
            VaultlockerError::InvalidConfig(format!(
                "vault.ca_bundle {} is not a PEM bundle: {err}",
                bundle.display()
            ))
        })?;
        for cert in certs {
            builder = builder.add_root_certificate(cert);
        }
    }
    builder
        .build()
        .map_err(|err| VaultlockerError::InvalidConfig(format!("unable to build HTTP client: {err}")))
}

/// Classify a failed authentication call.
fn auth_failure(status: StatusCode, response: Response) -> VaultlockerError {
    let detail = describe_failure(status, response);
    match status {
        StatusCode::NOT_IMPLEMENTED => {
            VaultlockerError::BackendNotReady(format!("vault is not initialized ({detail})"))
        }
        StatusCode::SERVICE_UNAVAILABLE => {
            VaultlockerError::BackendNotReady(format!("vault is sealed or unavailable ({detail})"))
        }
        _ => VaultlockerError::Auth(detail),
    }
}

fn describe_failure(status: StatusCode, response: Response) -> String {
    let body = response.text().unwrap_or_default();
    let errors = serde_json::from_str::<VaultErrors>(&body)
        .map(|parsed| parsed.errors.join("; "))
        .unwrap_or_else(|_| body.trim().to_string());
    if errors.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("HTTP {}: {errors}", status.as_u16())
    }
}
