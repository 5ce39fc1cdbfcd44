//! Configuration model loaded once at startup and passed to every component.

use crate::error::{VaultlockerError, VaultlockerResult};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use vaultlocker_provider::SecretPath;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/vaultlocker/vaultlocker.toml";
pub const DEFAULT_MAPPER_DIR: &str = "/dev/mapper";
const HOSTNAME_SOURCES: &[&str] = &["/proc/sys/kernel/hostname", "/etc/hostname"];
pub(crate) const KNOWN_CRYPTSETUP_PATHS: &[&str] = &[
    "/usr/sbin/cryptsetup",
    "/sbin/cryptsetup",
    "/usr/bin/cryptsetup",
    "/bin/cryptsetup",
    "/usr/local/sbin/cryptsetup",
];
pub(crate) const KNOWN_UDEVADM_PATHS: &[&str] = &[
    "/usr/bin/udevadm",
    "/bin/udevadm",
    "/usr/sbin/udevadm",
    "/sbin/udevadm",
];

/// First candidate that exists on this host.
pub fn detect_binary_path(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}

pub fn detect_cryptsetup_path() -> Option<PathBuf> {
    detect_binary_path(KNOWN_CRYPTSETUP_PATHS)
}

pub fn detect_udevadm_path() -> Option<PathBuf> {
    detect_binary_path(KNOWN_UDEVADM_PATHS)
}

/// KV secrets engine schema. Only changes request/response shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum KvVersion {
    #[default]
    #[serde(rename = "1")]
    V1,
    #[serde(rename = "2")]
    V2,
}

/// Connection and credential settings for the Vault server.
#[derive(Clone, Serialize, Deserialize, JsonSchema)]
pub struct VaultConfig {
    /// Base URL, e.g. `https://vault.internal:8200`.
    pub url: String,

    /// AppRole role id. `approle` is accepted as an alias.
    #[serde(default, alias = "approle")]
    pub role_id: Option<String>,

    #[serde(default)]
    pub secret_id: Option<String>,

    /// Static token, used when no AppRole is configured.
    #[serde(default)]
    pub token: Option<String>,

    /// Mount point of the KV secrets engine holding the keys.
    pub backend: String,

    /// PEM bundle trusted in addition to the system roots.
    #[serde(default)]
    pub ca_bundle: Option<String>,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default = "default_auth_mount")]
    pub auth_mount: String,

    #[serde(default)]
    pub kv_version: KvVersion,

    /// Store keys under `<hostname>/<identifier>` instead of `<identifier>`.
    #[serde(default)]
    pub host_scoped_paths: bool,
}

fn default_auth_mount() -> String {
    "approle".to_string()
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultConfig")
            .field("url", &self.url)
            .field("role_id", &self.role_id)
            .field("secret_id", &self.secret_id.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("backend", &self.backend)
            .field("ca_bundle", &self.ca_bundle)
            .field("namespace", &self.namespace)
            .field("auth_mount", &self.auth_mount)
            .field("kv_version", &self.kv_version)
            .field("host_scoped_paths", &self.host_scoped_paths)
            .finish()
    }
}

impl VaultConfig {
    pub fn role_id(&self) -> Option<&str> {
        non_blank(self.role_id.as_deref())
    }

    pub fn secret_id(&self) -> Option<&str> {
        non_blank(self.secret_id.as_deref())
    }

    pub fn token(&self) -> Option<&str> {
        non_blank(self.token.as_deref())
    }

    pub fn namespace(&self) -> Option<&str> {
        non_blank(self.namespace.as_deref())
    }

    pub fn ca_bundle(&self) -> Option<&Path> {
        non_blank(self.ca_bundle.as_deref()).map(Path::new)
    }

    /// KV mount with surrounding slashes removed.
    pub fn mount(&self) -> &str {
        self.backend.trim().trim_matches('/')
    }
}

/// Device tool-chain overrides.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeviceCfg {
    #[serde(default)]
    pub cryptsetup_path: Option<String>,

    #[serde(default)]
    pub udevadm_path: Option<String>,

    #[serde(default = "default_mapper_dir")]
    pub mapper_dir: String,
}

fn default_mapper_dir() -> String {
    DEFAULT_MAPPER_DIR.to_string()
}

impl DeviceCfg {
    pub fn cryptsetup_path(&self) -> Option<&Path> {
        non_blank(self.cryptsetup_path.as_deref()).map(Path::new)
    }

    pub fn udevadm_path(&self) -> Option<&Path> {
        non_blank(self.udevadm_path.as_deref()).map(Path::new)
    }
}

impl Default for DeviceCfg {
    fn default() -> Self {
        Self {
            cryptsetup_path: None,
            udevadm_path: None,
            mapper_dir: default_mapper_dir(),
        }
    }
}

/// Top-level configuration snapshot loaded from disk.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VaultlockerConfig {
    pub vault: VaultConfig,

    #[serde(default)]
    pub device: DeviceCfg,

    /// Host identity used for host-scoped secret paths, resolved at load time.
    #[serde(skip)]
    pub host: Option<String>,

    #[serde(skip)]
    pub path: PathBuf,

    #[serde(skip)]
    pub format: ConfigFormat,
}

/// Tracks whether we parsed TOML or YAML.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Yaml,
}

impl ConfigFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                ConfigFormat::Yaml
            }
            _ => ConfigFormat::Toml,
        }
    }
}

impl VaultlockerConfig {
    pub fn default_path() -> &'static Path {
        Path::new(DEFAULT_CONFIG_PATH)
    }

    /// Read, parse, and validate a config file.
    ///
    /// A missing file is reported as `ConfigNotFound`; it is a startup error
    /// and never retried.
    pub fn load<P: AsRef<Path>>(path: P) -> VaultlockerResult<Self> {
        let mut cfg = Self::parse(path.as_ref())?;
        let issues = cfg.validate();
        if !issues.is_empty() {
            return Err(VaultlockerError::InvalidConfig(issues.join("; ")));
        }
        if cfg.vault.host_scoped_paths {
            cfg.host = Some(host_identity()?);
        }
        Ok(cfg)
    }

    /// Parse without validating; used by `validate` to report every issue.
    pub fn parse(path: &Path) -> VaultlockerResult<Self> {
        if !path.exists() {
            return Err(VaultlockerError::ConfigNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let format = ConfigFormat::for_path(path);
        let mut cfg = match format {
            ConfigFormat::Toml => {
                toml::from_str::<Self>(&contents).map_err(|source| VaultlockerError::Toml {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_str::<Self>(&contents).map_err(|source| VaultlockerError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?
            }
        };
        cfg.path = path.to_path_buf();
        cfg.format = format;
        debug!("loaded configuration from {}", path.display());
        Ok(cfg)
    }

    /// Best-effort validation pass returning human-readable issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let vault = &self.vault;

        let url = vault.url.trim();
        if url.is_empty() {
            issues.push("vault.url must be set".to_string());
        } else if !(url.starts_with("http://") || url.starts_with("https://")) {
            issues.push(format!("vault.url must start with http:// or https:// (got {url})"));
        }

        if vault.mount().is_empty() {
            issues.push("vault.backend must name the KV mount point".to_string());
        }

        if vault.role_id().is_none() && vault.token().is_none() {
            issues.push("vault.role_id (or vault.approle) or vault.token must be set".to_string());
        }

        if vault.auth_mount.trim().trim_matches('/').is_empty() {
            issues.push("vault.auth_mount must not be empty".to_string());
        }

        if let Some(bundle) = vault.ca_bundle() {
            if !bundle.is_file() {
                issues.push(format!("vault.ca_bundle {} does not exist", bundle.display()));
            }
        }

        if self.device.mapper_dir.trim().is_empty() {
            issues.push("device.mapper_dir must not be empty".to_string());
        }

        for (key, value) in [
            ("device.cryptsetup_path", &self.device.cryptsetup_path),
            ("device.udevadm_path", &self.device.udevadm_path),
        ] {
            if let Some(path) = non_blank(value.as_deref()) {
                if !Path::new(path).exists() {
                    issues.push(format!("{key} {path} does not exist"));
                }
            }
        }

        issues
    }

    /// Store location for `identifier` under this configuration.
    pub fn secret_path(&self, identifier: &str) -> SecretPath {
        let host = if self.vault.host_scoped_paths {
            self.host.as_deref()
        } else {
            None
        };
        SecretPath::for_identifier(identifier, host)
    }

    pub fn mapper_dir(&self) -> &Path {
        Path::new(self.device.mapper_dir.trim())
    }
}

/// Hostname of this machine, used as the host-scoped path prefix.
pub fn host_identity() -> VaultlockerResult<String> {
    HOSTNAME_SOURCES
        .iter()
        .filter_map(|source| fs::read_to_string(source).ok())
        .map(|raw| raw.trim().to_string())
        .find(|name| !name.is_empty())
        .ok_or_else(|| {
            VaultlockerError::InvalidConfig(
                "vault.host_scoped_paths is enabled but the hostname could not be determined"
                    .to_string(),
            )
        })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[vault]
url = "https://vault.internal:8200"
approle = "4b1c9d3e-role"
secret_id = "s3cr3t-id"
backend = "secrets"
"#;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_applies_defaults() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "vaultlocker.toml", SAMPLE);

        let cfg = VaultlockerConfig::load(&path).unwrap();
        assert_eq!(cfg.vault.role_id(), Some("4b1c9d3e-role"));
        assert_eq!(cfg.vault.kv_version, KvVersion::V1);
        assert_eq!(cfg.vault.auth_mount, "approle");
        assert_eq!(cfg.device.mapper_dir, DEFAULT_MAPPER_DIR);
        assert_eq!(cfg.format, ConfigFormat::Toml);
        assert_eq!(cfg.path, path);
    }

    #[test]
    fn load_reads_kv_version_two() {
        let dir = tempdir().unwrap();
        let contents = format!("{SAMPLE}kv_version = \"2\"\n");
        let path = write(dir.path(), "vaultlocker.toml", &contents);

        let cfg = VaultlockerConfig::load(&path).unwrap();
        assert_eq!(cfg.vault.kv_version, KvVersion::V2);
    }

    #[test]
    fn load_accepts_yaml() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "vaultlocker.yaml",
            "vault:\n  url: http://127.0.0.1:8200\n  token: root\n  backend: /secrets/\n",
        );

        let cfg = VaultlockerConfig::load(&path).unwrap();
        assert_eq!(cfg.format, ConfigFormat::Yaml);
        assert_eq!(cfg.vault.token(), Some("root"));
        assert_eq!(cfg.vault.mount(), "secrets");
    }

    #[test]
    fn missing_file_is_config_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        match VaultlockerConfig::load(&path) {
            Err(VaultlockerError::ConfigNotFound(reported)) => assert_eq!(reported, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parse_error_names_the_file_and_keeps_the_cause_as_source() {
        use std::error::Error as _;

        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "vaultlocker.toml",
            "[vault]\nurl = http://127.0.0.1:8200\n",
        );

        let err = VaultlockerConfig::load(&path).unwrap_err();
        assert!(matches!(err, VaultlockerError::Toml { .. }), "{err:?}");
        let rendered = err.to_string();
        assert_eq!(
            rendered,
            format!("failed to parse TOML configuration {}", path.display())
        );
        let cause = err.source().expect("parse error keeps its cause").to_string();
        assert!(!cause.is_empty());
        assert!(!rendered.contains(cause.trim()));
    }

    #[test]
    fn load_rejects_missing_credentials() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "vaultlocker.toml",
            "[vault]\nurl = \"https://vault\"\nbackend = \"secrets\"\n",
        );

        match VaultlockerConfig::load(&path) {
            Err(VaultlockerError::InvalidConfig(message)) => {
                assert!(message.contains("vault.token"), "{message}")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn validate_collects_every_issue() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "vaultlocker.toml",
            "[vault]\nurl = \"vault:8200\"\nbackend = \"/\"\nca_bundle = \"/nonexistent/ca.pem\"\n",
        );

        let cfg = VaultlockerConfig::parse(&path).unwrap();
        let issues = cfg.validate();
        assert_eq!(issues.len(), 4, "{issues:?}");
    }

    #[test]
    fn secret_path_honours_host_scoping() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "vaultlocker.toml", SAMPLE);
        let mut cfg = VaultlockerConfig::load(&path).unwrap();

        assert_eq!(cfg.secret_path("abc").as_str(), "abc");

        cfg.vault.host_scoped_paths = true;
        cfg.host = Some("storage-01".into());
        assert_eq!(cfg.secret_path("abc").as_str(), "storage-01/abc");
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "vaultlocker.toml", SAMPLE);
        let cfg = VaultlockerConfig::load(&path).unwrap();

        let rendered = format!("{:?}", cfg.vault);
        assert!(!rendered.contains("s3cr3t-id"));
        assert!(rendered.contains("4b1c9d3e-role"));
    }
}
