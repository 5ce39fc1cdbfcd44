//! vaultlocker command-line interface: provision and reopen LUKS devices whose
//! keys live in Vault.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::info;
use schemars::schema_for;
use serde_json::to_string_pretty;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;
use vaultlocker_core::{
    config::{VaultlockerConfig, DEFAULT_CONFIG_PATH},
    logging, KvVersion, RecoveryOutcome, RetryPolicy, VaultConnector, VaultlockerService,
};
use vaultlocker_luks::SystemLuksDriver;

/// Top-level command-line options shared by every subcommand.
#[derive(Parser, Debug)]
#[command(
    name = "vaultlocker",
    version,
    about = "Encrypt block devices with LUKS keys stored in HashiCorp Vault."
)]
struct Cli {
    /// Keep retrying for this many seconds while Vault is sealed or unreachable
    /// (zero or negative: single attempt).
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    retry: i64,

    /// Path to the vaultlocker configuration file (TOML, or YAML for `.yaml`/`.yml`).
    /// The INI-style `/etc/vaultlocker/vaultlocker.conf` is not read and has to
    /// be converted to TOML.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a key, store it in Vault, then LUKS-format and open DEVICE.
    Encrypt {
        /// UUID to assign to the new LUKS header; generated when omitted.
        #[arg(long)]
        uuid: Option<Uuid>,

        /// Block device to format (e.g. /dev/vdb).
        device: String,
    },

    /// Fetch the key for ID from Vault and open the matching device.
    Decrypt {
        /// Identifier printed by `encrypt` (the LUKS UUID).
        id: String,
    },

    /// Validate the configuration file or emit its JSON schema.
    Validate {
        /// Output the JSON schema instead of validating a file.
        #[arg(long)]
        schema: bool,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("vaultlocker: {}", render_error(&err));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    logging::init("info");
    let cli = Cli::parse();
    let retry = RetryPolicy::from_secs(cli.retry);

    match cli.command {
        Commands::Encrypt { uuid, device } => {
            let service = build_service(&cli.config, retry)?;
            let identifier = uuid.map(|uuid| uuid.hyphenated().to_string());
            let report = service.encrypt(&device, identifier)?;
            println!("{}", report.identifier);
        }
        Commands::Decrypt { id } => {
            let service = build_service(&cli.config, retry)?;
            let report = service.decrypt(&id)?;
            if report.outcome == RecoveryOutcome::Skipped {
                info!("{} was already open", report.identifier);
            }
        }
        Commands::Validate { schema } => {
            if schema {
                let schema = schema_for!(VaultlockerConfig);
                println!("{}", to_string_pretty(&schema)?);
                return Ok(());
            }

            let cfg = VaultlockerConfig::parse(&cli.config)?;
            let issues = cfg.validate();
            if !issues.is_empty() {
                for issue in &issues {
                    eprintln!("  - {issue}");
                }
                bail!("configuration has {} issue(s)", issues.len());
            }
            println!(
                "Configuration valid (vault={}, mount={}, kv v{}).",
                cfg.vault.url.trim(),
                cfg.vault.mount(),
                match cfg.vault.kv_version {
                    KvVersion::V1 => 1,
                    KvVersion::V2 => 2,
                }
            );
        }
    }

    Ok(())
}

fn build_service(
    config_path: &Path,
    retry: RetryPolicy,
) -> Result<VaultlockerService<SystemLuksDriver, VaultConnector>> {
    let config = VaultlockerConfig::load(config_path)?;
    let driver = SystemLuksDriver::from_config(&config)?;
    Ok(VaultlockerService::vault(Arc::new(config), driver, retry))
}

/// Flatten the error chain onto one line; parser diagnostics span several.
fn render_error(err: &anyhow::Error) -> String {
    format!("{err:#}")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
