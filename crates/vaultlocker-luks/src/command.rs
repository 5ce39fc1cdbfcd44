//! Execution wrappers for invoking `cryptsetup` and `udevadm`.
//!
//! Shell integration stays isolated here so driver logic is testable with
//! fake binaries. Key material is only ever written to the child's stdin.

use log::debug;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use vaultlocker_core::error::{VaultlockerError, VaultlockerResult};
use vaultlocker_provider::{mapped_name, KeyMaterial};

/// Directory udev populates with filesystem-UUID symlinks.
pub(crate) const BY_UUID_DIR: &str = "/dev/disk/by-uuid";

#[derive(Debug)]
pub(crate) struct Output {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) status: i32,
}

impl Output {
    fn success(&self) -> bool {
        self.status == 0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CryptsetupCommand {
    binary: PathBuf,
}

impl CryptsetupCommand {
    pub(crate) fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Write a LUKS header to `device` whose UUID is `identifier`.
    pub(crate) fn luks_format(
        &self,
        key: &KeyMaterial,
        device: &str,
        identifier: &str,
    ) -> VaultlockerResult<()> {
        let format_error = |exit_code: i32, output: String| VaultlockerError::DeviceFormat {
            device: device.to_string(),
            exit_code,
            output,
        };

        let args = [
            "--batch-mode",
            "--uuid",
            identifier,
            "--key-file",
            "-",
            "luksFormat",
            device,
        ];
        let out = run(&self.binary, &args, Some(key.as_bytes()))
            .map_err(|err| format_error(-1, spawn_failure(&self.binary, &err)))?;
        if out.success() {
            return Ok(());
        }
        Err(format_error(out.status, output_diagnostic(&out)))
    }

    /// Open `UUID=<identifier>` as `crypt-<identifier>`.
    pub(crate) fn open(&self, key: &KeyMaterial, identifier: &str) -> VaultlockerResult<()> {
        let open_error = |exit_code: i32, output: String| VaultlockerError::DeviceOpen {
            identifier: identifier.to_string(),
            exit_code,
            output,
        };

        let source = format!("UUID={identifier}");
        let name = mapped_name(identifier);
        let args = [
            "--batch-mode",
            "--key-file",
            "-",
            "open",
            source.as_str(),
            name.as_str(),
            "--type",
            "luks",
        ];
        let out = run(&self.binary, &args, Some(key.as_bytes()))
            .map_err(|err| open_error(-1, spawn_failure(&self.binary, &err)))?;
        if out.success() {
            return Ok(());
        }
        Err(open_error(out.status, output_diagnostic(&out)))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct UdevadmCommand {
    binary: PathBuf,
}

impl UdevadmCommand {
    pub(crate) fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    /// Replay the add event for `device` and wait until the by-uuid link for
    /// `identifier` shows up.
    pub(crate) fn rescan(&self, device: &str, identifier: &str) -> VaultlockerResult<()> {
        let name_match = format!("--name-match={device}");
        self.checked(device, &["trigger", name_match.as_str(), "--action=add"])?;

        let exit_if_exists = format!("--exit-if-exists={BY_UUID_DIR}/{identifier}");
        self.checked(device, &["settle", exit_if_exists.as_str()])
    }

    fn checked(&self, device: &str, args: &[&str]) -> VaultlockerResult<()> {
        let settle_error = |exit_code: i32, output: String| VaultlockerError::DeviceFormat {
            device: device.to_string(),
            exit_code,
            output,
        };

        let out = run(&self.binary, args, None)
            .map_err(|err| settle_error(-1, spawn_failure(&self.binary, &err)))?;
        if out.success() {
            return Ok(());
        }
        Err(settle_error(
            out.status,
            format!("udevadm {}: {}", args[0], output_diagnostic(&out)),
        ))
    }
}

/// Run `binary` to completion, feeding `input` on stdin when given.
pub(crate) fn run(binary: &Path, args: &[&str], input: Option<&[u8]>) -> io::Result<Output> {
    debug!("running {} {}", binary.display(), args.join(" "));

    let mut command = Command::new(binary);
    command.args(args);
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    let mut child = command.spawn()?;

    if let Some(payload) = input {
        if let Some(mut stdin) = child.stdin.take() {
            // A tool that exits before draining stdin reports its own failure
            // through the exit status.
            match stdin.write_all(payload) {
                Err(err) if err.kind() != io::ErrorKind::BrokenPipe => return Err(err),
                _ => {}
            }
        }
    }

    let output = child.wait_with_output()?;
    Ok(Output {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status.code().unwrap_or(-1),
    })
}

fn spawn_failure(binary: &Path, err: &io::Error) -> String {
    format!("unable to run {}: {err}", binary.display())
}

/// Prefer stderr; fall back to stdout when the tool reported there.
pub(crate) fn output_diagnostic(output: &Output) -> String {
    let stderr = output.stderr.trim();
    let stdout = output.stdout.trim();
    if !stderr.is_empty() {
        stderr.to_string()
    } else if !stdout.is_empty() {
        stdout.to_string()
    } else {
        "no additional output".to_string()
    }
}
