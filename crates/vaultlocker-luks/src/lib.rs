#![forbid(unsafe_code)]

//! System driver for LUKS-formatted block devices.
//!
//! Integrates with the host via:
//! - `cryptsetup` (luksFormat/open, key on stdin)
//! - `udevadm` (trigger/settle so `/dev/disk/by-uuid` catches up after formatting)

mod command;
mod system;

pub use system::SystemLuksDriver;
