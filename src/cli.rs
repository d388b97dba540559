//! Command-line interface definitions
//!
//! The `gatedfs` binary mounts an in-memory storage service and runs
//! filesystem commands read one per line. Arguments are grouped by the
//! component that consumes them.

use crate::backends::{MemoryStorage, OpenDelivery};
use crate::error::FsError;
use crate::fs::GatedFs;
use crate::gate::CallbackDelivery;
use crate::node::OpenFlags;
use crate::storage::StorageService;
use anyhow::{anyhow, bail, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::time::Duration;

/// Run filesystem commands against a gated in-memory storage service
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Mount configuration
    #[command(flatten)]
    pub mount: MountConfig,

    /// Output and logging configuration
    #[command(flatten)]
    pub output: OutputConfig,
}

/// Mount configuration
///
/// Used by: `MountArgs::parse()`, `MemoryStorage`
#[derive(clap::Args, Debug, Clone)]
#[command(next_help_heading = "Mount Options")]
pub struct MountConfig {
    /// Mount option as KEY=VALUE (type, expected_size, filesystem_resource, SOURCE)
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub options: Vec<(String, String)>,

    /// Open the filesystem with a blocking call instead of a completion callback
    #[arg(long)]
    pub blocking_open: bool,

    /// Milliseconds before the asynchronous open completes
    #[arg(long, default_value = "0")]
    pub open_delay_ms: u64,
}

impl MountConfig {
    #[must_use]
    pub const fn delivery(&self) -> CallbackDelivery {
        if self.blocking_open {
            CallbackDelivery::Unavailable
        } else {
            CallbackDelivery::Available
        }
    }

    /// A storage service configured for these options
    #[must_use]
    pub fn storage(&self) -> MemoryStorage {
        let delivery = if self.open_delay_ms == 0 {
            OpenDelivery::Immediate
        } else {
            OpenDelivery::Deferred(Duration::from_millis(self.open_delay_ms))
        };
        MemoryStorage::new().with_delivery(delivery)
    }
}

/// Output and logging configuration
///
/// Used by: `main()`
#[derive(clap::Args, Debug, Clone)]
#[command(next_help_heading = "Output Options")]
pub struct OutputConfig {
    /// Log storage requests and gate transitions
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{s}'"))?;
    Ok((key.to_string(), value.to_string()))
}

/// One line of a command script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Access(String),
    Open(String, OpenFlags),
    Mkdir(String),
    Rmdir(String),
    Unlink(String),
    Remove(String),
    Rename(String, String),
}

impl Command {
    /// Parse a script line; blank lines and `#` comments give `None`
    ///
    /// # Errors
    ///
    /// Returns an error for unknown commands, missing arguments, or unknown
    /// open modes.
    pub fn parse_line(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let command = match words.as_slice() {
            ["access", path] => Self::Access((*path).to_string()),
            ["open", path] => Self::Open((*path).to_string(), OpenFlags::READ_ONLY),
            ["open", path, mode] => Self::Open((*path).to_string(), parse_mode(mode)?),
            ["mkdir", path] => Self::Mkdir((*path).to_string()),
            ["rmdir", path] => Self::Rmdir((*path).to_string()),
            ["unlink", path] => Self::Unlink((*path).to_string()),
            ["remove", path] => Self::Remove((*path).to_string()),
            ["rename", from, to] => Self::Rename((*from).to_string(), (*to).to_string()),
            [name, ..] => bail!("unknown command or wrong arguments: '{name}'"),
            [] => return Ok(None),
        };
        Ok(Some(command))
    }

    /// Run the command against a mounted filesystem
    ///
    /// # Errors
    ///
    /// Returns the filesystem error; on success a short description.
    pub fn run<S: StorageService>(&self, fs: &GatedFs<S>) -> std::result::Result<String, FsError> {
        match self {
            Self::Access(path) => fs.access(path, 0).map(|()| "ok".to_string()),
            Self::Open(path, flags) => fs.open(path, *flags).map(|node| {
                if node.is_directory() {
                    "ok (directory)".to_string()
                } else {
                    "ok".to_string()
                }
            }),
            Self::Mkdir(path) => fs.mkdir(path, 0o777).map(|()| "ok".to_string()),
            Self::Rmdir(path) => fs.rmdir(path).map(|()| "ok".to_string()),
            Self::Unlink(path) => fs.unlink(path).map(|()| "ok".to_string()),
            Self::Remove(path) => fs.remove(path).map(|()| "ok".to_string()),
            Self::Rename(from, to) => fs.rename(from, to).map(|()| "ok".to_string()),
        }
    }
}

/// Parse an open mode such as `r`, `w`, `rw,create,excl`
///
/// At most one access mode (`r`, `w`, `rw`) may be given; the default is `r`.
fn parse_mode(mode: &str) -> Result<OpenFlags> {
    let mut flags = OpenFlags::READ_ONLY;
    let mut access: Option<&str> = None;
    for part in mode.split(',') {
        let access_mode = match part {
            "r" => Some(OpenFlags::READ_ONLY),
            "w" => Some(OpenFlags::WRITE_ONLY),
            "rw" => Some(OpenFlags::READ_WRITE),
            _ => None,
        };
        if let Some(access_mode) = access_mode {
            if let Some(previous) = access.replace(part) {
                bail!("conflicting access modes '{previous}' and '{part}'");
            }
            flags = flags.with_access_mode(access_mode);
            continue;
        }
        flags = match part {
            "create" => flags | OpenFlags::CREATE,
            "excl" => flags | OpenFlags::EXCLUSIVE,
            "trunc" => flags | OpenFlags::TRUNCATE,
            "append" => flags | OpenFlags::APPEND,
            other => bail!("unknown open mode '{other}'"),
        };
    }
    Ok(flags)
}

/// Counts reported after a script run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Run every command in `input`, writing one result line per command
///
/// # Errors
///
/// Returns an error only if reading input or writing output fails; command
/// failures are reported in the output and counted.
pub fn run_script<S, R, W>(fs: &GatedFs<S>, input: R, mut output: W) -> Result<ScriptSummary>
where
    S: StorageService,
    R: BufRead,
    W: Write,
{
    let mut summary = ScriptSummary::default();
    for line in input.lines() {
        let line = line?;
        let command = match Command::parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                writeln!(output, "error: {e}")?;
                summary.failed += 1;
                continue;
            }
        };
        match command.run(fs) {
            Ok(message) => {
                writeln!(output, "{message}")?;
                summary.succeeded += 1;
            }
            Err(err) => {
                writeln!(output, "error: {err} (errno {})", err.errno())?;
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}
