//! gatedfs - run filesystem commands through the readiness-gated adapter
//!
//! Commands are read from stdin, one per line:
//!
//! ```text
//! mkdir /docs
//! open /docs/a.txt w,create
//! rename /docs/a.txt /docs/b.txt
//! unlink /docs/b.txt
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use gatedfs::cli::{run_script, Args};
use gatedfs::{GatedFs, MountArgs};
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use tracing::info;

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.output.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let mount_args = MountArgs::parse(args.mount.options.iter().cloned(), args.mount.delivery())
        .context("invalid mount options")?;
    let storage = args.mount.storage();
    let options = &mount_args.options;
    if options.prefix.is_absolute() && options.filesystem_resource.is_none() {
        // A fresh store has only a root; give the mount prefix somewhere to live.
        storage.insert_directory(options.kind, &options.prefix.join());
    }
    let storage = Arc::new(storage);
    let fs = GatedFs::mount(storage, mount_args).context("failed to mount filesystem")?;
    info!("mounted filesystem {} with prefix '{}'", fs.filesystem(), fs.prefix());

    let stdout = io::stdout();
    let mut output = BufWriter::new(stdout.lock());
    let summary = run_script(&fs, io::stdin().lock(), &mut output)?;
    output.flush()?;

    info!(
        "{} commands succeeded, {} failed",
        summary.succeeded, summary.failed
    );
    Ok(())
}
