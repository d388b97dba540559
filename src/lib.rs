//! # gatedfs
//!
//! A synchronous, POSIX-style filesystem adapter over an asynchronous,
//! handle-based storage service.
//!
//! The storage service must open a filesystem once before anything else
//! works, and it may report that open through a callback on another thread.
//! [`GatedFs`] hides this: every operation blocks on a one-shot
//! [`ReadinessGate`] until the open has an outcome, qualifies the caller's
//! path with the mount prefix, and translates native status codes into
//! [`FsError`].
//!
//! ## Example
//!
//! ```rust
//! use gatedfs::backends::MemoryStorage;
//! use gatedfs::{CallbackDelivery, FilesystemKind, GatedFs, MountArgs, OpenFlags};
//! use std::sync::Arc;
//!
//! # fn main() -> gatedfs::Result<()> {
//! let storage = Arc::new(MemoryStorage::new());
//! storage.insert_directory(FilesystemKind::Persistent, "/saved");
//! let args = MountArgs::parse([("SOURCE", "/saved")], CallbackDelivery::Available)?;
//! let fs = GatedFs::mount(storage, args)?;
//!
//! fs.mkdir("/docs", 0o755)?;
//! let node = fs.open("/docs/a.txt", OpenFlags::WRITE_ONLY | OpenFlags::CREATE)?;
//! assert!(!node.is_directory());
//! fs.unlink("/docs/a.txt")?;
//! fs.rmdir("/docs")?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod gate;
pub mod node;
pub mod path;
pub mod status;
pub mod storage;

// Re-export main types
pub use config::{FilesystemKind, MountArgs, MountOptions};
pub use error::{FsError, Result};
pub use fs::{GatedFs, MountState, RemoveMask};
pub use gate::{CallbackDelivery, ReadinessGate};
pub use node::{FileNode, OpenFlags};
pub use path::FsPath;
pub use status::Status;
pub use storage::{Completion, EntryInfo, EntryType, Resource, StorageService};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
