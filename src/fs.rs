//! The filesystem instance and its operations
//!
//! [`GatedFs`] presents blocking, POSIX-style calls over a [`StorageService`].
//! Every call waits on the [`ReadinessGate`] first, then qualifies the
//! logical path with the mount prefix, then issues blocking storage
//! requests on a fresh entry reference that is released when the call
//! returns.
//!
//! # Lifecycle
//!
//! ```text
//! mount() ──> Opening ──> Ready
//!                    └──> Failed (every call returns the cached error)
//! ```

use crate::config::MountArgs;
use crate::error::{FsError, Result};
use crate::gate::{CallbackDelivery, ReadinessGate};
use crate::node::{FileNode, OpenFlags};
use crate::path::FsPath;
use crate::storage::{EntryType, Resource, ScopedResource, StorageService};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Which entry types a remove may delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveMask {
    files: bool,
    directories: bool,
}

impl RemoveMask {
    /// `unlink`: regular files only
    pub const FILES: Self = Self {
        files: true,
        directories: false,
    };
    /// `rmdir`: directories only
    pub const DIRECTORIES: Self = Self {
        files: false,
        directories: true,
    };
    /// `remove`: whatever is there
    pub const ANY: Self = Self {
        files: true,
        directories: true,
    };

    /// Whether the entry type has to be checked before deleting
    #[must_use]
    pub const fn is_restricted(self) -> bool {
        !(self.files && self.directories)
    }
}

/// Where the instance is in its open lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountState {
    /// The asynchronous open has not reported yet
    Opening,
    Ready,
    Failed(FsError),
}

/// A mounted filesystem over a storage service
pub struct GatedFs<S: StorageService> {
    service: Arc<S>,
    filesystem: ScopedResource<S>,
    prefix: FsPath,
    gate: ReadinessGate,
}

impl<S: StorageService> GatedFs<S> {
    /// Mount a filesystem
    ///
    /// With a `filesystem_resource` option the given filesystem is adopted
    /// (one extra reference) and the instance is ready at once. Otherwise a
    /// filesystem of the configured kind is created and opened; whether that
    /// open completes before `mount` returns depends on
    /// [`MountArgs::delivery`].
    ///
    /// # Errors
    ///
    /// - [`FsError::InvalidArgument`] if the supplied resource is not a filesystem
    /// - [`FsError::NotSupported`] if the service cannot create a filesystem
    /// - the translated open failure when the open ran synchronously
    pub fn mount(service: Arc<S>, args: MountArgs) -> Result<Self> {
        let MountArgs { options, delivery } = args;

        if let Some(resource) = options.filesystem_resource {
            if !service.is_filesystem(resource) {
                warn!("resource {} is not a filesystem", resource);
                return Err(FsError::invalid(format!("resource {resource} is not a filesystem")));
            }
            service.add_ref(resource);
            debug!("adopted filesystem {} with prefix '{}'", resource, options.prefix);
            return Ok(Self {
                filesystem: ScopedResource::adopt(Arc::clone(&service), resource),
                service,
                prefix: options.prefix,
                gate: ReadinessGate::resolved(Ok(())),
            });
        }

        let resource = service.create_filesystem(options.kind).ok_or_else(|| {
            warn!("storage service could not create a {:?} filesystem", options.kind);
            FsError::NotSupported
        })?;
        let filesystem = ScopedResource::adopt(Arc::clone(&service), resource);
        debug!(
            "created {:?} filesystem {} (expected size {}, {:?})",
            options.kind, resource, options.expected_size, delivery
        );

        let gate = ReadinessGate::open(service.as_ref(), resource, options.expected_size, delivery);
        if delivery == CallbackDelivery::Unavailable {
            gate.wait()?;
        }

        Ok(Self {
            service,
            filesystem,
            prefix: options.prefix,
            gate,
        })
    }

    /// Existence probe; `mode` is ignored since every entry is fully accessible
    ///
    /// # Errors
    ///
    /// Same as [`GatedFs::open`] with `O_RDONLY`.
    pub fn access(&self, path: impl Into<FsPath>, _mode: i32) -> Result<()> {
        self.open(path, OpenFlags::READ_ONLY).map(drop)
    }

    /// Open a file or directory
    ///
    /// # Errors
    ///
    /// - the cached open failure if the filesystem failed to open
    /// - [`FsError::NotFound`] if the path does not resolve to an entry reference
    /// - whatever node initialization reports
    pub fn open(&self, path: impl Into<FsPath>, flags: OpenFlags) -> Result<FileNode<S>> {
        self.gate.wait()?;
        let entry = self.entry(&path.into())?;
        let mut node = FileNode::new(entry);
        node.init(flags)?;
        Ok(node)
    }

    /// Create a directory (non-recursive); `permissions` is ignored
    ///
    /// # Errors
    ///
    /// - the cached open failure if the filesystem failed to open
    /// - [`FsError::AlreadyExists`] for the root
    /// - [`FsError::NotFound`] if the path does not resolve
    /// - the translated storage failure
    pub fn mkdir(&self, path: impl Into<FsPath>, _permissions: u32) -> Result<()> {
        self.gate.wait()?;
        let path = path.into();
        // The service rejects the root with an access error; EEXIST is what callers expect.
        if path.rooted().is_root() {
            return Err(FsError::AlreadyExists);
        }
        let entry = self.entry(&path)?;
        self.service.make_directory(entry.resource(), false).into_result()
    }

    /// Remove a regular file
    ///
    /// # Errors
    ///
    /// See [`GatedFs::remove_with`]; a directory yields [`FsError::IsADirectory`].
    pub fn unlink(&self, path: impl Into<FsPath>) -> Result<()> {
        self.remove_with(path, RemoveMask::FILES)
    }

    /// Remove a directory
    ///
    /// # Errors
    ///
    /// See [`GatedFs::remove_with`]; a regular file yields [`FsError::NotADirectory`].
    pub fn rmdir(&self, path: impl Into<FsPath>) -> Result<()> {
        self.remove_with(path, RemoveMask::DIRECTORIES)
    }

    /// Remove whatever is at `path`, without checking its type
    ///
    /// # Errors
    ///
    /// See [`GatedFs::remove_with`].
    pub fn remove(&self, path: impl Into<FsPath>) -> Result<()> {
        self.remove_with(path, RemoveMask::ANY)
    }

    /// Remove the entry at `path` if `mask` allows its type
    ///
    /// # Errors
    ///
    /// - the cached open failure if the filesystem failed to open
    /// - [`FsError::NotFound`] if the path does not resolve
    /// - [`FsError::InvalidArgument`] if the type query fails or the type is unknown
    /// - [`FsError::IsADirectory`] / [`FsError::NotADirectory`] on a type mismatch
    /// - the translated delete failure
    pub fn remove_with(&self, path: impl Into<FsPath>, mask: RemoveMask) -> Result<()> {
        self.gate.wait()?;
        let path = path.into();
        let entry = self.entry(&path)?;

        if mask.is_restricted() {
            let info = self.service.query(entry.resource()).map_err(|status| {
                error!("error querying type of {}: {}", path, status);
                FsError::invalid("could not query entry type")
            })?;
            match info.entry_type {
                EntryType::Directory if !mask.directories => return Err(FsError::IsADirectory),
                EntryType::Regular if !mask.files => return Err(FsError::NotADirectory),
                EntryType::Directory | EntryType::Regular => {}
                EntryType::Other => {
                    error!("invalid entry type at {}", path);
                    return Err(FsError::invalid("unsupported entry type"));
                }
            }
        }

        self.service.delete(entry.resource()).into_result()
    }

    /// Move `path` to `new_path`
    ///
    /// # Errors
    ///
    /// - the cached open failure if the filesystem failed to open
    /// - [`FsError::NotFound`] if either path does not resolve; no rename is issued
    /// - the translated rename failure
    pub fn rename(&self, path: impl Into<FsPath>, new_path: impl Into<FsPath>) -> Result<()> {
        self.gate.wait()?;
        let source = self.entry(&path.into())?;
        let target = self.entry(&new_path.into())?;
        self.service
            .rename(source.resource(), target.resource())
            .into_result()
    }

    /// Block until the filesystem open has an outcome
    ///
    /// # Errors
    ///
    /// Returns the cached open failure.
    pub fn wait_ready(&self) -> Result<()> {
        self.gate.wait()
    }

    /// Current lifecycle state, without blocking
    #[must_use]
    pub fn state(&self) -> MountState {
        if !self.gate.is_resolved() {
            return MountState::Opening;
        }
        match self.gate.wait() {
            Ok(()) => MountState::Ready,
            Err(err) => MountState::Failed(err),
        }
    }

    /// The logical path with the mount prefix prepended
    #[must_use]
    pub fn full_path(&self, path: &FsPath) -> FsPath {
        path.prepend(&self.prefix)
    }

    #[must_use]
    pub const fn prefix(&self) -> &FsPath {
        &self.prefix
    }

    /// The storage-service filesystem this instance holds a reference on
    #[must_use]
    pub const fn filesystem(&self) -> Resource {
        self.filesystem.resource()
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    fn entry(&self, path: &FsPath) -> Result<ScopedResource<S>> {
        let full_path = self.full_path(path).join();
        self.service
            .create_entry(self.filesystem.resource(), &full_path)
            .map(|entry| ScopedResource::adopt(Arc::clone(&self.service), entry))
            .ok_or(FsError::NotFound)
    }
}

impl<S: StorageService> fmt::Debug for GatedFs<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatedFs")
            .field("filesystem", &self.filesystem.resource())
            .field("prefix", &self.prefix.join())
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}
