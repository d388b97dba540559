//! The storage service seam
//!
//! [`StorageService`] is the contract the adapter needs from the handle-based
//! backend it fronts. Everything the service hands out is an opaque,
//! reference-counted [`Resource`]; [`ScopedResource`] ties one reference to
//! a Rust scope so it is released exactly once.
//!
//! Entry operations block until complete. Only `open_filesystem` may
//! complete asynchronously, through a [`Completion::Callback`].

use crate::config::FilesystemKind;
use crate::status::Status;
use std::fmt;
use std::sync::Arc;

/// Opaque handle to a storage-service object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resource(pub u64);

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handler for an asynchronous filesystem open
pub type OpenCallback = Box<dyn FnOnce(Status) + Send + 'static>;

/// How `open_filesystem` reports its outcome
pub enum Completion {
    /// Block the calling thread; the return value is the final status
    Blocking,
    /// Return immediately; the service invokes the handler exactly once with
    /// the final status, possibly from another thread
    Callback(OpenCallback),
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking => f.write_str("Blocking"),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Type of an entry as reported by a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    Regular,
    Directory,
    /// Anything else the service may store
    Other,
}

/// Result of querying an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    pub entry_type: EntryType,
    pub size: u64,
}

/// Open flags in the storage service's vocabulary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct FileOpenFlags {
    pub read: bool,
    pub write: bool,
    pub create: bool,
    pub truncate: bool,
    pub exclusive: bool,
}

/// Handle-based storage backend
///
/// Implementations must be usable from many threads at once. All methods
/// except [`StorageService::open_filesystem`] with a callback block until
/// the request completes.
pub trait StorageService: Send + Sync + 'static {
    /// Create a filesystem object of the given kind, holding one reference
    fn create_filesystem(&self, kind: FilesystemKind) -> Option<Resource>;

    /// Open a created filesystem
    ///
    /// With [`Completion::Blocking`] the return value is the outcome. With a
    /// callback the return value is either [`Status::CompletionPending`],
    /// and the outcome is delivered to the handler, or the final status, in
    /// which case the handler may be dropped without being called.
    fn open_filesystem(&self, filesystem: Resource, expected_size: u64, completion: Completion)
        -> Status;

    /// Whether `resource` names a filesystem object
    fn is_filesystem(&self, resource: Resource) -> bool;

    /// Take an additional reference on a resource
    fn add_ref(&self, resource: Resource);

    /// Drop one reference; the object goes away with its last reference
    fn release(&self, resource: Resource);

    /// Create a reference to the entry at `full_path`
    ///
    /// Returns `None` when the path cannot name an entry in this filesystem.
    /// The entry itself need not exist.
    fn create_entry(&self, filesystem: Resource, full_path: &str) -> Option<Resource>;

    /// Query type and size of an entry
    ///
    /// # Errors
    ///
    /// Returns the native failure status when the entry cannot be queried.
    fn query(&self, entry: Resource) -> Result<EntryInfo, Status>;

    /// Create a directory at the entry
    fn make_directory(&self, entry: Resource, recursive: bool) -> Status;

    /// Delete the entry
    fn delete(&self, entry: Resource) -> Status;

    /// Move `entry` to the location named by `target`
    fn rename(&self, entry: Resource, target: Resource) -> Status;

    /// Open a file-I/O object on the entry
    ///
    /// # Errors
    ///
    /// Returns the native failure status when the file cannot be opened.
    fn open_file(&self, entry: Resource, flags: FileOpenFlags) -> Result<Resource, Status>;
}

/// One reference on a storage resource, released on drop
pub struct ScopedResource<S: StorageService> {
    service: Arc<S>,
    resource: Resource,
}

impl<S: StorageService> ScopedResource<S> {
    /// Take ownership of a reference the caller already holds
    pub fn adopt(service: Arc<S>, resource: Resource) -> Self {
        Self { service, resource }
    }

    #[must_use]
    pub const fn resource(&self) -> Resource {
        self.resource
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }
}

impl<S: StorageService> Drop for ScopedResource<S> {
    fn drop(&mut self) {
        self.service.release(self.resource);
    }
}

impl<S: StorageService> fmt::Debug for ScopedResource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedResource").field(&self.resource).finish()
    }
}
