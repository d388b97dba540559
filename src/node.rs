//! Per-open file nodes
//!
//! A [`FileNode`] is what `open` hands back: it owns the entry reference for
//! the opened path and, for regular files, a file-I/O object from the
//! storage service. Both are released when the node is dropped.

use crate::error::Result;
use crate::storage::{EntryType, FileOpenFlags, ScopedResource, StorageService};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// POSIX open flags (`O_RDONLY`, `O_CREAT`, ...)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OpenFlags(pub i32);

impl OpenFlags {
    pub const READ_ONLY: Self = Self(libc::O_RDONLY);
    pub const WRITE_ONLY: Self = Self(libc::O_WRONLY);
    pub const READ_WRITE: Self = Self(libc::O_RDWR);
    pub const CREATE: Self = Self(libc::O_CREAT);
    pub const EXCLUSIVE: Self = Self(libc::O_EXCL);
    pub const TRUNCATE: Self = Self(libc::O_TRUNC);
    pub const APPEND: Self = Self(libc::O_APPEND);

    #[must_use]
    pub const fn bits(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// The `O_ACCMODE` part of the flags
    #[must_use]
    pub const fn access_mode(self) -> Self {
        Self(self.0 & libc::O_ACCMODE)
    }

    /// Replace the access mode, keeping every other flag
    #[must_use]
    pub const fn with_access_mode(self, mode: Self) -> Self {
        Self((self.0 & !libc::O_ACCMODE) | mode.access_mode().0)
    }

    /// Translate into the storage service's open flags
    #[must_use]
    pub const fn to_storage(self) -> FileOpenFlags {
        let mode = self.access_mode().0;
        FileOpenFlags {
            read: mode == libc::O_RDONLY || mode == libc::O_RDWR,
            write: mode == libc::O_WRONLY || mode == libc::O_RDWR,
            create: self.contains(Self::CREATE),
            truncate: self.contains(Self::TRUNCATE),
            exclusive: self.contains(Self::EXCLUSIVE),
        }
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// An opened file or directory
pub struct FileNode<S: StorageService> {
    entry: ScopedResource<S>,
    file_io: Option<ScopedResource<S>>,
    flags: OpenFlags,
    is_directory: bool,
}

impl<S: StorageService> FileNode<S> {
    /// Wrap an entry reference; call [`FileNode::init`] before use
    pub fn new(entry: ScopedResource<S>) -> Self {
        Self {
            entry,
            file_io: None,
            flags: OpenFlags::default(),
            is_directory: false,
        }
    }

    /// Open the entry with `flags`
    ///
    /// Directories are recognized by a query and get no file-I/O object.
    /// Anything else, including an entry the query could not find, is opened
    /// as a file so that `O_CREAT` can bring it into existence.
    ///
    /// # Errors
    ///
    /// Returns the translated storage failure from opening the file.
    pub fn init(&mut self, flags: OpenFlags) -> Result<()> {
        self.flags = flags;
        let service = Arc::clone(self.entry.service());
        let entry = self.entry.resource();

        if let Ok(info) = service.query(entry) {
            if info.entry_type == EntryType::Directory {
                self.is_directory = true;
                return Ok(());
            }
        }

        match service.open_file(entry, flags.to_storage()) {
            Ok(resource) => {
                self.file_io = Some(ScopedResource::adopt(service, resource));
                Ok(())
            }
            Err(status) => {
                debug!("open of entry {} failed: {}", entry, status);
                status.into_result()
            }
        }
    }

    #[must_use]
    pub const fn flags(&self) -> OpenFlags {
        self.flags
    }

    #[must_use]
    pub const fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Whether `O_APPEND` was requested
    #[must_use]
    pub const fn is_append(&self) -> bool {
        self.flags.contains(OpenFlags::APPEND)
    }

    /// The entry reference this node owns
    pub fn entry(&self) -> &ScopedResource<S> {
        &self.entry
    }

    /// The file-I/O object, absent for directories
    pub fn file_io(&self) -> Option<&ScopedResource<S>> {
        self.file_io.as_ref()
    }
}

impl<S: StorageService> fmt::Debug for FileNode<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileNode")
            .field("entry", &self.entry)
            .field("file_io", &self.file_io)
            .field("flags", &self.flags)
            .field("is_directory", &self.is_directory)
            .finish()
    }
}
