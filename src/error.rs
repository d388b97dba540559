//! Error types for gatedfs
//!
//! Every failure the adapter reports is a [`FsError`]. Native storage-service
//! status codes are folded into this taxonomy by [`crate::status`], and each
//! variant maps onto exactly one POSIX errno so callers that speak errno can
//! be served without a second table.

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, FsError>;

/// Errors surfaced by filesystem operations
///
/// The type is `Clone` because a failed filesystem open is cached by the
/// readiness gate and handed to every caller that asks afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// The path did not resolve to an entry
    #[error("no such file or directory")]
    NotFound,

    /// The entry already exists
    #[error("file exists")]
    AlreadyExists,

    /// A file-only operation targeted a directory
    #[error("is a directory")]
    IsADirectory,

    /// A directory-only operation targeted a regular file
    #[error("not a directory")]
    NotADirectory,

    /// Bad configuration, bad argument, or an entry the adapter cannot classify
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The storage service cannot be used from here
    #[error("operation not supported")]
    NotSupported,

    /// The storage service refused access
    #[error("permission denied")]
    PermissionDenied,

    /// The storage service rejected the operation outright
    #[error("operation not permitted")]
    OperationNotPermitted,

    /// A resource handle was not valid
    #[error("bad resource handle")]
    BadHandle,

    /// The storage service ran out of memory
    #[error("out of memory")]
    OutOfMemory,

    /// No space or quota left
    #[error("no space left on device")]
    NoSpace,

    /// The storage service is busy or timed out
    #[error("resource busy")]
    Busy,

    /// The file would exceed the size the service allows
    #[error("file too large")]
    FileTooLarge,

    /// Any failure without a more specific classification
    #[error("input/output error")]
    Io,
}

impl FsError {
    /// Shorthand for an [`FsError::InvalidArgument`] with a reason
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// The POSIX errno equivalent of this error
    #[must_use]
    pub const fn errno(&self) -> i32 {
        match self {
            Self::NotFound => libc::ENOENT,
            Self::AlreadyExists => libc::EEXIST,
            Self::IsADirectory => libc::EISDIR,
            Self::NotADirectory => libc::ENOTDIR,
            Self::InvalidArgument(_) => libc::EINVAL,
            Self::NotSupported => libc::ENOSYS,
            Self::PermissionDenied => libc::EACCES,
            Self::OperationNotPermitted => libc::EPERM,
            Self::BadHandle => libc::EBADF,
            Self::OutOfMemory => libc::ENOMEM,
            Self::NoSpace => libc::ENOSPC,
            Self::Busy => libc::EBUSY,
            Self::FileTooLarge => libc::EFBIG,
            Self::Io => libc::EIO,
        }
    }
}

impl From<FsError> for std::io::Error {
    fn from(err: FsError) -> Self {
        Self::from_raw_os_error(err.errno())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(FsError::NotFound.errno(), libc::ENOENT);
        assert_eq!(FsError::AlreadyExists.errno(), libc::EEXIST);
        assert_eq!(FsError::IsADirectory.errno(), libc::EISDIR);
        assert_eq!(FsError::NotADirectory.errno(), libc::ENOTDIR);
        assert_eq!(FsError::invalid("x").errno(), libc::EINVAL);
        assert_eq!(FsError::NotSupported.errno(), libc::ENOSYS);
        assert_eq!(FsError::Io.errno(), libc::EIO);
    }

    #[test]
    fn test_io_error_conversion_keeps_errno() {
        let err: std::io::Error = FsError::NotADirectory.into();
        assert_eq!(err.raw_os_error(), Some(libc::ENOTDIR));
    }

    #[test]
    fn test_display_includes_reason() {
        let err = FsError::invalid("unknown option 'colour'");
        assert_eq!(err.to_string(), "invalid argument: unknown option 'colour'");
    }
}
