//! Native status codes reported by the storage service
//!
//! The storage service speaks in signed integer codes: zero is success,
//! `-1` means the request was accepted and will complete later, and every
//! other negative value is a failure. [`Status`] gives those codes names and
//! [`Status::into_result`] is the single translation table into [`FsError`].

use crate::error::{FsError, Result};

/// A native result code from the storage service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    CompletionPending,
    Failed,
    Aborted,
    BadArgument,
    BadResource,
    NoInterface,
    NoAccess,
    NoMemory,
    NoSpace,
    NoQuota,
    InProgress,
    NotSupported,
    BlocksMainThread,
    FileNotFound,
    FileExists,
    FileTooBig,
    FileChanged,
    NotAFile,
    TimedOut,
    UserCancel,
    NoUserGesture,
    ContextLost,
    NoMessageLoop,
    WrongThread,
    /// A code this crate has no name for
    Other(i32),
}

impl Status {
    /// Decode a raw native code
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            -1 => Self::CompletionPending,
            -2 => Self::Failed,
            -3 => Self::Aborted,
            -4 => Self::BadArgument,
            -5 => Self::BadResource,
            -6 => Self::NoInterface,
            -7 => Self::NoAccess,
            -8 => Self::NoMemory,
            -9 => Self::NoSpace,
            -10 => Self::NoQuota,
            -11 => Self::InProgress,
            -12 => Self::NotSupported,
            -13 => Self::BlocksMainThread,
            -20 => Self::FileNotFound,
            -21 => Self::FileExists,
            -22 => Self::FileTooBig,
            -23 => Self::FileChanged,
            -24 => Self::NotAFile,
            -30 => Self::TimedOut,
            -40 => Self::UserCancel,
            -41 => Self::NoUserGesture,
            -50 => Self::ContextLost,
            -51 => Self::NoMessageLoop,
            -52 => Self::WrongThread,
            other => Self::Other(other),
        }
    }

    /// The raw native code
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::CompletionPending => -1,
            Self::Failed => -2,
            Self::Aborted => -3,
            Self::BadArgument => -4,
            Self::BadResource => -5,
            Self::NoInterface => -6,
            Self::NoAccess => -7,
            Self::NoMemory => -8,
            Self::NoSpace => -9,
            Self::NoQuota => -10,
            Self::InProgress => -11,
            Self::NotSupported => -12,
            Self::BlocksMainThread => -13,
            Self::FileNotFound => -20,
            Self::FileExists => -21,
            Self::FileTooBig => -22,
            Self::FileChanged => -23,
            Self::NotAFile => -24,
            Self::TimedOut => -30,
            Self::UserCancel => -40,
            Self::NoUserGesture => -41,
            Self::ContextLost => -50,
            Self::NoMessageLoop => -51,
            Self::WrongThread => -52,
            Self::Other(code) => code,
        }
    }

    /// Whether the code reports success (including "accepted, pending")
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::CompletionPending)
    }

    /// Translate into the adapter's error taxonomy
    ///
    /// # Errors
    ///
    /// Returns the [`FsError`] this native failure maps to. Codes without an
    /// entry in the table become [`FsError::Io`].
    pub fn into_result(self) -> Result<()> {
        let err = match self {
            Self::Ok | Self::CompletionPending => return Ok(()),
            Self::Failed
            | Self::Aborted
            | Self::BlocksMainThread
            | Self::UserCancel
            | Self::NoUserGesture
            | Self::ContextLost
            | Self::NoMessageLoop
            | Self::WrongThread => FsError::OperationNotPermitted,
            Self::BadArgument => FsError::invalid("rejected by storage service"),
            Self::FileChanged => FsError::invalid("file changed underneath the operation"),
            Self::BadResource => FsError::BadHandle,
            Self::NoInterface | Self::NotSupported => FsError::NotSupported,
            Self::NoAccess => FsError::PermissionDenied,
            Self::NoMemory => FsError::OutOfMemory,
            Self::NoSpace | Self::NoQuota => FsError::NoSpace,
            Self::InProgress | Self::TimedOut => FsError::Busy,
            Self::FileNotFound => FsError::NotFound,
            Self::FileExists => FsError::AlreadyExists,
            Self::FileTooBig => FsError::FileTooLarge,
            Self::NotAFile => FsError::IsADirectory,
            Self::Other(_) => FsError::Io,
        };
        Err(err)
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}
