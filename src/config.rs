//! Mount-time configuration
//!
//! A mount is configured with string key/value pairs. This module owns the
//! recognized keys and turns the pairs into a typed [`MountOptions`].
//! Parsing is pure: it never talks to the storage service, so a bad
//! option fails the mount before any resource is created.

use crate::error::{FsError, Result};
use crate::gate::CallbackDelivery;
use crate::path::FsPath;
use crate::storage::Resource;
use tracing::warn;

/// Option key selecting the filesystem kind
pub const KEY_TYPE: &str = "type";
/// Option key carrying the size hint for a newly opened filesystem
pub const KEY_EXPECTED_SIZE: &str = "expected_size";
/// Option key naming an already valid filesystem resource
pub const KEY_FILESYSTEM_RESOURCE: &str = "filesystem_resource";
/// Option key carrying the path prefix
pub const KEY_SOURCE: &str = "SOURCE";

/// Which store of the storage service backs the mount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FilesystemKind {
    #[default]
    Persistent,
    Temporary,
}

impl FilesystemKind {
    /// Parse a `type` option value (empty selects the default)
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidArgument`] for anything other than
    /// `PERSISTENT`, `TEMPORARY` or the empty string.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "PERSISTENT" | "" => Ok(Self::Persistent),
            "TEMPORARY" => Ok(Self::Temporary),
            other => {
                warn!("unknown filesystem type: '{}'", other);
                Err(FsError::invalid(format!("unknown filesystem type '{other}'")))
            }
        }
    }
}

/// Typed mount options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountOptions {
    /// Store to create when no resource is supplied
    pub kind: FilesystemKind,
    /// Size hint passed to the storage service's open
    pub expected_size: u64,
    /// Pre-opened filesystem to adopt instead of creating one
    pub filesystem_resource: Option<Resource>,
    /// Prefix prepended to every logical path
    pub prefix: FsPath,
}

impl MountOptions {
    /// Parse key/value option pairs
    ///
    /// # Errors
    ///
    /// Returns [`FsError::InvalidArgument`] for an unknown key, an unknown
    /// `type`, or a numeric option that is not a non-negative integer.
    pub fn parse<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                KEY_TYPE => options.kind = FilesystemKind::parse(value)?,
                KEY_EXPECTED_SIZE => options.expected_size = parse_number(key, value)?,
                KEY_FILESYSTEM_RESOURCE => {
                    options.filesystem_resource = Some(Resource(parse_number(key, value)?));
                }
                KEY_SOURCE => options.prefix = FsPath::parse(value),
                other => {
                    warn!("unknown mount option: {}", other);
                    return Err(FsError::invalid(format!("unknown mount option '{other}'")));
                }
            }
        }
        Ok(options)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|e| {
        warn!("bad value for {}: '{}' ({})", key, value, e);
        FsError::invalid(format!("{key} must be a non-negative integer, got '{value}'"))
    })
}

/// Everything a mount needs besides the storage service itself
#[derive(Debug, Clone, Default)]
pub struct MountArgs {
    pub options: MountOptions,
    /// Whether the mounting context can receive completion callbacks
    pub delivery: CallbackDelivery,
}

impl MountArgs {
    /// Parse options and pair them with a delivery capability
    ///
    /// # Errors
    ///
    /// Propagates [`MountOptions::parse`] failures.
    pub fn parse<I, K, V>(pairs: I, delivery: CallbackDelivery) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Ok(Self {
            options: MountOptions::parse(pairs)?,
            delivery,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let options = MountOptions::parse(Vec::<(&str, &str)>::new()).unwrap();
        assert_eq!(options.kind, FilesystemKind::Persistent);
        assert_eq!(options.expected_size, 0);
        assert_eq!(options.filesystem_resource, None);
        assert!(options.prefix.is_empty());
    }

    #[test]
    fn test_all_keys() {
        let options = MountOptions::parse([
            ("type", "TEMPORARY"),
            ("expected_size", "1048576"),
            ("filesystem_resource", "42"),
            ("SOURCE", "/saved"),
        ])
        .unwrap();
        assert_eq!(options.kind, FilesystemKind::Temporary);
        assert_eq!(options.expected_size, 1_048_576);
        assert_eq!(options.filesystem_resource, Some(Resource(42)));
        assert_eq!(options.prefix.join(), "/saved");
    }

    #[rstest]
    #[case("PERSISTENT", FilesystemKind::Persistent)]
    #[case("TEMPORARY", FilesystemKind::Temporary)]
    #[case("", FilesystemKind::Persistent)]
    fn test_type_values(#[case] value: &str, #[case] kind: FilesystemKind) {
        let options = MountOptions::parse([("type", value)]).unwrap();
        assert_eq!(options.kind, kind);
    }

    #[rstest]
    #[case("type", "persistent")]
    #[case("type", "LOCAL")]
    #[case("expected_size", "-1")]
    #[case("expected_size", "lots")]
    #[case("filesystem_resource", "abc")]
    #[case("source", "/saved")]
    #[case("colour", "blue")]
    fn test_rejected_options(#[case] key: &str, #[case] value: &str) {
        let err = MountOptions::parse([(key, value)]).unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)), "{key}={value} gave {err:?}");
    }

    #[test]
    fn test_later_keys_win() {
        let options = MountOptions::parse([("SOURCE", "/a"), ("SOURCE", "/b")]).unwrap();
        assert_eq!(options.prefix.join(), "/b");
    }
}
