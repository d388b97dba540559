//! Logical and full paths
//!
//! Callers hand the adapter root-relative *logical* paths. Before anything
//! reaches the storage service the mount prefix is prepended, giving the
//! *full* path. Both are [`FsPath`] values; full paths are built per call
//! and never stored.

use std::fmt;

/// A normalized slash-separated path
///
/// Parsing drops empty and `.` components and folds `..` into its parent,
/// so `/a//b/./c/../d` and `/a/b/d` are the same path. `..` never climbs
/// above the root of an absolute path.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct FsPath {
    absolute: bool,
    components: Vec<String>,
}

impl FsPath {
    /// The root path `/`
    #[must_use]
    pub const fn root() -> Self {
        Self {
            absolute: true,
            components: Vec::new(),
        }
    }

    /// Parse and normalize a path string
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let absolute = s.starts_with('/');
        let mut components: Vec<String> = Vec::new();
        for part in s.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    let at_top = matches!(components.last().map(String::as_str), None | Some(".."));
                    if !at_top {
                        components.pop();
                    } else if !absolute {
                        components.push("..".to_string());
                    }
                }
                name => components.push(name.to_string()),
            }
        }
        Self {
            absolute,
            components,
        }
    }

    /// Whether this is the root of the mount (`/`)
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.absolute && self.components.is_empty()
    }

    #[must_use]
    pub const fn is_absolute(&self) -> bool {
        self.absolute
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.absolute && self.components.is_empty()
    }

    /// Path components, root excluded
    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The same path anchored at the root
    ///
    /// Leading `..` components of a relative path are dropped, the way `..`
    /// at `/` stays at `/`.
    #[must_use]
    pub fn rooted(&self) -> Self {
        Self {
            absolute: true,
            components: self
                .components
                .iter()
                .skip_while(|component| *component == "..")
                .cloned()
                .collect(),
        }
    }

    /// Prepend `prefix` to this path
    ///
    /// The path is taken as root-relative, so the result never leaves the
    /// prefix. The result is absolute when the prefix is; an empty prefix
    /// gives the rooted path.
    #[must_use]
    pub fn prepend(&self, prefix: &Self) -> Self {
        let rooted = self.rooted();
        if prefix.is_empty() {
            return rooted;
        }
        let mut components = prefix.components.clone();
        components.extend(rooted.components);
        Self {
            absolute: prefix.absolute,
            components,
        }
    }

    /// Render as a string (`/` for the root, `""` for an empty relative path)
    #[must_use]
    pub fn join(&self) -> String {
        let body = self.components.join("/");
        if self.absolute {
            format!("/{body}")
        } else {
            body
        }
    }
}

impl From<&str> for FsPath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for FsPath {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<&String> for FsPath {
    fn from(s: &String) -> Self {
        Self::parse(s)
    }
}

impl From<&FsPath> for FsPath {
    fn from(path: &FsPath) -> Self {
        path.clone()
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join())
    }
}
