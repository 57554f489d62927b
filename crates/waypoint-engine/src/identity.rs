//! Normalized file identities.
//!
//! Every path that reaches the engine (client breakpoint sources, runtime
//! script paths, source-map `sources` entries) is turned into a
//! [`SourceFileIdentity`] before it is compared or used as a key.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

/// Whether the host filesystem compares paths case-insensitively.
pub const CASE_INSENSITIVE_FS: bool = cfg!(any(windows, target_os = "macos"));

/// A normalized path used as a registry and cache key.
///
/// `.` and `..` segments are collapsed lexically, trailing separators are
/// dropped, and on case-insensitive filesystems the comparison key is
/// lower-cased. The path is an opaque string: whitespace is never special.
#[derive(Clone)]
pub struct SourceFileIdentity {
    path: PathBuf,
    key: String,
}

impl SourceFileIdentity {
    /// Normalize `path` with the host's case rules.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_case_rule(path, CASE_INSENSITIVE_FS)
    }

    /// Normalize `path`, folding case when `case_insensitive` is set.
    pub fn with_case_rule(path: impl AsRef<Path>, case_insensitive: bool) -> Self {
        let (path, mut key) = normalize(path.as_ref());
        if case_insensitive {
            key = key.to_lowercase();
        }
        Self { path, key }
    }

    /// Accept either a plain path or a `file:` URL, as found in source maps.
    pub fn from_path_or_url(value: &str) -> Self {
        if value.starts_with("file:") {
            if let Some(path) = url::Url::parse(value)
                .ok()
                .and_then(|url| url.to_file_path().ok())
            {
                return Self::new(path);
            }
        }
        Self::new(value)
    }

    /// The normalized path, with its original casing.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The comparison key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Directory containing this file, if any.
    pub fn parent(&self) -> Option<&Path> {
        self.path.parent()
    }

    /// Resolve `relative` against this file's directory.
    pub fn sibling(&self, relative: &str) -> SourceFileIdentity {
        match self.parent() {
            Some(dir) => SourceFileIdentity::new(dir.join(relative)),
            None => SourceFileIdentity::new(relative),
        }
    }
}

fn normalize(path: &Path) -> (PathBuf, String) {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    let mut key = String::new();
    for component in &parts {
        match component {
            Component::Prefix(prefix) => key.push_str(&prefix.as_os_str().to_string_lossy()),
            Component::RootDir => key.push('/'),
            other => {
                if !key.is_empty() && !key.ends_with('/') {
                    key.push('/');
                }
                key.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }

    (parts.iter().collect(), key)
}

impl PartialEq for SourceFileIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SourceFileIdentity {}

impl Hash for SourceFileIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for SourceFileIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceFileIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Debug for SourceFileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceFileIdentity({:?})", self.path)
    }
}

impl fmt::Display for SourceFileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<&Path> for SourceFileIdentity {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for SourceFileIdentity {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&str> for SourceFileIdentity {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
