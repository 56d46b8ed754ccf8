//! Restricted-path access gate.
//!
//! Every filesystem-touching operation passes its path through
//! [`PathGuard::check`] first. The guard denies paths equal to or nested
//! under a configured restricted prefix (compared case-insensitively after
//! resolving `.` and `..`), and denies paths whose real location differs from
//! their apparent one, which blocks symlinks from escaping an allowed
//! directory into a restricted one.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use thiserror::Error;

/// Errors returned by the path guard.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The path is, or lives under, a restricted prefix.
    #[error("access to {0} is restricted")]
    Restricted(PathBuf),

    /// The path resolves somewhere other than where it appears to be.
    #[error("{path} resolves to {resolved}")]
    SymlinkEscape {
        /// The requested path.
        path: PathBuf,
        /// Where the filesystem actually resolves it.
        resolved: PathBuf,
    },

    /// The path could not be resolved through the filesystem.
    #[error("cannot resolve {path}: {source}")]
    Unresolvable {
        /// The requested path.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },
}

/// Validates paths against an immutable set of restricted prefixes.
#[derive(Debug, Clone, Default)]
pub struct PathGuard {
    /// Normalized, case-folded restricted prefixes.
    restricted: Vec<String>,
}

impl PathGuard {
    /// Create a guard denying the given prefixes.
    pub fn new<I, P>(restricted: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let restricted = restricted
            .into_iter()
            .filter(|p| !p.as_ref().as_os_str().is_empty())
            .map(|p| {
                let p = p.as_ref();
                fold(&normalize(p).unwrap_or_else(|_| p.to_path_buf()))
            })
            .collect();

        Self { restricted }
    }

    /// Create a guard with no restricted prefixes.
    ///
    /// Symlink resolution is still enforced.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Number of restricted prefixes.
    pub fn restricted_count(&self) -> usize {
        self.restricted.len()
    }

    /// Validate an optional path.
    ///
    /// `None` and the empty path are always permitted; they denote the
    /// drive list.
    pub fn validate(&self, path: Option<&Path>) -> Result<(), GuardError> {
        match path {
            Some(p) if !p.as_os_str().is_empty() => self.check(p).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Validate a path and return its normalized absolute form.
    ///
    /// The path does not need to exist: resolution goes as far as the
    /// existing ancestors allow. Callers that need existence check it
    /// separately.
    pub fn check(&self, path: &Path) -> Result<PathBuf, GuardError> {
        let normalized = normalize(path).map_err(|source| GuardError::Unresolvable {
            path: path.to_path_buf(),
            source,
        })?;

        if self.is_restricted(&normalized) {
            return Err(GuardError::Restricted(path.to_path_buf()));
        }

        let resolved = resolve_existing(&normalized)?;
        if fold(&resolved) != fold(&normalized) {
            return Err(GuardError::SymlinkEscape {
                path: path.to_path_buf(),
                resolved,
            });
        }

        Ok(normalized)
    }

    /// Lexical restricted-prefix match, without touching the filesystem.
    pub fn is_restricted(&self, path: &Path) -> bool {
        let candidate = match normalize(path) {
            Ok(p) => fold(&p),
            Err(_) => fold(path),
        };

        self.restricted.iter().any(|prefix| {
            if candidate == *prefix {
                return true;
            }
            if prefix.ends_with(MAIN_SEPARATOR) {
                candidate.starts_with(prefix.as_str())
            } else {
                candidate
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with(MAIN_SEPARATOR))
            }
        })
    }
}

/// Make a path absolute and resolve `.` and `..` lexically.
pub fn normalize(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(name) => normalized.push(name),
        }
    }

    Ok(normalized)
}

/// Resolve symlinks through the deepest existing ancestor, re-appending the
/// components that do not exist yet.
fn resolve_existing(normalized: &Path) -> Result<PathBuf, GuardError> {
    let mut existing = normalized.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();

    loop {
        match dunce::canonicalize(&existing) {
            Ok(mut resolved) => {
                for name in missing.iter().rev() {
                    resolved.push(name);
                }
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // A dangling link is still a link somewhere else.
                if fs::symlink_metadata(&existing).is_ok_and(|m| m.file_type().is_symlink()) {
                    let target = fs::read_link(&existing).unwrap_or_default();
                    return Err(GuardError::SymlinkEscape {
                        path: normalized.to_path_buf(),
                        resolved: target,
                    });
                }

                match existing.file_name() {
                    Some(name) => {
                        missing.push(name.to_os_string());
                        existing.pop();
                    }
                    None => {
                        return Err(GuardError::Unresolvable {
                            path: normalized.to_path_buf(),
                            source: e,
                        })
                    }
                }
            }
            Err(source) => {
                return Err(GuardError::Unresolvable {
                    path: normalized.to_path_buf(),
                    source,
                })
            }
        }
    }
}

/// Case-folded string form used for every comparison.
fn fold(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}
