//! Directory and volume listing.
//!
//! Lists the immediate children of a directory, or the available volumes
//! when no path is given. Results are always ordered directories first, then
//! by case-insensitive name.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use protocol::{EntryKind, FileEntry};
use thiserror::Error;
use tracing::{debug, warn};

use super::format::{format_size, format_timestamp};
use super::volume::VolumeStats;

/// Errors that can occur during directory listing.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The requested path does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    /// The requested path is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The OS refused to traverse the directory.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// IO error.
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path being listed.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },
}

impl BrowserError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::PathNotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// A listed directory child or volume.
#[derive(Debug, Clone)]
pub struct PathEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Absolute path.
    pub path: PathBuf,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Entry kind.
    pub kind: EntryKind,
    /// Size in bytes, `None` for directories and drives.
    pub size: Option<u64>,
    /// Last modified time, `None` for drives.
    pub modified: Option<SystemTime>,
    /// Capacity, only present on drives.
    pub stats: Option<VolumeStats>,
}

impl PathEntry {
    fn from_metadata(name: String, path: PathBuf, metadata: &Metadata) -> Self {
        let is_dir = metadata.is_dir();
        Self {
            name,
            path,
            is_dir,
            kind: if is_dir {
                EntryKind::Folder
            } else {
                EntryKind::File
            },
            size: (!is_dir).then(|| metadata.len()),
            modified: metadata.modified().ok(),
            stats: None,
        }
    }

    fn drive(name: String, path: PathBuf) -> Self {
        let stats = VolumeStats::for_path(&path);
        Self {
            name,
            path,
            is_dir: true,
            kind: EntryKind::Drive,
            size: None,
            modified: None,
            stats: Some(stats),
        }
    }

    /// Convert to protocol FileEntry.
    pub fn to_protocol(&self) -> FileEntry {
        let modified = self.modified.map(|m| {
            m.duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0)
        });

        FileEntry {
            name: self.name.clone(),
            path: self.path.to_string_lossy().into_owned(),
            is_dir: self.is_dir,
            kind: self.kind,
            size: self.size,
            size_fmt: self
                .size
                .map(format_size)
                .unwrap_or_else(|| "-".to_string()),
            modified,
            modified_fmt: self.modified.map(format_timestamp),
            stats: self.stats.as_ref().map(VolumeStats::to_protocol),
        }
    }
}

/// Lists directories and volumes.
#[derive(Debug, Clone, Default)]
pub struct DirectoryBrowser {
    /// Directory whose subdirectories are presented as volumes.
    mount_root: Option<PathBuf>,
}

impl DirectoryBrowser {
    /// Create a browser.
    ///
    /// When `mount_root` is set and contains subdirectories, those are listed
    /// as volumes instead of the platform's own drives. This supports
    /// containers where host folders are bind-mounted under one directory.
    pub fn new(mount_root: Option<PathBuf>) -> Self {
        Self { mount_root }
    }

    /// List `path`, or the volumes when `path` is `None` or empty.
    pub fn list(&self, path: Option<&Path>) -> Result<Vec<PathEntry>, BrowserError> {
        match path {
            Some(p) if !p.as_os_str().is_empty() => self.list_directory(p),
            _ => Ok(self.list_volumes()),
        }
    }

    /// List the available volumes with their capacity.
    pub fn list_volumes(&self) -> Vec<PathEntry> {
        if let Some(mounts) = self.mount_points() {
            return mounts;
        }

        platform_volumes()
    }

    /// List the immediate children of a directory.
    pub fn list_directory(&self, path: &Path) -> Result<Vec<PathEntry>, BrowserError> {
        let metadata = fs::metadata(path).map_err(|e| BrowserError::from_io(path, e))?;
        if !metadata.is_dir() {
            return Err(BrowserError::NotADirectory(path.to_path_buf()));
        }

        let entries = fs::read_dir(path).map_err(|e| BrowserError::from_io(path, e))?;

        let mut results = Vec::new();
        for entry_result in entries {
            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Skipping unreadable directory entry"
                    );
                    continue;
                }
            };

            let child = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            let metadata = match fs::metadata(&child) {
                Ok(m) => m,
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    debug!(path = %child.display(), "Skipping entry without stat permission");
                    continue;
                }
                // Dangling links are listed from their own metadata.
                Err(e) => match fs::symlink_metadata(&child) {
                    Ok(m) => m,
                    Err(_) => {
                        warn!(
                            path = %child.display(),
                            error = %e,
                            "Skipping entry that cannot be stat'ed"
                        );
                        continue;
                    }
                },
            };

            results.push(PathEntry::from_metadata(name, child, &metadata));
        }

        sort_entries(&mut results);
        Ok(results)
    }

    /// Subdirectories of the mount root, or `None` when there are none.
    fn mount_points(&self) -> Option<Vec<PathEntry>> {
        let root = self.mount_root.as_ref()?;

        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(
                    mount_root = %root.display(),
                    error = %e,
                    "Mount root unreadable, using platform volumes"
                );
                return None;
            }
        };

        let mut mounts: Vec<PathEntry> = entries
            .filter_map(Result::ok)
            .filter(|entry| fs::metadata(entry.path()).is_ok_and(|m| m.is_dir()))
            .map(|entry| {
                PathEntry::drive(entry.file_name().to_string_lossy().into_owned(), entry.path())
            })
            .collect();

        if mounts.is_empty() {
            return None;
        }

        sort_entries(&mut mounts);
        Some(mounts)
    }
}

/// Every mounted drive letter.
#[cfg(windows)]
fn platform_volumes() -> Vec<PathEntry> {
    ('A'..='Z')
        .map(|letter| format!("{letter}:\\"))
        .filter(|drive| Path::new(drive).exists())
        .map(|drive| PathEntry::drive(drive.clone(), PathBuf::from(drive)))
        .collect()
}

/// The filesystem root.
#[cfg(not(windows))]
fn platform_volumes() -> Vec<PathEntry> {
    vec![PathEntry::drive("/".to_string(), PathBuf::from("/"))]
}

/// Sort directories first, then by case-insensitive name.
///
/// Names equal except for case are ordered by their exact bytes so the
/// result is deterministic.
pub fn sort_entries(entries: &mut [PathEntry]) {
    entries.sort_by_cached_key(|e| (!e.is_dir, e.name.to_lowercase(), e.name.clone()));
}
