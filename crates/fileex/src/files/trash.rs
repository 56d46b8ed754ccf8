//! Recoverable trash with JSON sidecar metadata.
//!
//! Deleted items are moved into a single trash directory. Each item is stored
//! as two siblings sharing its id:
//!
//! - the payload, `<id>_<original name>`, which is the moved file or directory
//! - the sidecar, `<id>.meta.json`, describing where the payload came from
//!
//! The payload is always moved before the sidecar is written, and on restore
//! the sidecar is only removed after the payload is back in place. A sidecar
//! whose payload has disappeared is an orphan and is removed the next time
//! the trash is listed. A payload without a sidecar is never listed and never
//! touched.
//!
//! No in-process lock coordinates operations; concurrent callers rely on the
//! atomicity of renames, and every removal treats "already gone" as success.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local};
use protocol::TrashItem;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use super::format::{format_datetime, format_iso8601, format_size, parse_iso8601};
use super::guard::normalize;

/// File name suffix of metadata sidecars.
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Suffix of a sidecar that is still being written.
const SIDECAR_TEMP_SUFFIX: &str = ".tmp";

/// Errors that can occur during trash operations.
#[derive(Debug, Error)]
pub enum TrashError {
    /// The path to delete does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    /// No sidecar exists for the requested id.
    #[error("trash item not found: {0}")]
    ItemNotFound(String),

    /// The sidecar exists but its payload does not.
    #[error("payload of trash item {0} is missing")]
    PayloadMissing(Uuid),

    /// The path cannot be moved to the trash.
    #[error("cannot move {path} to trash: {reason}")]
    InvalidTarget {
        /// The rejected path.
        path: PathBuf,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Something already occupies the restore destination.
    #[error("restore destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// The sidecar is not valid JSON of the expected shape.
    #[error("corrupt trash metadata {path}: {source}")]
    Metadata {
        /// Sidecar path.
        path: PathBuf,
        /// Parse failure.
        #[source]
        source: serde_json::Error,
    },

    /// The sidecar parsed but describes an unusable item.
    #[error("invalid trash metadata {path}: {reason}")]
    InvalidMetadata {
        /// Sidecar path.
        path: PathBuf,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// IO error.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },
}

impl TrashError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Persisted sidecar contents.
///
/// The key set is shared with existing trash directories and must stay
/// stable. Unknown keys are ignored when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashMetadata {
    /// Trash id, also the file name stem of the sidecar.
    pub id: String,
    /// Absolute path the item was deleted from.
    pub original_path: String,
    /// Base name of the item.
    pub original_name: String,
    /// Deletion time, ISO-8601.
    pub deleted_at: String,
    /// Whether the payload is a directory.
    pub is_dir: bool,
}

/// An item currently held in the trash.
#[derive(Debug, Clone, PartialEq)]
pub struct TrashEntry {
    /// Trash id.
    pub id: Uuid,
    /// Absolute path the item was deleted from.
    pub original_path: PathBuf,
    /// Base name of the item.
    pub original_name: String,
    /// Deletion time as persisted.
    pub deleted_at: String,
    /// Deletion time, if `deleted_at` could be parsed.
    pub deleted_at_parsed: Option<DateTime<FixedOffset>>,
    /// Whether the payload is a directory.
    pub is_dir: bool,
    /// Current payload size in bytes, recursive for directories.
    pub size: u64,
}

impl TrashEntry {
    fn new(id: Uuid, metadata: TrashMetadata, size: u64) -> Self {
        let deleted_at_parsed = parse_iso8601(&metadata.deleted_at);
        Self {
            id,
            original_path: PathBuf::from(metadata.original_path),
            original_name: metadata.original_name,
            deleted_at: metadata.deleted_at,
            deleted_at_parsed,
            is_dir: metadata.is_dir,
            size,
        }
    }

    /// Convert to protocol TrashItem.
    pub fn to_protocol(&self) -> TrashItem {
        TrashItem {
            id: self.id.to_string(),
            original_path: self.original_path.to_string_lossy().into_owned(),
            original_name: self.original_name.clone(),
            deleted_at: self.deleted_at.clone(),
            deleted_at_fmt: self
                .deleted_at_parsed
                .as_ref()
                .map(format_datetime)
                .unwrap_or_else(|| "Unknown".to_string()),
            is_dir: self.is_dir,
            size: self.size,
            size_fmt: format_size(self.size),
        }
    }
}

/// Move/restore/purge lifecycle over a trash directory.
///
/// The store exclusively owns the contents of its root directory, which is
/// created on first use.
#[derive(Debug, Clone)]
pub struct TrashStore {
    root: PathBuf,
}

impl TrashStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The trash directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Move `path` into the trash and return the new item's id.
    ///
    /// The payload is moved before the sidecar is written. If the move fails
    /// nothing changes. If the sidecar write fails after a successful move,
    /// the payload stays in the trash unlisted and the error is returned.
    pub fn delete(&self, path: &Path) -> Result<Uuid, TrashError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                TrashError::PathNotFound(path.to_path_buf())
            } else {
                TrashError::io(format!("failed to stat {}", path.display()), e)
            }
        })?;

        let original = normalize(path)
            .map_err(|e| TrashError::io(format!("failed to resolve {}", path.display()), e))?;
        let (original_path, original_name) = self.check_target(&original)?;

        self.ensure_root()?;

        let id = Uuid::new_v4();
        let payload = self.payload_path(&id, &original_name);

        move_path(&original, &payload).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                TrashError::PathNotFound(original.clone())
            } else {
                TrashError::io(format!("failed to move {} to trash", original.display()), e)
            }
        })?;

        let sidecar = TrashMetadata {
            id: id.to_string(),
            original_path,
            original_name,
            deleted_at: format_iso8601(Local::now()),
            is_dir: metadata.is_dir(),
        };

        if let Err(e) = self.write_sidecar(&id, &sidecar) {
            error!(
                id = %id,
                payload = %payload.display(),
                error = %e,
                "Trash metadata write failed, payload left unlisted in trash"
            );
            return Err(e);
        }

        info!(id = %id, path = %original.display(), "Moved to trash");
        Ok(id)
    }

    /// List every item in the trash, newest first.
    ///
    /// Sidecars whose payload is gone are removed. Unreadable sidecars are
    /// skipped. Items without a parseable deletion time sort last, ties are
    /// broken by id.
    pub fn list(&self) -> Result<Vec<TrashEntry>, TrashError> {
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(TrashError::io(
                    format!("failed to read trash directory {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut items = Vec::new();
        for entry in dir.filter_map(Result::ok) {
            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|n| n.strip_suffix(SIDECAR_SUFFIX))
            else {
                continue;
            };
            let Some(id) = parse_id(stem) else {
                debug!(file = ?file_name, "Ignoring sidecar with a non-uuid name");
                continue;
            };

            match self.inspect(&id) {
                Ok((metadata, Some(payload_meta))) => {
                    let payload = self.payload_path(&id, &metadata.original_name);
                    let size = payload_size(&payload, &payload_meta);
                    items.push(TrashEntry::new(id, metadata, size));
                }
                Ok((_, None)) => self.remove_orphan(&id),
                // Removed by a concurrent restore or purge.
                Err(TrashError::ItemNotFound(_)) => {}
                Err(e) => debug!(id = %id, error = %e, "Skipping unreadable trash item"),
            }
        }

        items.sort_by(|a, b| {
            match (&a.deleted_at_parsed, &b.deleted_at_parsed) {
                (Some(x), Some(y)) => y.cmp(x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
            .then_with(|| a.id.cmp(&b.id))
        });

        Ok(items)
    }

    /// Look up a single item.
    pub fn get(&self, id: &str) -> Result<TrashEntry, TrashError> {
        let id = parse_id(id).ok_or_else(|| TrashError::ItemNotFound(id.to_string()))?;

        match self.inspect(&id)? {
            (metadata, Some(payload_meta)) => {
                let payload = self.payload_path(&id, &metadata.original_name);
                let size = payload_size(&payload, &payload_meta);
                Ok(TrashEntry::new(id, metadata, size))
            }
            (_, None) => Err(TrashError::PayloadMissing(id)),
        }
    }

    /// Move an item back to its original path and return that path.
    ///
    /// Parent directories are recreated as needed. The sidecar is removed
    /// only after the payload is back in place; a failed move leaves the
    /// item untouched in the trash.
    pub fn restore(&self, id: &str) -> Result<PathBuf, TrashError> {
        let id = parse_id(id).ok_or_else(|| TrashError::ItemNotFound(id.to_string()))?;
        let (metadata, payload_meta) = self.inspect(&id)?;
        if payload_meta.is_none() {
            return Err(TrashError::PayloadMissing(id));
        }

        let payload = self.payload_path(&id, &metadata.original_name);
        let destination = PathBuf::from(&metadata.original_path);

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TrashError::io(format!("failed to create {}", parent.display()), e)
            })?;
        }

        // rename(2) silently replaces files.
        if fs::symlink_metadata(&destination).is_ok() {
            return Err(TrashError::DestinationExists(destination));
        }

        move_path(&payload, &destination)
            .map_err(|e| restore_failure(&id, &payload, &destination, e))?;

        if let Err(e) = remove_if_exists(&self.sidecar_path(&id)) {
            // The next listing reconciles the orphaned sidecar.
            warn!(id = %id, error = %e, "Restored item but failed to remove its metadata");
        }

        info!(id = %id, path = %destination.display(), "Restored from trash");
        Ok(destination)
    }

    /// Permanently delete an item.
    ///
    /// Payload and sidecar removal are attempted independently; items
    /// already absent are ignored. The first real failure is returned.
    pub fn purge(&self, id: &str) -> Result<(), TrashError> {
        let id = parse_id(id).ok_or_else(|| TrashError::ItemNotFound(id.to_string()))?;
        let sidecar = self.sidecar_path(&id);

        let payload = match self.load(&id) {
            Ok(metadata) => Some(self.payload_path(&id, &metadata.original_name)),
            Err(TrashError::ItemNotFound(id)) => return Err(TrashError::ItemNotFound(id)),
            // Corrupt sidecar, locate the payload by its id prefix.
            Err(e) => {
                warn!(id = %id, error = %e, "Purging item with unreadable metadata");
                self.find_payload(&id)
            }
        };

        let payload_result = match &payload {
            Some(path) => remove_path(path).or_else(ignore_not_found).map_err(|e| {
                TrashError::io(format!("failed to remove {}", path.display()), e)
            }),
            None => Ok(()),
        };

        let sidecar_result = remove_if_exists(&sidecar)
            .map_err(|e| TrashError::io(format!("failed to remove {}", sidecar.display()), e));

        payload_result?;
        sidecar_result?;

        info!(id = %id, "Permanently deleted from trash");
        Ok(())
    }

    fn sidecar_path(&self, id: &Uuid) -> PathBuf {
        self.root.join(format!("{id}{SIDECAR_SUFFIX}"))
    }

    fn payload_path(&self, id: &Uuid, original_name: &str) -> PathBuf {
        self.root.join(format!("{id}_{original_name}"))
    }

    fn ensure_root(&self) -> Result<(), TrashError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            TrashError::io(
                format!("failed to create trash directory {}", self.root.display()),
                e,
            )
        })
    }

    /// Reject paths that cannot be represented in a sidecar or that overlap
    /// the trash directory. Returns the path and base name as strings.
    fn check_target(&self, original: &Path) -> Result<(String, String), TrashError> {
        let invalid = |reason| TrashError::InvalidTarget {
            path: original.to_path_buf(),
            reason,
        };

        let name = original
            .file_name()
            .ok_or_else(|| invalid("path has no file name"))?
            .to_str()
            .ok_or_else(|| invalid("file name is not valid UTF-8"))?
            .to_string();
        let path = original
            .to_str()
            .ok_or_else(|| invalid("path is not valid UTF-8"))?
            .to_string();

        let root = normalize(&self.root).unwrap_or_else(|_| self.root.clone());
        if root.starts_with(original) {
            return Err(invalid("path contains the trash directory"));
        }
        if original.starts_with(&root) {
            return Err(invalid("path is inside the trash directory"));
        }

        Ok((path, name))
    }

    /// Atomically write a sidecar through a temporary file.
    fn write_sidecar(&self, id: &Uuid, metadata: &TrashMetadata) -> Result<(), TrashError> {
        let sidecar = self.sidecar_path(id);
        let temp = self
            .root
            .join(format!("{id}{SIDECAR_SUFFIX}{SIDECAR_TEMP_SUFFIX}"));

        let contents = serde_json::to_vec_pretty(metadata).map_err(|source| TrashError::Metadata {
            path: sidecar.clone(),
            source,
        })?;

        let result = fs::write(&temp, contents).and_then(|()| fs::rename(&temp, &sidecar));
        if let Err(e) = result {
            let _ = fs::remove_file(&temp);
            return Err(TrashError::io(
                format!("failed to write trash metadata {}", sidecar.display()),
                e,
            ));
        }

        Ok(())
    }

    /// Read and validate the sidecar of `id`.
    fn load(&self, id: &Uuid) -> Result<TrashMetadata, TrashError> {
        let path = self.sidecar_path(id);
        let contents = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                TrashError::ItemNotFound(id.to_string())
            } else {
                TrashError::io(format!("failed to read {}", path.display()), e)
            }
        })?;

        let metadata: TrashMetadata = serde_json::from_str(&contents)
            .map_err(|source| TrashError::Metadata {
                path: path.clone(),
                source,
            })?;

        let invalid = |reason| TrashError::InvalidMetadata {
            path: path.clone(),
            reason,
        };
        if parse_id(&metadata.id) != Some(*id) {
            return Err(invalid("id does not match file name"));
        }
        if !is_plain_name(&metadata.original_name) {
            return Err(invalid("original_name is not a plain file name"));
        }
        if !Path::new(&metadata.original_path).is_absolute() {
            return Err(invalid("original_path is not absolute"));
        }

        Ok(metadata)
    }

    /// Sidecar contents plus the payload's metadata, `None` if it is gone.
    fn inspect(&self, id: &Uuid) -> Result<(TrashMetadata, Option<Metadata>), TrashError> {
        let metadata = self.load(id)?;
        let payload = self.payload_path(id, &metadata.original_name);

        match fs::symlink_metadata(&payload) {
            Ok(payload_meta) => Ok((metadata, Some(payload_meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok((metadata, None)),
            Err(e) => Err(TrashError::io(
                format!("failed to stat {}", payload.display()),
                e,
            )),
        }
    }

    fn remove_orphan(&self, id: &Uuid) {
        match remove_if_exists(&self.sidecar_path(id)) {
            Ok(()) => info!(id = %id, "Removed orphaned trash metadata"),
            Err(e) => warn!(id = %id, error = %e, "Failed to remove orphaned trash metadata"),
        }
    }

    /// Find a payload by its `<id>_` prefix.
    fn find_payload(&self, id: &Uuid) -> Option<PathBuf> {
        let prefix = format!("{id}_");
        fs::read_dir(&self.root)
            .ok()?
            .filter_map(Result::ok)
            .find(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
            .map(|entry| entry.path())
    }
}

/// Parse a trash id in its canonical lowercase hyphenated form.
fn parse_id(value: &str) -> Option<Uuid> {
    let lowered = value.to_ascii_lowercase();
    Uuid::try_parse(&lowered)
        .ok()
        .filter(|id| id.hyphenated().to_string() == lowered)
}

/// A single normal path component.
fn is_plain_name(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Classify a failed restore move.
///
/// A payload that is gone by the time it is moved was taken by a concurrent
/// purge or restore.
fn restore_failure(id: &Uuid, payload: &Path, destination: &Path, e: io::Error) -> TrashError {
    if e.kind() == io::ErrorKind::NotFound && fs::symlink_metadata(payload).is_err() {
        return TrashError::PayloadMissing(*id);
    }
    TrashError::io(
        format!(
            "failed to restore {} to {}",
            payload.display(),
            destination.display()
        ),
        e,
    )
}

fn payload_size(path: &Path, metadata: &Metadata) -> u64 {
    if metadata.is_dir() {
        dir_size(path)
    } else {
        metadata.len()
    }
}

/// Recursive size of a directory, skipping anything unreadable.
///
/// Symlinks count as their own size and are never followed.
fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| entry.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Rename `from` to `to`, copying and removing the source when they are on
/// different filesystems.
///
/// A failed copy removes its partial destination. If the copy succeeds but
/// the source cannot be fully removed, the copy is kept and the error is
/// returned.
pub(crate) fn move_path(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(from = %from.display(), to = %to.display(), "Cross-device move, copying");
            if let Err(copy_err) = copy_recursive(from, to) {
                let _ = remove_path(to);
                return Err(copy_err);
            }
            remove_path(from)
        }
        Err(e) => Err(e),
    }
}

fn is_cross_device(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::CrossesDevices {
        return true;
    }
    #[cfg(unix)]
    {
        e.raw_os_error() == Some(nix::errno::Errno::EXDEV as i32)
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Copy a file, symlink or directory tree.
///
/// Directory permissions are applied once their contents are written, so
/// read-only directories can still be filled.
pub(crate) fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
    let mut directories = Vec::new();

    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from).map_err(io::Error::other)?;
        let target = if relative.as_os_str().is_empty() {
            to.to_path_buf()
        } else {
            to.join(relative)
        };

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else if file_type.is_dir() {
            fs::create_dir(&target)?;
            directories.push((target, entry.metadata()?.permissions()));
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    for (directory, permissions) in directories.into_iter().rev() {
        fs::set_permissions(&directory, permissions)?;
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(from)?, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, _to: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot copy symlink {} across devices", from.display()),
    ))
}

/// Remove a file, symlink or directory tree.
fn remove_path(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    fs::remove_file(path).or_else(ignore_not_found)
}

fn ignore_not_found(e: io::Error) -> io::Result<()> {
    if e.kind() == io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(e)
    }
}
