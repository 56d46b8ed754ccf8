//! Wire representations of directory listings, trash items and archive
//! previews.
//!
//! These types are what the daemon hands to its clients. They carry both the
//! raw values (bytes, epoch seconds) and the human-readable renderings the
//! daemon computed, so clients never need to reimplement the formatting.

use serde::{Deserialize, Serialize};

/// Kind of a listed filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A volume or mount point, only returned when no path was requested.
    Drive,
    /// A directory.
    Folder,
    /// Anything that is not a directory.
    File,
}

/// Capacity statistics for a drive entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum DriveStats {
    /// Capacity could be read from the filesystem.
    Known {
        /// Total capacity in bytes.
        total_bytes: u64,
        /// Bytes available to unprivileged users.
        free_bytes: u64,
        /// Used share of the volume, one decimal place.
        used_percent: f64,
        /// `total_bytes` rendered for display.
        total_fmt: String,
        /// `free_bytes` rendered for display.
        free_fmt: String,
    },
    /// Statistics could not be read for this volume.
    Unknown,
}

/// A single directory child or drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Absolute path.
    pub path: String,
    /// Whether the entry is a directory (drives count as directories).
    pub is_dir: bool,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Size in bytes, absent for directories and drives.
    pub size: Option<u64>,
    /// Size rendered for display, `-` for directories.
    pub size_fmt: String,
    /// Last modified timestamp (Unix epoch seconds).
    pub modified: Option<u64>,
    /// Last modified time rendered in local time.
    pub modified_fmt: Option<String>,
    /// Capacity of a drive entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<DriveStats>,
}

/// One page of a directory listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryPage {
    /// The listed path, `None` for the drive list.
    pub path: Option<String>,
    /// Entries on this page.
    pub entries: Vec<FileEntry>,
    /// Number of entries in the whole listing.
    pub total: usize,
    /// Number of entries skipped before this page.
    pub skip: usize,
    /// Page size the listing was cut to.
    pub limit: usize,
}

/// An item currently held in the trash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashItem {
    /// Trash identifier.
    pub id: String,
    /// Absolute path the item was deleted from.
    pub original_path: String,
    /// Base name of the deleted item.
    pub original_name: String,
    /// Deletion time as persisted (ISO-8601).
    pub deleted_at: String,
    /// Deletion time rendered in local time, `Unknown` if unparseable.
    pub deleted_at_fmt: String,
    /// Whether the payload is a directory.
    pub is_dir: bool,
    /// Current payload size in bytes.
    pub size: u64,
    /// Payload size rendered for display.
    pub size_fmt: String,
}

/// One member of an archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Member path inside the archive.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Stored size in bytes (equal to `size` for tar members).
    pub compressed: u64,
    /// Whether the member is a directory.
    pub is_dir: bool,
    /// `size` rendered for display, `-` for directories.
    pub size_fmt: String,
    /// `compressed` rendered for display, `-` for directories.
    pub compressed_fmt: String,
}

/// Contents of an archive file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveListing {
    /// Base name of the archive file.
    pub filename: String,
    /// Number of non-directory members.
    pub total_files: usize,
    /// Number of directory members.
    pub total_dirs: usize,
    /// Members, directories first.
    pub entries: Vec<ArchiveEntry>,
}
