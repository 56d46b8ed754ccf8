//! Filesystem core for directory browsing, trash and previews.
//!
//! This module provides the operations behind every request:
//! - Restricted-path and symlink gating of incoming paths
//! - Sorted, non-recursive directory and volume listing
//! - A recoverable trash backed by JSON sidecar files
//! - Image thumbnails and archive inspection
//! - Human-readable size and time formatting
//!
//! # Security
//!
//! All paths are checked by [`PathGuard`] before they reach the filesystem.
//! Traversal is resolved lexically before the restricted-prefix comparison,
//! and any path whose real location differs from its apparent one is
//! rejected.

pub mod browser;
pub mod format;
pub mod guard;
pub mod preview;
pub mod trash;
pub mod volume;

pub use browser::{BrowserError, DirectoryBrowser, PathEntry};
pub use format::{format_iso8601, format_size, format_timestamp, parse_iso8601};
pub use guard::{GuardError, PathGuard};
pub use preview::{
    ArchiveBlob, ArchiveFormat, FileBlob, PreviewError, PreviewService, Thumbnail,
};
pub use trash::{TrashEntry, TrashError, TrashMetadata, TrashStore, SIDECAR_SUFFIX};
pub use volume::{DiskUsage, VolumeStats};
