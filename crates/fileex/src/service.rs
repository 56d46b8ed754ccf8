//! Request-facing façade over the filesystem core.
//!
//! [`FileService`] owns the path guard, directory browser, trash store and
//! preview service built from a [`Config`]. Every operation checks its path
//! with the guard first, mutating operations are refused while the service
//! is read-only, and component errors are folded into [`ServiceError`].

use std::io;
use std::path::{Path, PathBuf};

use protocol::{ArchiveListing, DirectoryPage, ErrorCode, ErrorMessage};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::files::{
    ArchiveBlob, BrowserError, DirectoryBrowser, FileBlob, GuardError, PathEntry, PathGuard,
    PreviewError, PreviewService, Thumbnail, TrashEntry, TrashError, TrashStore,
};

/// Errors surfaced to callers of [`FileService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A mutating operation was attempted in read-only mode.
    #[error("operation not permitted: service is in read-only mode")]
    ReadOnly,

    /// The path or trash item does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The path exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Restricted path, symlink escape, or OS-level denial.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The request is malformed or targets something unusable.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The file type is not supported by the requested operation.
    #[error("{0}")]
    Unsupported(String),

    /// Any other filesystem failure, with its cause preserved.
    #[error("{message}")]
    Io {
        /// What failed.
        message: String,
        /// Underlying cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ServiceError {
    fn io(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Box::new(err),
        }
    }

    /// Classify an IO error by kind, keeping it as the source.
    fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            _ => Self::io(err),
        }
    }

    /// Wire error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ReadOnly => ErrorCode::ReadOnly,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::NotADirectory(_) => ErrorCode::NotADirectory,
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::InvalidRequest(_) | Self::Unsupported(_) => ErrorCode::InvalidRequest,
            Self::Io { .. } => ErrorCode::Io,
        }
    }

    /// Convert to the wire error message.
    pub fn to_protocol(&self) -> ErrorMessage {
        ErrorMessage::new(self.code(), self.to_string())
    }
}

impl From<GuardError> for ServiceError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::Restricted(_) | GuardError::SymlinkEscape { .. } => {
                Self::PermissionDenied(err.to_string())
            }
            GuardError::Unresolvable { ref source, .. } => match source.kind() {
                io::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
                _ => Self::io(err),
            },
        }
    }
}

impl From<BrowserError> for ServiceError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::PathNotFound(_) => Self::NotFound(err.to_string()),
            BrowserError::NotADirectory(path) => Self::NotADirectory(path),
            BrowserError::PermissionDenied(_) => Self::PermissionDenied(err.to_string()),
            BrowserError::Io { .. } => Self::io(err),
        }
    }
}

impl From<TrashError> for ServiceError {
    fn from(err: TrashError) -> Self {
        match err {
            TrashError::PathNotFound(_)
            | TrashError::ItemNotFound(_)
            | TrashError::PayloadMissing(_) => Self::NotFound(err.to_string()),
            TrashError::InvalidTarget { .. } => Self::InvalidRequest(err.to_string()),
            TrashError::Io { ref source, .. }
                if source.kind() == io::ErrorKind::PermissionDenied =>
            {
                Self::PermissionDenied(err.to_string())
            }
            TrashError::DestinationExists(_)
            | TrashError::Metadata { .. }
            | TrashError::InvalidMetadata { .. }
            | TrashError::Io { .. } => Self::io(err),
        }
    }
}

impl From<PreviewError> for ServiceError {
    fn from(err: PreviewError) -> Self {
        match err {
            PreviewError::NotFound(_) | PreviewError::EntryNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            PreviewError::UnsupportedType(_) => Self::Unsupported(err.to_string()),
            PreviewError::NotAFile(_)
            | PreviewError::InvalidArchive { .. }
            | PreviewError::NotExtractable(_)
            | PreviewError::TooLarge { .. } => Self::InvalidRequest(err.to_string()),
            PreviewError::Io(io) => Self::from_io(io),
            PreviewError::Image(_) => Self::io(err),
        }
    }
}

/// Pagination window applied after sorting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// Entries to skip.
    pub skip: usize,
    /// Maximum entries to return. `None` uses the configured page size.
    pub limit: Option<usize>,
}

impl Page {
    /// A page starting at `skip` with at most `limit` entries.
    pub fn new(skip: usize, limit: Option<usize>) -> Self {
        Self { skip, limit }
    }
}

/// One page of a directory or drive listing.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    /// Listed directory, `None` for the drive list.
    pub path: Option<PathBuf>,
    /// Entries in the requested window, sorted.
    pub entries: Vec<PathEntry>,
    /// Number of entries before pagination.
    pub total: usize,
    /// Entries skipped.
    pub skip: usize,
    /// Effective page size.
    pub limit: usize,
}

impl DirectoryListing {
    /// Convert to protocol DirectoryPage.
    pub fn to_protocol(&self) -> DirectoryPage {
        DirectoryPage {
            path: self
                .path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            entries: self.entries.iter().map(PathEntry::to_protocol).collect(),
            total: self.total,
            skip: self.skip,
            limit: self.limit,
        }
    }
}

/// Synchronous filesystem operations behind every request.
#[derive(Debug, Clone)]
pub struct FileService {
    guard: PathGuard,
    browser: DirectoryBrowser,
    trash: TrashStore,
    preview: PreviewService,
    read_only: bool,
    page_size: usize,
}

impl FileService {
    /// Build the service from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            guard: PathGuard::new(&config.files.restricted_paths),
            browser: DirectoryBrowser::new(config.files.mount_root.clone()),
            trash: TrashStore::new(config.trash_dir()),
            preview: PreviewService::new(
                config.preview.thumbnail_size,
                config.preview.max_extract_size,
            ),
            read_only: config.files.read_only,
            page_size: config.files.page_size,
        }
    }

    /// Whether mutating operations are refused.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The trash directory.
    pub fn trash_root(&self) -> &Path {
        self.trash.root()
    }

    /// List a directory page, or the drives when `path` is `None` or empty.
    #[instrument(level = "debug", skip(self), err)]
    pub fn list_directory(
        &self,
        path: Option<&str>,
        page: Page,
    ) -> Result<DirectoryListing, ServiceError> {
        let limit = page.limit.unwrap_or(self.page_size);
        if limit == 0 {
            return Err(ServiceError::InvalidRequest(
                "limit must be at least 1".to_string(),
            ));
        }

        let (path, entries) = match path.filter(|p| !p.is_empty()) {
            None => {
                self.guard.validate(None)?;
                (None, self.browser.list(None)?)
            }
            Some(raw) => {
                let checked = self.guard.check(&request_path(raw))?;
                let entries = self.browser.list(Some(&checked))?;
                (Some(checked), entries)
            }
        };

        let total = entries.len();
        let entries = entries.into_iter().skip(page.skip).take(limit).collect();

        Ok(DirectoryListing {
            path,
            entries,
            total,
            skip: page.skip,
            limit,
        })
    }

    /// Move a file or directory to the trash.
    #[instrument(level = "debug", skip(self), err)]
    pub fn move_to_trash(&self, path: &str) -> Result<Uuid, ServiceError> {
        self.ensure_writable()?;
        let checked = self.check_required(path)?;
        Ok(self.trash.delete(&checked)?)
    }

    /// List the trash, newest first.
    #[instrument(level = "debug", skip(self), err)]
    pub fn list_trash(&self) -> Result<Vec<TrashEntry>, ServiceError> {
        Ok(self.trash.list()?)
    }

    /// Restore a trashed item to its original path.
    ///
    /// The original path must still pass the guard, so items deleted before
    /// a prefix became restricted stay in the trash.
    #[instrument(level = "debug", skip(self), err)]
    pub fn restore_from_trash(&self, id: &str) -> Result<PathBuf, ServiceError> {
        self.ensure_writable()?;
        let entry = self.trash.get(id)?;
        self.guard.check(&entry.original_path)?;
        Ok(self.trash.restore(id)?)
    }

    /// Permanently delete a trashed item.
    #[instrument(level = "debug", skip(self), err)]
    pub fn purge_from_trash(&self, id: &str) -> Result<(), ServiceError> {
        self.ensure_writable()?;
        Ok(self.trash.purge(id)?)
    }

    /// Read the contents of a regular file for viewing.
    #[instrument(level = "debug", skip(self), err)]
    pub fn read_file(&self, path: &str) -> Result<FileBlob, ServiceError> {
        let checked = self.check_required(path)?;
        Ok(self.preview.read_file(&checked)?)
    }

    /// Render a thumbnail of an image file.
    #[instrument(level = "debug", skip(self), err)]
    pub fn thumbnail(&self, path: &str) -> Result<Thumbnail, ServiceError> {
        let checked = self.check_required(path)?;
        Ok(self.preview.thumbnail(&checked)?)
    }

    /// List the members of an archive file.
    #[instrument(level = "debug", skip(self), err)]
    pub fn list_archive(&self, path: &str) -> Result<ArchiveListing, ServiceError> {
        let checked = self.check_required(path)?;
        Ok(self.preview.list_archive(&checked)?)
    }

    /// Extract a single archive member.
    #[instrument(level = "debug", skip(self), err)]
    pub fn read_archive_entry(
        &self,
        path: &str,
        entry: &str,
    ) -> Result<ArchiveBlob, ServiceError> {
        if entry.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "entry name is empty".to_string(),
            ));
        }
        let checked = self.check_required(path)?;
        Ok(self.preview.read_archive_entry(&checked, entry)?)
    }

    fn ensure_writable(&self) -> Result<(), ServiceError> {
        if self.read_only {
            tracing::warn!("Rejected mutating request in read-only mode");
            return Err(ServiceError::ReadOnly);
        }
        Ok(())
    }

    fn check_required(&self, path: &str) -> Result<PathBuf, ServiceError> {
        if path.is_empty() {
            return Err(ServiceError::InvalidRequest("path is empty".to_string()));
        }
        Ok(self.guard.check(&request_path(path))?)
    }
}

/// Interpret a request path. A bare Windows drive letter such as `C:` means
/// the drive root rather than the drive's current directory.
fn request_path(raw: &str) -> PathBuf {
    if cfg!(windows) && is_bare_drive(raw) {
        return PathBuf::from(format!("{raw}\\"));
    }
    PathBuf::from(raw)
}

fn is_bare_drive(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
