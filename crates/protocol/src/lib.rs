//! # FileEX Protocol Library
//!
//! Wire types shared by the FileEX daemon and its clients.
//!
//! ## Overview
//!
//! - **Listings**: [`FileEntry`] and [`DirectoryPage`] for directory and drive
//!   enumeration
//! - **Trash**: [`TrashItem`] describing an item held in the trash
//! - **Archives**: [`ArchiveListing`] and [`ArchiveEntry`] for archive previews
//! - **Errors**: [`ErrorCode`] and [`ErrorMessage`] for failed requests
//!
//! All types serialize with `serde`; the daemon transports them as JSON.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{ErrorCode, ErrorMessage};
//!
//! let err = ErrorMessage::new(ErrorCode::NotFound, "path not found: /srv/missing");
//! assert_eq!(err.code, ErrorCode::NotFound);
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Listing, trash and archive payloads
//! - [`error`]: Error codes

pub mod error;
pub mod messages;

pub use error::{ErrorCode, ErrorMessage};
pub use messages::{
    ArchiveEntry, ArchiveListing, DirectoryPage, DriveStats, EntryKind, FileEntry, TrashItem,
};
