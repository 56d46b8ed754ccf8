//! # FileEX Library
//!
//! This crate provides a local file browser service: directory listings
//! guarded against system locations, a recoverable trash, and previews of
//! images and archives.
//!
//! ## Overview
//!
//! - **Path Guard**: Deny configured system paths, `..` traversal and symlinks
//! - **Directory Listing**: Drives with capacity stats, sorted and paginated children
//! - **Trash Store**: Crash-safe trash with JSON sidecars and restore/purge
//! - **Previews**: Image thumbnails, archive listings and member extraction
//! - **IPC**: Newline-delimited JSON over a Unix socket for the CLI
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   JSON lines   ┌────────────┐   ┌──────────────┐
//! │  IpcClient   │ ─────────────▶ │ FileServer │ ─▶│RequestRouter │
//! └──────────────┘                └────────────┘   └──────┬───────┘
//!                                                         ▼
//!                     ┌──────────────────────────────────────────┐
//!                     │               FileService                │
//!                     │  PathGuard  DirectoryBrowser  TrashStore │
//!                     │             PreviewService               │
//!                     └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fileex::{Config, FileService, Page};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let service = FileService::new(&config);
//!
//!     let listing = service.list_directory(Some("/home"), Page::default())?;
//!     for entry in &listing.entries {
//!         println!("{}", entry.name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Guard, listing, trash, previews and formatting
//! - [`service`]: Operations façade used by every transport
//! - [`router`]: Request dispatch to the service
//! - [`ipc`]: Unix socket transport
//! - [`server`]: Accept loop and graceful shutdown
//! - [`logging`]: Tracing subscriber setup

pub mod config;
pub mod files;
pub mod ipc;
pub mod logging;
pub mod router;
pub mod server;
pub mod service;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::Config;

// Re-export files types for convenience
pub use files::{
    format_size, format_timestamp, DirectoryBrowser, PathEntry, PathGuard, PreviewService,
    TrashEntry, TrashStore,
};

// Re-export service types for convenience
pub use service::{DirectoryListing, FileService, Page, ServiceError};

// Re-export router and server types for convenience
pub use router::{RequestRouter, RouterError, RouterResult};
pub use server::FileServer;
