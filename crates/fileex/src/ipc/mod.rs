//! Unix Domain Socket IPC module for CLI-daemon communication.
//!
//! The IPC system uses a JSON newline-delimited protocol. Each message is a
//! single JSON object followed by a newline; binary payloads such as
//! thumbnails travel base64 encoded.
//!
//! ## Socket Path
//!
//! The socket path follows the XDG Base Directory Specification:
//! - Primary: `$XDG_RUNTIME_DIR/fileex/fileex.sock`
//! - Fallback: `/tmp/fileex-$UID/fileex.sock`
//!
//! ## Example
//!
//! ```rust,no_run
//! use fileex::ipc::{get_socket_path, IpcClient, IpcResponse};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = IpcClient::connect(&get_socket_path()).await?;
//!
//!     if let IpcResponse::Trash { items } = client.list_trash().await? {
//!         println!("{} items in trash", items.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod messages;
mod server;

pub use client::IpcClient;
pub use messages::{IpcRequest, IpcResponse};
pub use server::{IpcConnection, IpcError, IpcServer};

use std::path::PathBuf;

/// Get the socket path for IPC communication.
///
/// 1. If `$XDG_RUNTIME_DIR` is set: `$XDG_RUNTIME_DIR/fileex/fileex.sock`
/// 2. Otherwise: `/tmp/fileex-$UID/fileex.sock`
#[cfg(unix)]
pub fn get_socket_path() -> PathBuf {
    match std::env::var("XDG_RUNTIME_DIR") {
        Ok(runtime_dir) if !runtime_dir.is_empty() => {
            PathBuf::from(runtime_dir).join("fileex").join("fileex.sock")
        }
        _ => {
            let uid = nix::unistd::getuid();
            PathBuf::from(format!("/tmp/fileex-{}", uid)).join("fileex.sock")
        }
    }
}

/// Non-Unix platforms are not supported for Unix Domain Sockets.
#[cfg(not(unix))]
pub fn get_socket_path() -> PathBuf {
    std::env::temp_dir().join("fileex").join("fileex.sock")
}
