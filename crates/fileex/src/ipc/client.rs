//! IPC Client for communicating with the daemon via Unix Domain Sockets.
//!
//! The client connects to the daemon's Unix socket and sends requests,
//! receiving responses in a request-response pattern.

use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::messages::{IpcRequest, IpcResponse};
use super::server::IpcError;

/// Default timeout for client operations in seconds.
///
/// Large directories and archive extraction can take a while.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A client for communicating with the daemon via IPC.
pub struct IpcClient {
    reader: BufReader<tokio::io::ReadHalf<UnixStream>>,
    writer: tokio::io::WriteHalf<UnixStream>,
    timeout: Duration,
}

impl IpcClient {
    /// Connect to the daemon at the specified socket path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    /// This typically indicates that the daemon is not running.
    pub async fn connect(path: &Path) -> Result<Self, IpcError> {
        Self::connect_with_timeout(path, Duration::from_secs(DEFAULT_TIMEOUT_SECS)).await
    }

    /// Connect to the daemon with a custom timeout.
    ///
    /// The timeout applies to the connection attempt and to every request.
    pub async fn connect_with_timeout(path: &Path, timeout: Duration) -> Result<Self, IpcError> {
        let connect_future = UnixStream::connect(path);
        let stream = tokio::time::timeout(timeout, connect_future)
            .await
            .map_err(|_| {
                IpcError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connection timed out",
                ))
            })?
            .map_err(IpcError::Io)?;

        let (read_half, write_half) = tokio::io::split(stream);

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            timeout,
        })
    }

    /// Set the timeout for operations.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send a request to the daemon and wait for a response.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request cannot be serialized
    /// - The request cannot be sent
    /// - The response cannot be read
    /// - The response cannot be parsed
    /// - The operation times out
    pub async fn send(&mut self, request: IpcRequest) -> Result<IpcResponse, IpcError> {
        tokio::time::timeout(self.timeout, self.send_internal(request))
            .await
            .map_err(|_| {
                IpcError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "operation timed out",
                ))
            })?
    }

    /// Internal send implementation without timeout.
    async fn send_internal(&mut self, request: IpcRequest) -> Result<IpcResponse, IpcError> {
        let mut json = serde_json::to_string(&request).map_err(IpcError::Json)?;
        json.push('\n');

        self.writer
            .write_all(json.as_bytes())
            .await
            .map_err(IpcError::Io)?;
        self.writer.flush().await.map_err(IpcError::Io)?;

        let mut line = String::new();
        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(IpcError::Io)?;

        if bytes_read == 0 {
            return Err(IpcError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "daemon closed connection",
            )));
        }

        let response = serde_json::from_str(line.trim()).map_err(IpcError::Json)?;
        Ok(response)
    }

    /// Send a ping request to check if the daemon is responsive.
    ///
    /// Returns `true` if the daemon responds with a Pong, `false` otherwise.
    pub async fn ping(&mut self) -> Result<bool, IpcError> {
        let response = self.send(IpcRequest::Ping).await?;
        Ok(matches!(response, IpcResponse::Pong))
    }

    /// List a directory page, or the drives when `path` is `None`.
    pub async fn list_directory(
        &mut self,
        path: Option<String>,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::ListDirectory { path, skip, limit })
            .await
    }

    /// Move a path to the trash.
    pub async fn move_to_trash(&mut self, path: String) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::MoveToTrash { path }).await
    }

    /// List the trash.
    pub async fn list_trash(&mut self) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::ListTrash).await
    }

    /// Restore a trashed item.
    pub async fn restore_from_trash(&mut self, id: String) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::RestoreFromTrash { id }).await
    }

    /// Permanently delete a trashed item.
    pub async fn purge_from_trash(&mut self, id: String) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::PurgeFromTrash { id }).await
    }

    /// List the members of an archive.
    pub async fn list_archive(&mut self, path: String) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::ListArchive { path }).await
    }

    /// Extract one archive member.
    pub async fn read_archive_entry(
        &mut self,
        path: String,
        entry: String,
    ) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::ReadArchiveEntry { path, entry }).await
    }

    /// Read a whole file.
    pub async fn view_file(&mut self, path: String) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::ViewFile { path }).await
    }

    /// Render an image thumbnail.
    pub async fn thumbnail(&mut self, path: String) -> Result<IpcResponse, IpcError> {
        self.send(IpcRequest::Thumbnail { path }).await
    }
}
