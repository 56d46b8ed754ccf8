//! Request router for dispatching IPC requests to the file service.
//!
//! This module provides the `RequestRouter` struct that receives IPC requests
//! and routes them to the matching [`FileService`] operation. Service calls
//! are synchronous filesystem work, so each one runs on tokio's blocking pool.

use std::sync::Arc;

use protocol::{ErrorCode, ErrorMessage};
use tracing::{debug, error, warn};

use crate::ipc::{IpcRequest, IpcResponse};
use crate::service::{FileService, Page, ServiceError};

/// Result type for router operations.
pub type RouterResult = Result<IpcResponse, RouterError>;

/// Errors that can occur during request routing.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The file service rejected the request.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The blocking task running the request failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// Convert the error to a protocol ErrorMessage.
    pub fn to_error_message(&self) -> ErrorMessage {
        match self {
            RouterError::Service(e) => e.to_protocol(),
            RouterError::Internal(_) => ErrorMessage::new(ErrorCode::Io, self.to_string()),
        }
    }
}

/// Request router that dispatches requests to the file service.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    /// Service shared with blocking tasks.
    service: Arc<FileService>,
}

impl RequestRouter {
    /// Create a new request router.
    pub fn new(service: Arc<FileService>) -> Self {
        Self { service }
    }

    /// Handle a request, turning failures into [`IpcResponse::Error`].
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        match self.route(request).await {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_error_message();
                if message.code == ErrorCode::Io {
                    error!(error = %e, "Request failed");
                } else {
                    debug!(error = %e, "Request rejected");
                }
                IpcResponse::Error(message)
            }
        }
    }

    /// Route a request to the matching service operation.
    pub async fn route(&self, request: IpcRequest) -> RouterResult {
        debug!(?request, "Routing request");

        match request {
            IpcRequest::Ping => Ok(IpcResponse::Pong),

            IpcRequest::ListDirectory { path, skip, limit } => {
                self.blocking(move |service| {
                    let listing = service.list_directory(path.as_deref(), Page::new(skip, limit))?;
                    Ok(IpcResponse::Directory(listing.to_protocol()))
                })
                .await
            }

            IpcRequest::MoveToTrash { path } => {
                self.blocking(move |service| {
                    let id = service.move_to_trash(&path)?;
                    Ok(IpcResponse::Trashed { id: id.to_string() })
                })
                .await
            }

            IpcRequest::ListTrash => {
                self.blocking(|service| {
                    let items = service.list_trash()?;
                    Ok(IpcResponse::Trash {
                        items: items.iter().map(|item| item.to_protocol()).collect(),
                    })
                })
                .await
            }

            IpcRequest::RestoreFromTrash { id } => {
                self.blocking(move |service| {
                    let path = service.restore_from_trash(&id)?;
                    Ok(IpcResponse::Restored {
                        path: path.to_string_lossy().into_owned(),
                    })
                })
                .await
            }

            IpcRequest::PurgeFromTrash { id } => {
                self.blocking(move |service| {
                    service.purge_from_trash(&id)?;
                    Ok(IpcResponse::Purged { id })
                })
                .await
            }

            IpcRequest::ViewFile { path } => {
                self.blocking(move |service| {
                    let file = service.read_file(&path)?;
                    Ok(IpcResponse::blob(file.mime, &file.data))
                })
                .await
            }

            IpcRequest::ListArchive { path } => {
                self.blocking(move |service| Ok(IpcResponse::Archive(service.list_archive(&path)?)))
                    .await
            }

            IpcRequest::ReadArchiveEntry { path, entry } => {
                self.blocking(move |service| {
                    let blob = service.read_archive_entry(&path, &entry)?;
                    Ok(IpcResponse::blob(blob.mime, &blob.data))
                })
                .await
            }

            IpcRequest::Thumbnail { path } => {
                self.blocking(move |service| {
                    let thumbnail = service.thumbnail(&path)?;
                    Ok(IpcResponse::blob(thumbnail.mime, &thumbnail.data))
                })
                .await
            }
        }
    }

    /// Run a service call on the blocking pool.
    async fn blocking<F>(&self, f: F) -> RouterResult
    where
        F: FnOnce(&FileService) -> Result<IpcResponse, ServiceError> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        match tokio::task::spawn_blocking(move || f(&service)).await {
            Ok(result) => result.map_err(RouterError::from),
            Err(e) => {
                warn!(error = %e, "Blocking task failed");
                Err(RouterError::Internal(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn router(read_only: bool) -> (TempDir, PathBuf, RequestRouter) {
        let temp = TempDir::new().unwrap();
        let root = dunce::canonicalize(temp.path()).unwrap();

        let mut config = Config::default();
        config.daemon.data_dir = root.join("data");
        config.files.restricted_paths = Vec::new();
        config.files.read_only = read_only;

        let router = RequestRouter::new(Arc::new(FileService::new(&config)));
        (temp, root, router)
    }

    #[tokio::test]
    async fn test_ping() {
        let (_temp, _root, router) = router(true);
        assert_eq!(router.handle(IpcRequest::Ping).await, IpcResponse::Pong);
    }

    #[tokio::test]
    async fn test_list_directory() {
        let (_temp, root, router) = router(true);
        fs::write(root.join("a.txt"), "a").unwrap();

        let response = router
            .handle(IpcRequest::ListDirectory {
                path: Some(root.to_string_lossy().into_owned()),
                skip: 0,
                limit: None,
            })
            .await;

        match response {
            IpcResponse::Directory(page) => {
                assert_eq!(page.total, 1);
                assert_eq!(page.limit, Config::default().files.page_size);
                assert_eq!(page.entries[0].name, "a.txt");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_read_only_error_response() {
        let (_temp, root, router) = router(true);
        fs::write(root.join("a.txt"), "a").unwrap();

        let response = router
            .handle(IpcRequest::MoveToTrash {
                path: root.join("a.txt").to_string_lossy().into_owned(),
            })
            .await;

        match response {
            IpcResponse::Error(err) => assert_eq!(err.code, ErrorCode::ReadOnly),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_trash_roundtrip() {
        let (_temp, root, router) = router(false);
        let file = root.join("doc.txt");
        fs::write(&file, "doc").unwrap();

        let id = match router
            .handle(IpcRequest::MoveToTrash {
                path: file.to_string_lossy().into_owned(),
            })
            .await
        {
            IpcResponse::Trashed { id } => id,
            other => panic!("unexpected response: {other:?}"),
        };

        match router.handle(IpcRequest::ListTrash).await {
            IpcResponse::Trash { items } => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].id, id);
                assert_eq!(items[0].original_name, "doc.txt");
            }
            other => panic!("unexpected response: {other:?}"),
        }

        let response = router
            .handle(IpcRequest::RestoreFromTrash { id: id.clone() })
            .await;
        assert_eq!(
            response,
            IpcResponse::Restored {
                path: file.to_string_lossy().into_owned()
            }
        );
        assert!(file.exists());

        match router.handle(IpcRequest::PurgeFromTrash { id }).await {
            IpcResponse::Error(err) => assert_eq!(err.code, ErrorCode::NotFound),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_view_file() {
        let (_temp, root, router) = router(true);
        fs::write(root.join("a.txt"), "contents").unwrap();

        let response = router
            .handle(IpcRequest::ViewFile {
                path: root.join("a.txt").to_string_lossy().into_owned(),
            })
            .await;
        match &response {
            IpcResponse::Blob { mime, .. } => assert_eq!(mime, "text/plain"),
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(response.blob_bytes().unwrap().unwrap(), b"contents".to_vec());

        let response = router
            .handle(IpcRequest::ViewFile {
                path: root.to_string_lossy().into_owned(),
            })
            .await;
        match response {
            IpcResponse::Error(err) => assert_eq!(err.code, ErrorCode::NotFound),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_internal_error_message() {
        let err = RouterError::Internal("task panicked".to_string());
        let message = err.to_error_message();
        assert_eq!(message.code, ErrorCode::Io);
        assert!(message.message.contains("task panicked"));
    }
}
