//! IPC message types for CLI-daemon communication.
//!
//! This module defines the request and response types used for communication
//! between the CLI and the daemon over Unix Domain Sockets.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use protocol::{ArchiveListing, DirectoryPage, ErrorMessage, TrashItem};
use serde::{Deserialize, Serialize};

/// Requests that can be sent from the CLI to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum IpcRequest {
    /// Check if the daemon is alive.
    Ping,
    /// List a directory, or the drives when `path` is empty.
    ListDirectory {
        /// Directory to list. `None` or empty lists drives.
        path: Option<String>,
        /// Entries to skip after sorting.
        #[serde(default)]
        skip: usize,
        /// Maximum entries to return. `None` uses the configured page size.
        #[serde(default)]
        limit: Option<usize>,
    },
    /// Move a file or directory to the trash.
    MoveToTrash {
        /// Path to delete.
        path: String,
    },
    /// List everything in the trash.
    ListTrash,
    /// Move a trashed item back to where it came from.
    RestoreFromTrash {
        /// Trash id.
        id: String,
    },
    /// Permanently delete a trashed item.
    PurgeFromTrash {
        /// Trash id.
        id: String,
    },
    /// Read a whole regular file.
    ViewFile {
        /// File path.
        path: String,
    },
    /// List the members of an archive.
    ListArchive {
        /// Archive path.
        path: String,
    },
    /// Extract one member of an archive.
    ReadArchiveEntry {
        /// Archive path.
        path: String,
        /// Member name as listed.
        entry: String,
    },
    /// Render a thumbnail of an image.
    Thumbnail {
        /// Image path.
        path: String,
    },
}

/// Responses sent from the daemon to the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IpcResponse {
    /// Response to a Ping request.
    Pong,
    /// One page of a directory listing.
    Directory(DirectoryPage),
    /// The item was moved to the trash.
    Trashed {
        /// Id of the new trash item.
        id: String,
    },
    /// Trash contents, newest first.
    Trash {
        /// Items in the trash.
        items: Vec<TrashItem>,
    },
    /// The item was restored.
    Restored {
        /// Path the item was restored to.
        path: String,
    },
    /// The item was permanently deleted.
    Purged {
        /// Id of the deleted item.
        id: String,
    },
    /// Archive member listing.
    Archive(ArchiveListing),
    /// Binary content, base64 encoded.
    Blob {
        /// MIME type of the content.
        mime: String,
        /// Base64 encoded bytes.
        data: String,
    },
    /// An error occurred processing the request.
    Error(ErrorMessage),
}

impl IpcResponse {
    /// Build a [`IpcResponse::Blob`] from raw bytes.
    pub fn blob(mime: impl Into<String>, bytes: &[u8]) -> Self {
        Self::Blob {
            mime: mime.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Decode the bytes of a [`IpcResponse::Blob`].
    ///
    /// Returns `None` for other responses.
    pub fn blob_bytes(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        match self {
            Self::Blob { data, .. } => Some(STANDARD.decode(data)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::ErrorCode;

    #[test]
    fn test_request_ping_serialization() {
        let request = IpcRequest::Ping;
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#""Ping""#);

        let deserialized: IpcRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, request);
    }

    #[test]
    fn test_request_list_directory_defaults() {
        let request: IpcRequest =
            serde_json::from_str(r#"{"ListDirectory":{"path":"/srv"}}"#).unwrap();
        assert_eq!(
            request,
            IpcRequest::ListDirectory {
                path: Some("/srv".to_string()),
                skip: 0,
                limit: None,
            }
        );
    }

    #[test]
    fn test_request_trash_serialization() {
        let request = IpcRequest::RestoreFromTrash {
            id: "0f8fad5b-d9cb-469f-a165-70867728950e".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("RestoreFromTrash"));
        assert!(json.contains("0f8fad5b"));

        let deserialized: IpcRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, request);
    }

    #[test]
    fn test_response_error_serialization() {
        let response = IpcResponse::Error(ErrorMessage::new(ErrorCode::ReadOnly, "read-only mode"));
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("read_only"));

        let deserialized: IpcResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, response);
    }

    #[test]
    fn test_blob_encoding() {
        let response = IpcResponse::blob("image/png", &[0x89, b'P', b'N', b'G']);
        match &response {
            IpcResponse::Blob { mime, data } => {
                assert_eq!(mime, "image/png");
                assert_eq!(data, "iVBORw==");
            }
            other => panic!("unexpected response: {other:?}"),
        }

        assert_eq!(
            response.blob_bytes().unwrap().unwrap(),
            vec![0x89, b'P', b'N', b'G']
        );
        assert!(IpcResponse::Pong.blob_bytes().is_none());
    }
}
