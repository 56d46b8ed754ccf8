//! End-to-end tests over the Unix socket.
//!
//! A real [`FileServer`] is bound to a temporary socket and driven with
//! [`IpcClient`], covering listing, trash, file, archive and thumbnail requests.

#![cfg(unix)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use fileex::config::Config;
use fileex::ipc::{IpcClient, IpcResponse};
use fileex::protocol::ErrorCode;
use fileex::FileServer;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Running {
    _temp: TempDir,
    root: PathBuf,
    socket: PathBuf,
    token: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl Running {
    async fn start(read_only: bool) -> Self {
        let temp = TempDir::new().unwrap();
        let root = dunce::canonicalize(temp.path()).unwrap();

        let mut config = Config::default();
        config.daemon.data_dir = root.join(".fileex");
        config.files.restricted_paths = Vec::new();
        config.files.read_only = read_only;

        let socket = root.join("run").join("fileex.sock");
        let server = FileServer::bind(&config, &socket).await.unwrap();
        let token = server.shutdown_token();
        let handle = tokio::spawn(server.run());

        Self {
            _temp: temp,
            root,
            socket,
            token,
            handle,
        }
    }

    async fn client(&self) -> IpcClient {
        IpcClient::connect(&self.socket).await.unwrap()
    }

    fn path(&self, relative: &str) -> String {
        self.root.join(relative).to_string_lossy().into_owned()
    }

    async fn stop(self) {
        self.token.cancel();
        self.handle.await.unwrap().unwrap();
        assert!(!self.socket.exists());
    }
}

#[tokio::test]
async fn test_list_directory_over_socket() {
    let server = Running::start(true).await;
    fs::create_dir(server.root.join("docs")).unwrap();
    fs::write(server.root.join("a.txt"), "hello").unwrap();

    let mut client = server.client().await;
    let root = server.root.to_string_lossy().into_owned();
    let response = client.list_directory(Some(root), 0, Some(1)).await.unwrap();

    match response {
        IpcResponse::Directory(page) => {
            // docs, run (socket directory) and a.txt
            assert_eq!(page.total, 3);
            assert_eq!(page.entries.len(), 1);
            assert_eq!(page.limit, 1);
            assert_eq!(page.skip, 0);
            assert_eq!(page.entries[0].name, "docs");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_trash_lifecycle_over_socket() {
    let server = Running::start(false).await;
    let file = server.path("draft.md");
    fs::write(&file, "# draft").unwrap();

    let mut client = server.client().await;

    let id = match client.move_to_trash(file.clone()).await.unwrap() {
        IpcResponse::Trashed { id } => id,
        other => panic!("unexpected response: {other:?}"),
    };
    assert!(!PathBuf::from(&file).exists());

    match client.list_trash().await.unwrap() {
        IpcResponse::Trash { items } => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].id, id);
            assert_eq!(items[0].original_path, file);
            assert_eq!(items[0].size_fmt, "7.00 B");
        }
        other => panic!("unexpected response: {other:?}"),
    }

    assert_eq!(
        client.restore_from_trash(id.clone()).await.unwrap(),
        IpcResponse::Restored { path: file.clone() }
    );
    assert_eq!(fs::read_to_string(&file).unwrap(), "# draft");

    match client.purge_from_trash(id).await.unwrap() {
        IpcResponse::Error(err) => assert_eq!(err.code, ErrorCode::NotFound),
        other => panic!("unexpected response: {other:?}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_read_only_server_rejects_delete() {
    let server = Running::start(true).await;
    let file = server.path("keep.txt");
    fs::write(&file, "x").unwrap();

    let mut client = server.client().await;
    match client.move_to_trash(file.clone()).await.unwrap() {
        IpcResponse::Error(err) => assert_eq!(err.code, ErrorCode::ReadOnly),
        other => panic!("unexpected response: {other:?}"),
    }
    assert!(PathBuf::from(&file).exists());

    server.stop().await;
}

#[tokio::test]
async fn test_archive_listing_and_extraction_over_socket() {
    let server = Running::start(true).await;
    let archive = server.path("bundle.zip");

    {
        let mut writer = zip::ZipWriter::new(fs::File::create(&archive).unwrap());
        let options = zip::write::SimpleFileOptions::default();
        writer.add_directory("docs/", options).unwrap();
        writer.start_file("docs/readme.txt", options).unwrap();
        writer.write_all(b"read me first").unwrap();
        writer.finish().unwrap();
    }

    let mut client = server.client().await;

    match client.list_archive(archive.clone()).await.unwrap() {
        IpcResponse::Archive(listing) => {
            assert_eq!(listing.filename, "bundle.zip");
            assert_eq!(listing.total_files, 1);
            assert_eq!(listing.total_dirs, 1);
            assert!(listing.entries[0].is_dir);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    let response = client
        .read_archive_entry(archive.clone(), "docs/readme.txt".to_string())
        .await
        .unwrap();
    assert_eq!(
        response.blob_bytes().unwrap().unwrap(),
        b"read me first".to_vec()
    );

    match client
        .read_archive_entry(archive, "missing.txt".to_string())
        .await
        .unwrap()
    {
        IpcResponse::Error(err) => assert_eq!(err.code, ErrorCode::NotFound),
        other => panic!("unexpected response: {other:?}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_thumbnail_over_socket() {
    let server = Running::start(true).await;
    let image_path = server.path("photo.png");
    image::RgbImage::from_pixel(400, 200, image::Rgb([10, 120, 200]))
        .save(&image_path)
        .unwrap();

    let mut client = server.client().await;
    let response = client.thumbnail(image_path).await.unwrap();

    match &response {
        IpcResponse::Blob { mime, .. } => assert_eq!(mime, "image/png"),
        other => panic!("unexpected response: {other:?}"),
    }

    let bytes = response.blob_bytes().unwrap().unwrap();
    let thumb = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!((thumb.width(), thumb.height()), (100, 50));

    match client.thumbnail(server.path("notes.txt")).await.unwrap() {
        IpcResponse::Error(err) => assert!(matches!(
            err.code,
            ErrorCode::NotFound | ErrorCode::InvalidRequest
        )),
        other => panic!("unexpected response: {other:?}"),
    }

    server.stop().await;
}

#[tokio::test]
async fn test_view_file_over_socket() {
    let server = Running::start(true).await;
    let file = server.path("readme.md");
    fs::write(&file, "# FileEX").unwrap();

    let mut client = server.client().await;
    let response = client.view_file(file).await.unwrap();
    match &response {
        IpcResponse::Blob { mime, .. } => assert_eq!(mime, "text/plain"),
        other => panic!("unexpected response: {other:?}"),
    }
    assert_eq!(response.blob_bytes().unwrap().unwrap(), b"# FileEX".to_vec());

    match client.view_file(server.path("missing.md")).await.unwrap() {
        IpcResponse::Error(err) => assert_eq!(err.code, ErrorCode::NotFound),
        other => panic!("unexpected response: {other:?}"),
    }

    server.stop().await;
}
