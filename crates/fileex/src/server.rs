//! Socket server wiring the IPC transport to the request router.
//!
//! The `FileServer` owns the bound socket, accepts clients until its
//! cancellation token fires and serves each connection on its own task.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use protocol::{ErrorCode, ErrorMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::ipc::{IpcConnection, IpcError, IpcResponse, IpcServer};
use crate::router::RequestRouter;
use crate::service::FileService;

/// Server accepting requests on a Unix socket.
pub struct FileServer {
    /// Bound listener.
    ipc: IpcServer,
    /// Router shared by all connections.
    router: RequestRouter,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl FileServer {
    /// Bind the socket and build the service from configuration.
    pub async fn bind(config: &Config, socket_path: &Path) -> Result<Self> {
        let service = FileService::new(config);
        info!(
            trash = %service.trash_root().display(),
            read_only = service.is_read_only(),
            "File service ready"
        );

        let ipc = IpcServer::bind(socket_path)
            .await
            .with_context(|| format!("Failed to bind socket {}", socket_path.display()))?;

        Ok(Self {
            ipc,
            router: RequestRouter::new(Arc::new(service)),
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Path of the bound socket.
    pub fn socket_path(&self) -> &Path {
        self.ipc.path()
    }

    /// Token that stops the accept loop and open connections when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Accept connections until the shutdown token is cancelled.
    pub async fn run(self) -> Result<()> {
        info!(socket = %self.ipc.path().display(), "Listening for requests");

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    info!("Server received shutdown signal");
                    break;
                }
                accepted = self.ipc.accept() => {
                    match accepted {
                        Ok(conn) => {
                            let router = self.router.clone();
                            let token = self.shutdown_token.clone();
                            tokio::spawn(async move {
                                serve_connection(conn, router, token).await;
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Run until SIGINT or SIGTERM arrives.
    pub async fn run_until_signal(self) -> Result<()> {
        let token = self.shutdown_token();
        tokio::spawn(async move {
            match wait_for_shutdown_signal().await {
                Ok(()) => token.cancel(),
                Err(e) => error!(error = %e, "Failed to register signal handlers"),
            }
        });

        self.run().await
    }
}

/// Serve requests on one connection until the client disconnects.
async fn serve_connection(
    mut conn: IpcConnection,
    router: RequestRouter,
    token: CancellationToken,
) {
    debug!("Client connected");

    loop {
        let request = tokio::select! {
            _ = token.cancelled() => break,
            request = conn.read_request() => request,
        };

        let response = match request {
            Ok(Some(request)) => router.handle(request).await,
            Ok(None) => break,
            Err(IpcError::Json(e)) => {
                warn!(error = %e, "Malformed request");
                IpcResponse::Error(ErrorMessage::new(
                    ErrorCode::InvalidRequest,
                    format!("malformed request: {e}"),
                ))
            }
            Err(IpcError::Io(e)) => {
                debug!(error = %e, "Connection read failed");
                break;
            }
        };

        if let Err(e) = conn.send_response(&response).await {
            debug!(error = %e, "Failed to send response");
            break;
        }
    }

    debug!("Client disconnected");
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    Ok(())
}
