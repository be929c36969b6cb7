//! TCP file server.
//!
//! Binds a port under a root directory and serves uploads and downloads,
//! one task per connection, until shut down.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use ferry_protocol::wire::{read_file_request, read_handshake};
use ferry_protocol::{DEFAULT_CHUNK_SIZE, DEFAULT_PORT, Handshake, Method};
use ferry_transfer::{
    ConfigError, DownloadServed, NoProgress, ProgressFactory, receive_upload,
    resolve_download_path, serve_download, validate_chunk_size,
};
use tokio::io::{BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ChannelError;
use crate::stream::{FrameReader, FrameWriter, ServerDownload, ServerUpload};
use crate::{HANDSHAKE_TIMEOUT, TCP_BUFFER_SIZE};

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Directory uploads are written to and downloads are served from.
    pub root_path: PathBuf,
    /// TCP port; 0 picks an ephemeral one.
    pub port: u16,
    /// Bytes per chunk for downloads.
    pub chunk_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("./"),
            port: DEFAULT_PORT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// TCP server exposing the download and upload operations.
#[derive(Clone)]
pub struct FileServer {
    config: ServerConfig,
    cancel: CancellationToken,
    progress: Arc<dyn ProgressFactory>,
}

impl FileServer {
    /// Validates the chunk size; nothing is bound until [`listen`](Self::listen).
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        validate_chunk_size(config.chunk_size)?;
        Ok(Self {
            config,
            cancel: CancellationToken::new(),
            progress: Arc::new(NoProgress),
        })
    }

    /// Creates one progress sink per served transfer from `factory`.
    pub fn with_progress(mut self, factory: Arc<dyn ProgressFactory>) -> Self {
        self.progress = factory;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Token cancelled by [`shutdown`](Self::shutdown).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops the accept loop. Transfers already running finish on their own.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Binds the configured port on all interfaces.
    pub async fn listen(&self) -> Result<TcpListener, ChannelError> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port)).await?;
        let port = listener.local_addr()?.port();
        info!(port, root = %self.config.root_path.display(), "file server listening");
        Ok(listener)
    }

    /// Binds and serves until shut down.
    pub async fn run(&self) -> Result<(), ChannelError> {
        let listener = self.listen().await?;
        self.serve(listener).await
    }

    /// Accepts connections on `listener` until shut down.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ChannelError> {
        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("file server shutting down");
                    return Ok(());
                }
                result = listener.accept() => match result {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            debug!(%peer, "connection accepted");
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer).await {
                    error!(%peer, error = %e, "transfer failed");
                }
            });
        }
    }

    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> Result<(), ChannelError> {
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::with_capacity(TCP_BUFFER_SIZE, reader);
        let writer = BufWriter::with_capacity(TCP_BUFFER_SIZE, writer);

        let handshake =
            match tokio::time::timeout(HANDSHAKE_TIMEOUT, read_handshake(&mut reader)).await {
                Ok(result) => result?,
                Err(_) => return Err(ChannelError::Timeout),
            };
        let Handshake { method, compress } = handshake;
        info!(%peer, %method, compress, "transfer started");

        match method {
            Method::Download => {
                let request = read_file_request(&mut reader).await?;
                let mut transport = ServerDownload::new(FrameWriter::new(writer, compress));
                self.download(&request.filepath, &mut transport).await
            }
            Method::Upload => {
                let mut transport = ServerUpload::new(
                    FrameReader::new(reader, compress),
                    FrameWriter::new(writer, compress),
                );
                let progress = self.progress.create();
                let received =
                    receive_upload(&mut transport, &self.config.root_path, progress.as_ref()).await?;
                info!(%peer, file = %received.filepath, bytes = received.bytes, "upload stored");
                Ok(())
            }
        }
    }

    async fn download<W>(
        &self,
        requested: &str,
        transport: &mut ServerDownload<W>,
    ) -> Result<(), ChannelError>
    where
        W: tokio::io::AsyncWrite + Unpin + Send,
    {
        let progress = self.progress.create();
        let served = match resolve_download_path(&self.config.root_path, requested) {
            Ok(path) => {
                serve_download(
                    &path,
                    requested,
                    self.config.chunk_size,
                    transport,
                    progress.as_ref(),
                )
                .await
            }
            Err(e) => Err(e),
        };

        match served {
            Ok(DownloadServed::Sent(_)) => transport.end().await,
            Ok(DownloadServed::NotFound) => Ok(()),
            Err(e) => {
                // Best effort: the connection may already be gone.
                if let Err(send_err) = transport.fail(&e.to_string()).await {
                    debug!(error = %send_err, "could not report download failure");
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(root: &std::path::Path) -> ServerConfig {
        ServerConfig {
            root_path: root.to_path_buf(),
            port: 0,
            chunk_size: 16,
        }
    }

    #[test]
    fn default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 1213);
        assert_eq!(cfg.chunk_size, 4096);
        assert_eq!(cfg.root_path, PathBuf::from("./"));
    }

    #[test]
    fn chunk_size_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = test_config(dir.path());

        cfg.chunk_size = 0;
        assert_eq!(FileServer::new(cfg.clone()).err(), Some(ConfigError::ChunkSizeZero));

        cfg.chunk_size = ferry_protocol::MAX_CHUNK_SIZE + 1;
        assert_eq!(
            FileServer::new(cfg.clone()).err(),
            Some(ConfigError::ChunkSizeTooLarge(ferry_protocol::MAX_CHUNK_SIZE + 1))
        );

        cfg.chunk_size = ferry_protocol::MAX_CHUNK_SIZE;
        assert!(FileServer::new(cfg).is_ok());
    }

    #[tokio::test]
    async fn listen_on_ephemeral_port() {
        let dir = tempfile::tempdir().unwrap();
        let server = FileServer::new(test_config(dir.path())).unwrap();
        let listener = server.listen().await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn shutdown_stops_accept_loop() {
        let dir = tempfile::tempdir().unwrap();
        let server = FileServer::new(test_config(dir.path())).unwrap();
        let listener = server.listen().await.unwrap();

        server.shutdown();
        let result = server.serve(listener).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn bad_handshake_is_rejected() {
        use tokio::io::AsyncWriteExt;

        let dir = tempfile::tempdir().unwrap();
        let server = FileServer::new(test_config(dir.path())).unwrap();
        let listener = server.listen().await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (accepted, client) = tokio::join!(
            listener.accept(),
            TcpStream::connect(("127.0.0.1", port))
        );
        let (stream, peer) = accepted.unwrap();
        let mut client = client.unwrap();

        client.write_all(b"NOPE\x01\x01\x00").await.unwrap();
        let err = server.handle_connection(stream, peer).await.unwrap_err();
        assert!(matches!(
            err,
            ChannelError::Protocol(ferry_protocol::ProtocolError::BadMagic)
        ));
    }
}
