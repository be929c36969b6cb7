//! TCP file client.
//!
//! Opens one connection per operation, sends the handshake, and runs the
//! transfer loops over the framed stream.

use std::path::Path;
use std::sync::Arc;

use ferry_protocol::wire::{write_file_request, write_handshake};
use ferry_protocol::{FileRequest, Handshake, Method};
use ferry_transfer::{
    ConfigError, DownloadTarget, NoProgress, ProgressFactory, Stats, TransferConfig,
    receive_download, upload_file,
};
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::info;

use crate::error::ChannelError;
use crate::stream::{ClientDownload, ClientUpload, FrameReader, FrameWriter};
use crate::{TCP_BUFFER_SIZE, TCP_CONNECT_TIMEOUT};

type Halves = (BufReader<OwnedReadHalf>, BufWriter<OwnedWriteHalf>);

/// Client for a remote [`FileServer`](crate::server::FileServer).
pub struct FileClient {
    config: TransferConfig,
    progress: Arc<dyn ProgressFactory>,
}

impl FileClient {
    /// Validates `config`; no connection is made until an operation runs.
    pub fn new(config: TransferConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            progress: Arc::new(NoProgress),
        })
    }

    pub fn with_progress(mut self, factory: Arc<dyn ProgressFactory>) -> Self {
        self.progress = factory;
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Uploads the local file at `path` into the server's root.
    pub async fn upload_file(&self, path: &Path) -> Result<Stats, ChannelError> {
        let (reader, writer) = self.connect(Method::Upload).await?;
        let compress = self.config.compress;
        let mut transport = ClientUpload::new(
            FrameReader::new(reader, compress),
            FrameWriter::new(writer, compress),
        );

        let progress = self.progress.create();
        let stats = upload_file(
            path,
            self.config.chunk_size,
            &mut transport,
            progress.as_ref(),
        )
        .await?;
        Ok(stats)
    }

    /// Downloads `remote` from the server into `local`.
    ///
    /// A missing remote file fails with an error for which
    /// [`ChannelError::is_not_found`] holds, and `local` is left untouched.
    pub async fn download_file(&self, remote: &str, local: &Path) -> Result<Stats, ChannelError> {
        let (reader, mut writer) = self.connect(Method::Download).await?;
        write_file_request(&mut writer, &FileRequest::new(remote)).await?;
        writer.flush().await?;

        let outcome = ClientDownload::open(FrameReader::new(reader, self.config.compress)).await?;
        let progress = self.progress.create();
        let received =
            receive_download(outcome, DownloadTarget::new(local), progress.as_ref()).await?;
        Ok(received.stats)
    }

    async fn connect(&self, method: Method) -> Result<Halves, ChannelError> {
        let address = self.config.address.as_str();
        let stream =
            match tokio::time::timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect(address)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(ChannelError::Timeout),
            };
        stream.set_nodelay(true)?;
        info!(%address, %method, "connected");

        let (reader, writer) = stream.into_split();
        let reader = BufReader::with_capacity(TCP_BUFFER_SIZE, reader);
        let mut writer = BufWriter::with_capacity(TCP_BUFFER_SIZE, writer);

        let handshake = Handshake {
            method,
            compress: self.config.compress,
        };
        write_handshake(&mut writer, &handshake).await?;
        Ok((reader, writer))
    }
}
