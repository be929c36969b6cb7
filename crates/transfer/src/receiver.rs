//! Receiving side: rebuilds a file from an ordered chunk stream.

use std::future::Future;
use std::path::{Path, PathBuf};

use ferry_protocol::{Chunk, StatusCode, UploadStatus};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::chunked::write_chunk_content;
use crate::progress::ProgressSink;
use crate::session::{Stats, TransferSession};
use crate::transport::{ChunkSource, DownloadOutcome, UploadSource};
use crate::validation::resolve_upload_path;
use crate::{Phase, ProtocolViolation, TransferError};

/// Where a received file is written.
pub trait Destination: Send {
    type Writer: AsyncWrite + Unpin + Send;

    /// Opens the destination for the file named by the first chunk.
    fn create(
        &mut self,
        filepath: &str,
    ) -> impl Future<Output = Result<Self::Writer, TransferError>> + Send;

    /// Whether a stream that ends without any chunk still yields an empty file.
    fn allows_empty_stream(&self) -> bool {
        false
    }
}

/// Writes uploads under a root directory, named by the first chunk.
#[derive(Debug, Clone)]
pub struct UploadRoot {
    root: PathBuf,
}

impl UploadRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Destination for UploadRoot {
    type Writer = File;

    async fn create(&mut self, filepath: &str) -> Result<File, TransferError> {
        if filepath.is_empty() {
            return Err(ProtocolViolation::MissingFileName.into());
        }
        let path = resolve_upload_path(&self.root, filepath)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!(path = %path.display(), "creating upload destination");
        Ok(File::create(&path).await?)
    }
}

/// Writes a download to a fixed local path, whatever name the chunks carry.
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    path: PathBuf,
}

impl DownloadTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Destination for DownloadTarget {
    type Writer = File;

    async fn create(&mut self, _filepath: &str) -> Result<File, TransferError> {
        Ok(File::create(&self.path).await?)
    }

    fn allows_empty_stream(&self) -> bool {
        true
    }
}

/// Position of a [`Receiver`] in its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing received; no file exists yet.
    AwaitingFirstChunk,
    /// Destination open, appending chunks.
    Streaming,
    /// Final chunk written; any further chunk is a violation.
    Done,
}

/// Result of feeding one chunk to a [`Receiver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Final,
}

/// A fully received file.
#[derive(Debug, Clone)]
pub struct Received {
    /// Name carried by the first chunk.
    pub filepath: String,
    pub bytes: i64,
    pub stats: Stats,
}

/// Per-transfer receiving state machine.
///
/// The destination is created exactly once, on the first chunk, and every
/// chunk is size-checked before any of its bytes are written.
pub struct Receiver<'p, D: Destination> {
    destination: D,
    state: State,
    writer: Option<D::Writer>,
    filepath: String,
    session: TransferSession,
    progress: &'p dyn ProgressSink,
}

impl<'p, D: Destination> Receiver<'p, D> {
    pub fn new(destination: D, progress: &'p dyn ProgressSink) -> Self {
        Self {
            destination,
            state: State::AwaitingFirstChunk,
            writer: None,
            filepath: String::new(),
            session: TransferSession::new(""),
            progress,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Name carried by the first chunk, empty before it arrives.
    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    /// Handles one chunk.
    pub async fn accept(&mut self, chunk: Chunk) -> Result<Step, TransferError> {
        if self.state == State::Done {
            return Err(ProtocolViolation::DataAfterFinalChunk.into());
        }
        chunk.check_size().map_err(ProtocolViolation::from)?;

        if self.state == State::AwaitingFirstChunk {
            let writer = self.destination.create(&chunk.filepath).await?;
            self.writer = Some(writer);
            self.filepath = chunk.filepath.clone();
            self.session.set_label(chunk.filepath.as_str());
            let total = self.session.set_total_once(chunk.size_total_bytes);
            self.progress.begin(&self.filepath, total.max(0) as u64);
            self.state = State::Streaming;
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err(ProtocolViolation::DataAfterFinalChunk.into());
        };
        write_chunk_content(writer, &chunk.content).await?;

        self.session.record(chunk.size_in_bytes);
        self.progress.advance(
            chunk.size_in_bytes as u64,
            self.session.total_bytes().max(0) as u64,
        );

        if chunk.is_last_chunk {
            self.state = State::Done;
            self.progress.finish();
            return Ok(Step::Final);
        }
        Ok(Step::Continue)
    }

    /// Flushes and closes the destination.
    ///
    /// A stream that delivered no chunk is an error unless the destination
    /// allows empty streams, in which case an empty file is created.
    pub async fn finish(mut self) -> Result<Received, TransferError> {
        if self.state == State::AwaitingFirstChunk {
            if !self.destination.allows_empty_stream() {
                return Err(ProtocolViolation::EmptyStream.into());
            }
            self.writer = Some(self.destination.create("").await?);
        }

        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.shutdown().await?;
        }

        let stats = self.session.finish();
        Ok(Received {
            filepath: self.filepath,
            bytes: stats.bytes,
            stats,
        })
    }
}

/// Server side of an upload: writes the stream under `root` and acknowledges.
///
/// Failures after the stream has started are answered with an error status
/// before being returned, unless the transport itself failed.
pub async fn receive_upload<T: UploadSource>(
    transport: &mut T,
    root: &Path,
    progress: &dyn ProgressSink,
) -> Result<Received, TransferError> {
    let mut receiver = Receiver::new(UploadRoot::new(root), progress);

    let result = read_upload(transport, &mut receiver).await;
    let filepath = receiver.filepath().to_owned();
    let received = match result {
        Ok(()) => receiver.finish().await,
        Err(e) => Err(e),
    };

    match received {
        Ok(received) => {
            transport
                .send_and_close(UploadStatus::ok(received.filepath.as_str()))
                .await
                .map_err(|e| TransferError::transport(Phase::SendStatus, e))?;
            info!(
                file = %received.filepath,
                bytes = received.bytes,
                chunks = received.stats.chunks,
                "upload received"
            );
            Ok(received)
        }
        Err(e @ TransferError::Transport { .. }) => Err(e),
        Err(e) => {
            warn!(error = %e, "upload failed");
            let status = UploadStatus {
                code: StatusCode::Error,
                filepath,
            };
            if let Err(send_err) = transport.send_and_close(status).await {
                debug!(error = %send_err, "could not report upload failure");
            }
            Err(e)
        }
    }
}

async fn read_upload<T: ChunkSource, D: Destination>(
    transport: &mut T,
    receiver: &mut Receiver<'_, D>,
) -> Result<(), TransferError> {
    while let Some(chunk) = transport
        .recv()
        .await
        .map_err(|e| TransferError::transport(Phase::ReceiveChunk, e))?
    {
        if receiver.accept(chunk).await? == Step::Final {
            // Only end-of-stream may follow the final chunk.
            let trailing = transport
                .recv()
                .await
                .map_err(|e| TransferError::transport(Phase::ReceiveChunk, e))?;
            if trailing.is_some() {
                return Err(ProtocolViolation::DataAfterFinalChunk.into());
            }
            break;
        }
    }
    Ok(())
}

/// Client side of a download: writes the stream to `destination`.
///
/// A not-found answer is returned as [`TransferError::NotFound`] without
/// creating the destination.
pub async fn receive_download<S, D>(
    outcome: DownloadOutcome<S>,
    destination: D,
    progress: &dyn ProgressSink,
) -> Result<Received, TransferError>
where
    S: ChunkSource,
    D: Destination,
{
    let mut source = match outcome {
        DownloadOutcome::Found(source) => source,
        DownloadOutcome::NotFound(sentinel) => {
            return Err(TransferError::NotFound(sentinel.filepath));
        }
    };

    let mut receiver = Receiver::new(destination, progress);
    while let Some(chunk) = source
        .recv()
        .await
        .map_err(|e| TransferError::transport(Phase::ReceiveChunk, e))?
    {
        receiver.accept(chunk).await?;
    }

    let received = receiver.finish().await?;
    info!(file = %received.filepath, bytes = received.bytes, "download complete");
    Ok(received)
}
