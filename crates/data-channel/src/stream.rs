//! Framed TCP halves implementing the transfer transport traits.

use std::time::Duration;

use ferry_protocol::wire::{read_frame, write_frame};
use ferry_protocol::{Chunk, Frame, UploadStatus};
use ferry_transfer::DownloadOutcome;
use ferry_transfer::transport::{ChunkSink, ChunkSource, DownloadSink, UploadSink, UploadSource};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::DRAIN_IDLE_TIMEOUT;
use crate::error::ChannelError;

fn frame_name(frame: &Frame) -> &'static str {
    match frame {
        Frame::Chunk(_) => "CHUNK",
        Frame::End => "END",
        Frame::Status(_) => "STATUS",
        Frame::Error(_) => "ERROR",
        Frame::NotFound(_) => "NOT_FOUND",
    }
}

/// Inbound frame stream.
pub struct FrameReader<R> {
    reader: R,
    compress: bool,
    ended: bool,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    pub fn new(reader: R, compress: bool) -> Self {
        Self {
            reader,
            compress,
            ended: false,
        }
    }

    /// Reads the next frame.
    pub async fn read(&mut self) -> Result<Frame, ChannelError> {
        Ok(read_frame(&mut self.reader, self.compress).await?)
    }

    /// Reads the next chunk, `None` once END has been seen.
    ///
    /// An ERROR frame becomes [`ChannelError::Remote`]; a connection that
    /// closes before END is an error, not a clean end.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, ChannelError> {
        if self.ended {
            return Ok(None);
        }
        match self.read().await? {
            Frame::Chunk(chunk) => Ok(Some(chunk)),
            Frame::End => {
                self.ended = true;
                Ok(None)
            }
            Frame::Error(message) => Err(ChannelError::Remote(message)),
            other => Err(ChannelError::UnexpectedFrame(frame_name(&other))),
        }
    }

    /// Discards frames until END, returning how many were dropped.
    ///
    /// Stops early on a read error or when no frame arrives within `idle`.
    pub async fn drain(&mut self, idle: Duration) -> usize {
        let mut dropped = 0;
        while !self.ended {
            match tokio::time::timeout(idle, self.read()).await {
                Ok(Ok(Frame::End)) => self.ended = true,
                Ok(Ok(_)) => dropped += 1,
                Ok(Err(e)) => {
                    debug!(error = %e, dropped, "drain stopped");
                    break;
                }
                Err(_) => {
                    debug!(dropped, "drain timed out");
                    break;
                }
            }
        }
        dropped
    }
}

/// Outbound frame stream. Frames are buffered until [`flush`](Self::flush).
pub struct FrameWriter<W> {
    writer: W,
    compress: bool,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(writer: W, compress: bool) -> Self {
        Self { writer, compress }
    }

    pub async fn write(&mut self, frame: &Frame) -> Result<(), ChannelError> {
        Ok(write_frame(&mut self.writer, frame, self.compress).await?)
    }

    pub async fn flush(&mut self) -> Result<(), ChannelError> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Writes `frame`, flushes, and half-closes the connection.
    pub async fn finish_with(&mut self, frame: &Frame) -> Result<(), ChannelError> {
        self.write(frame).await?;
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Client end of an upload connection.
pub struct ClientUpload<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl<R, W> ClientUpload<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: FrameReader<R>, writer: FrameWriter<W>) -> Self {
        Self { reader, writer }
    }
}

impl<R, W> ChunkSink for ClientUpload<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    type Error = ChannelError;

    async fn send(&mut self, chunk: Chunk) -> Result<(), ChannelError> {
        self.writer.write(&Frame::Chunk(chunk)).await
    }
}

impl<R, W> UploadSink for ClientUpload<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn close_and_recv(&mut self) -> Result<UploadStatus, ChannelError> {
        self.writer.write(&Frame::End).await?;
        self.writer.flush().await?;

        match self.reader.read().await? {
            Frame::Status(status) => Ok(status),
            Frame::Error(message) => Err(ChannelError::Remote(message)),
            other => Err(ChannelError::UnexpectedFrame(frame_name(&other))),
        }
    }
}

/// Server end of an upload connection.
pub struct ServerUpload<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    status_sent: bool,
}

impl<R, W> ServerUpload<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: FrameReader<R>, writer: FrameWriter<W>) -> Self {
        Self {
            reader,
            writer,
            status_sent: false,
        }
    }
}

impl<R, W> ChunkSource for ServerUpload<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    type Error = ChannelError;

    async fn recv(&mut self) -> Result<Option<Chunk>, ChannelError> {
        self.reader.next_chunk().await
    }
}

impl<R, W> UploadSource for ServerUpload<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send_and_close(&mut self, status: UploadStatus) -> Result<(), ChannelError> {
        if self.status_sent {
            return Err(ChannelError::StatusAlreadySent);
        }
        self.status_sent = true;
        debug!(code = ?status.code, "sending upload status");
        self.writer.finish_with(&Frame::Status(status)).await?;

        // The uploader reads the status only after END, so a rejected
        // stream is consumed to keep its writes from failing first.
        let dropped = self.reader.drain(DRAIN_IDLE_TIMEOUT).await;
        if dropped > 0 {
            debug!(dropped, "discarded rest of rejected upload");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Server end of a download connection.
pub struct ServerDownload<W> {
    writer: FrameWriter<W>,
}

impl<W: AsyncWrite + Unpin + Send> ServerDownload<W> {
    pub fn new(writer: FrameWriter<W>) -> Self {
        Self { writer }
    }

    /// Ends a successful download.
    pub async fn end(&mut self) -> Result<(), ChannelError> {
        self.writer.finish_with(&Frame::End).await
    }

    /// Reports a server-side failure to the client.
    pub async fn fail(&mut self, message: &str) -> Result<(), ChannelError> {
        self.writer.finish_with(&Frame::Error(message.to_string())).await
    }
}

impl<W: AsyncWrite + Unpin + Send> ChunkSink for ServerDownload<W> {
    type Error = ChannelError;

    async fn send(&mut self, chunk: Chunk) -> Result<(), ChannelError> {
        self.writer.write(&Frame::Chunk(chunk)).await
    }
}

impl<W: AsyncWrite + Unpin + Send> DownloadSink for ServerDownload<W> {
    async fn send_not_found(&mut self, sentinel: Chunk) -> Result<(), ChannelError> {
        self.writer.finish_with(&Frame::NotFound(sentinel)).await
    }
}

/// Client end of a download connection.
pub struct ClientDownload<R> {
    reader: FrameReader<R>,
    first: Option<Chunk>,
}

impl<R: AsyncRead + Unpin + Send> ClientDownload<R> {
    /// Reads the server's first answer and classifies it.
    pub async fn open(
        mut reader: FrameReader<R>,
    ) -> Result<DownloadOutcome<Self>, ChannelError> {
        let first = match reader.read().await? {
            Frame::NotFound(sentinel) => return Ok(DownloadOutcome::NotFound(sentinel)),
            Frame::Chunk(chunk) => Some(chunk),
            Frame::End => {
                reader.ended = true;
                None
            }
            Frame::Error(message) => return Err(ChannelError::Remote(message)),
            other => return Err(ChannelError::UnexpectedFrame(frame_name(&other))),
        };
        Ok(DownloadOutcome::Found(Self { reader, first }))
    }
}

impl<R: AsyncRead + Unpin + Send> ChunkSource for ClientDownload<R> {
    type Error = ChannelError;

    async fn recv(&mut self) -> Result<Option<Chunk>, ChannelError> {
        if let Some(chunk) = self.first.take() {
            return Ok(Some(chunk));
        }
        self.reader.next_chunk().await
    }
}
