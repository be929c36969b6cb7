//! Transport contract between the transfer loops and a message channel.
//!
//! A channel must deliver chunks in send order, report a clean end of stream
//! as `Ok(None)` (distinct from errors), and for uploads carry exactly one
//! [`UploadStatus`] back after the sender has declared it is done.

use std::future::Future;

use ferry_protocol::{Chunk, UploadStatus};

/// Outbound half of a chunk stream.
pub trait ChunkSink: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends one chunk.
    fn send(&mut self, chunk: Chunk) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Inbound half of a chunk stream.
pub trait ChunkSource: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Receives the next chunk, or `None` at a clean end of stream.
    fn recv(&mut self) -> impl Future<Output = Result<Option<Chunk>, Self::Error>> + Send;
}

/// Client side of an upload.
pub trait UploadSink: ChunkSink {
    /// Ends the stream and waits for the terminal acknowledgment.
    fn close_and_recv(&mut self) -> impl Future<Output = Result<UploadStatus, Self::Error>> + Send;
}

/// Server side of an upload.
pub trait UploadSource: ChunkSource {
    /// Sends the terminal acknowledgment. Called exactly once.
    fn send_and_close(
        &mut self,
        status: UploadStatus,
    ) -> impl Future<Output = Result<(), <Self as ChunkSource>::Error>> + Send;
}

/// Server side of a download.
pub trait DownloadSink: ChunkSink {
    /// Tells the client the requested file does not exist.
    ///
    /// `sentinel` is the empty final chunk standing for the missing file.
    fn send_not_found(
        &mut self,
        sentinel: Chunk,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// First answer to a download request.
#[derive(Debug)]
pub enum DownloadOutcome<S> {
    /// The file exists; its chunks follow on `S`.
    Found(S),
    /// The file does not exist. Carries the sentinel chunk.
    NotFound(Chunk),
}

impl<S> DownloadOutcome<S> {
    pub fn is_found(&self) -> bool {
        matches!(self, DownloadOutcome::Found(_))
    }
}

// ---------------------------------------------------------------------------
// Vec<Chunk> sink
// ---------------------------------------------------------------------------

impl ChunkSink for Vec<Chunk> {
    type Error = std::convert::Infallible;

    async fn send(&mut self, chunk: Chunk) -> Result<(), Self::Error> {
        self.push(chunk);
        Ok(())
    }
}

impl DownloadSink for Vec<Chunk> {
    async fn send_not_found(&mut self, sentinel: Chunk) -> Result<(), Self::Error> {
        self.push(sentinel);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory pipes
// ---------------------------------------------------------------------------

/// In-process transports built on tokio channels.
pub mod memory {
    use std::collections::VecDeque;

    use tokio::sync::{mpsc, oneshot};

    use super::*;

    /// Errors of the in-memory pipes.
    #[derive(Debug, thiserror::Error)]
    pub enum MemoryError {
        #[error("peer closed the stream")]
        Closed,

        #[error("stream already closed for sending")]
        SendAfterClose,

        #[error("no status received from peer")]
        NoStatus,

        #[error("status already sent")]
        StatusAlreadySent,
    }

    enum Item {
        Chunk(Chunk),
        NotFound(Chunk),
    }

    /// Creates a connected upload pair with room for `capacity` chunks in flight.
    pub fn upload_pipe(capacity: usize) -> (MemoryUploadSink, MemoryUploadSource) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (status_tx, status_rx) = oneshot::channel();
        (
            MemoryUploadSink {
                tx: Some(tx),
                status_rx: Some(status_rx),
            },
            MemoryUploadSource {
                rx,
                status_tx: Some(status_tx),
            },
        )
    }

    /// Creates a connected download pair with room for `capacity` chunks in flight.
    pub fn download_pipe(capacity: usize) -> (MemoryDownloadSink, MemoryDownloadRequest) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            MemoryDownloadSink { tx },
            MemoryDownloadRequest { rx },
        )
    }

    /// Client end of an upload pipe.
    pub struct MemoryUploadSink {
        tx: Option<mpsc::Sender<Chunk>>,
        status_rx: Option<oneshot::Receiver<UploadStatus>>,
    }

    impl ChunkSink for MemoryUploadSink {
        type Error = MemoryError;

        async fn send(&mut self, chunk: Chunk) -> Result<(), MemoryError> {
            let tx = self.tx.as_ref().ok_or(MemoryError::SendAfterClose)?;
            tx.send(chunk).await.map_err(|_| MemoryError::Closed)
        }
    }

    impl UploadSink for MemoryUploadSink {
        async fn close_and_recv(&mut self) -> Result<UploadStatus, MemoryError> {
            // Dropping the sender is the end-of-stream signal.
            drop(self.tx.take());
            let rx = self.status_rx.take().ok_or(MemoryError::NoStatus)?;
            rx.await.map_err(|_| MemoryError::NoStatus)
        }
    }

    /// Server end of an upload pipe.
    pub struct MemoryUploadSource {
        rx: mpsc::Receiver<Chunk>,
        status_tx: Option<oneshot::Sender<UploadStatus>>,
    }

    impl ChunkSource for MemoryUploadSource {
        type Error = MemoryError;

        async fn recv(&mut self) -> Result<Option<Chunk>, MemoryError> {
            Ok(self.rx.recv().await)
        }
    }

    impl UploadSource for MemoryUploadSource {
        async fn send_and_close(&mut self, status: UploadStatus) -> Result<(), MemoryError> {
            let tx = self.status_tx.take().ok_or(MemoryError::StatusAlreadySent)?;
            self.rx.close();
            tx.send(status).map_err(|_| MemoryError::Closed)
        }
    }

    /// Server end of a download pipe.
    pub struct MemoryDownloadSink {
        tx: mpsc::Sender<Item>,
    }

    impl ChunkSink for MemoryDownloadSink {
        type Error = MemoryError;

        async fn send(&mut self, chunk: Chunk) -> Result<(), MemoryError> {
            self.tx
                .send(Item::Chunk(chunk))
                .await
                .map_err(|_| MemoryError::Closed)
        }
    }

    impl DownloadSink for MemoryDownloadSink {
        async fn send_not_found(&mut self, sentinel: Chunk) -> Result<(), MemoryError> {
            self.tx
                .send(Item::NotFound(sentinel))
                .await
                .map_err(|_| MemoryError::Closed)
        }
    }

    /// Client end of a download pipe, before the first answer is known.
    pub struct MemoryDownloadRequest {
        rx: mpsc::Receiver<Item>,
    }

    impl MemoryDownloadRequest {
        /// Waits for the first answer and classifies it.
        pub async fn open(mut self) -> DownloadOutcome<MemoryDownloadSource> {
            let mut buffered = VecDeque::new();
            match self.rx.recv().await {
                Some(Item::NotFound(sentinel)) => return DownloadOutcome::NotFound(sentinel),
                Some(Item::Chunk(chunk)) => buffered.push_back(chunk),
                None => {}
            }
            DownloadOutcome::Found(MemoryDownloadSource {
                rx: self.rx,
                buffered,
            })
        }
    }

    /// Client end of a download pipe once the file is known to exist.
    pub struct MemoryDownloadSource {
        rx: mpsc::Receiver<Item>,
        buffered: VecDeque<Chunk>,
    }

    impl ChunkSource for MemoryDownloadSource {
        type Error = MemoryError;

        async fn recv(&mut self) -> Result<Option<Chunk>, MemoryError> {
            if let Some(chunk) = self.buffered.pop_front() {
                return Ok(Some(chunk));
            }
            match self.rx.recv().await {
                Some(Item::Chunk(chunk)) | Some(Item::NotFound(chunk)) => Ok(Some(chunk)),
                None => Ok(None),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn upload_pipe_delivers_in_order_then_ends() {
            let (mut sink, mut source) = upload_pipe(4);
            for i in 0..3u8 {
                sink.send(Chunk::new("f", vec![i], 3, i == 2)).await.unwrap();
            }
            drop(sink);

            for i in 0..3u8 {
                let c = source.recv().await.unwrap().unwrap();
                assert_eq!(c.content, vec![i]);
            }
            assert!(source.recv().await.unwrap().is_none());
        }

        #[tokio::test]
        async fn upload_status_exactly_once() {
            let (mut sink, mut source) = upload_pipe(1);
            let (status, _) = tokio::join!(sink.close_and_recv(), async {
                assert!(source.recv().await.unwrap().is_none());
                source.send_and_close(UploadStatus::ok("f")).await.unwrap();
                assert!(matches!(
                    source.send_and_close(UploadStatus::ok("f")).await,
                    Err(MemoryError::StatusAlreadySent)
                ));
            });
            assert_eq!(status.unwrap(), UploadStatus::ok("f"));
        }

        #[tokio::test]
        async fn send_after_close_fails() {
            let (mut sink, source) = upload_pipe(1);
            drop(source);
            assert!(matches!(
                sink.close_and_recv().await,
                Err(MemoryError::NoStatus)
            ));
            assert!(matches!(
                sink.send(Chunk::default()).await,
                Err(MemoryError::SendAfterClose)
            ));
        }

        #[tokio::test]
        async fn download_not_found_is_typed() {
            let (mut sink, request) = download_pipe(1);
            sink.send_not_found(Chunk::not_found("missing")).await.unwrap();
            drop(sink);
            match request.open().await {
                DownloadOutcome::NotFound(c) => assert!(c.is_not_found_sentinel()),
                DownloadOutcome::Found(_) => panic!("expected NotFound"),
            }
        }

        #[tokio::test]
        async fn download_found_replays_first_chunk() {
            let (mut sink, request) = download_pipe(4);
            sink.send(Chunk::new("f", b"ab".to_vec(), 4, false)).await.unwrap();
            sink.send(Chunk::new("f", b"cd".to_vec(), 4, true)).await.unwrap();
            drop(sink);

            let DownloadOutcome::Found(mut source) = request.open().await else {
                panic!("expected Found");
            };
            assert_eq!(source.recv().await.unwrap().unwrap().content, b"ab");
            assert_eq!(source.recv().await.unwrap().unwrap().content, b"cd");
            assert!(source.recv().await.unwrap().is_none());
        }

        #[tokio::test]
        async fn download_empty_stream_is_found() {
            let (sink, request) = download_pipe(1);
            drop(sink);
            let outcome = request.open().await;
            assert!(outcome.is_found());
        }
    }
}
