//! Chunked streaming file transfer.
//!
//! A [`sender`] splits a local file into ordered [`Chunk`]s and pushes them
//! through a transport; a [`receiver`] consumes them and rebuilds the file.
//! The transport itself is abstracted by the traits in [`transport`], so the
//! same code runs over TCP frames or the in-memory pipe used by tests.

mod chunked;
mod config;
mod progress;
pub mod receiver;
pub mod sender;
mod session;
pub mod transport;
mod validation;

pub use chunked::{ChunkReader, write_chunk_content};
pub use config::{ConfigError, TransferConfig, validate_chunk_size};
pub use ferry_protocol::{Chunk, FileRequest, StatusCode, UploadStatus};
pub use progress::{CountingProgress, NoProgress, ProgressFactory, ProgressSink};
pub use receiver::{DownloadTarget, Received, Receiver, Step, UploadRoot, receive_download, receive_upload};
pub use sender::{DownloadServed, serve_download, stream_file, upload_file};
pub use session::{Stats, TransferSession};
pub use transport::DownloadOutcome;
pub use validation::{resolve_download_path, resolve_upload_path};

/// Boxed error carried by [`TransferError::Transport`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("transport error {phase}: {source}")]
    Transport {
        phase: Phase,
        #[source]
        source: BoxError,
    },

    #[error("file does not exist: {0}")]
    NotFound(String),

    #[error("upload failed: {0}")]
    UploadRejected(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TransferError {
    /// Wraps a transport error with the phase it happened in.
    pub fn transport<E>(phase: Phase, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TransferError::Transport {
            phase,
            source: Box::new(err),
        }
    }
}

/// Stream contents that break the chunk invariants.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolViolation {
    #[error(transparent)]
    SizeMismatch(#[from] ferry_protocol::SizeMismatch),

    #[error("first chunk carries no file name")]
    MissingFileName,

    #[error("chunk received after the final chunk")]
    DataAfterFinalChunk,

    #[error("stream ended before any chunk arrived")]
    EmptyStream,
}

/// Transfer step during which a transport error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SendChunk,
    ReceiveChunk,
    SendStatus,
    ReceiveStatus,
    SendNotFound,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::SendChunk => "while sending chunk",
            Phase::ReceiveChunk => "while receiving chunk",
            Phase::SendStatus => "while sending status",
            Phase::ReceiveStatus => "while receiving status",
            Phase::SendNotFound => "while sending not-found signal",
        })
    }
}
