//! Error types for the data channel.

use ferry_protocol::ProtocolError;
use ferry_transfer::TransferError;

/// Errors produced by the TCP data channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("unexpected {0} frame")]
    UnexpectedFrame(&'static str),

    #[error("status already sent")]
    StatusAlreadySent,

    #[error("connection timed out")]
    Timeout,
}

impl ChannelError {
    /// Returns `true` when the remote file of a download does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChannelError::Transfer(TransferError::NotFound(_)))
    }
}
