//! Error types for wire encoding and decoding.

/// Errors produced while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad handshake magic")]
    BadMagic,

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown method byte 0x{0:02x}")]
    UnknownMethod(u8),

    #[error("unknown frame tag 0x{0:02x}")]
    UnknownTag(u8),

    #[error("unknown status code {0}")]
    UnknownStatus(u8),

    #[error("compression error: {0}")]
    Compression(std::io::Error),

    #[error("protocol error: {0}")]
    Malformed(String),
}

impl ProtocolError {
    /// Returns `true` when the peer closed the stream before a full frame arrived.
    pub fn is_eof(&self) -> bool {
        matches!(self, ProtocolError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}
