//! Wire records and binary framing shared by ferry clients and servers.
//!
//! The [`messages`] module holds the three records exchanged by the two RPC
//! operations (`Download` and `Upload`); [`wire`] encodes them as tagged
//! frames on any `AsyncRead`/`AsyncWrite` pair.

pub mod compression;
pub mod constants;
pub mod error;
pub mod messages;
pub mod wire;

// Re-export primary types for convenience.
pub use constants::{DEFAULT_CHUNK_SIZE, DEFAULT_PORT, MAX_CHUNK_SIZE, Method};
pub use error::ProtocolError;
pub use messages::{Chunk, FileRequest, SizeMismatch, StatusCode, UploadStatus};
pub use wire::{Frame, Handshake};
