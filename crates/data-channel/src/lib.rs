//! TCP transport for ferry transfers.
//!
//! Each connection carries one operation: the client sends a handshake naming
//! the method, then chunk frames flow in the direction of the transfer. An
//! upload ends with a single STATUS frame from the server; a download ends
//! with END, or with NOT_FOUND when the file is missing.
//!
//! # Wire format
//!
//! See [`ferry_protocol::wire`] for the byte layout.

pub mod client;
pub mod error;
pub mod server;
pub mod stream;

pub use client::FileClient;
pub use error::ChannelError;
pub use server::{FileServer, ServerConfig};

use std::time::Duration;

/// TCP read/write buffer size (256 KB).
pub const TCP_BUFFER_SIZE: usize = 256 * 1024;

/// Timeout for the TCP connection attempt.
pub const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Time a new connection has to send its handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest pause tolerated while discarding the rest of a rejected upload.
pub const DRAIN_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
