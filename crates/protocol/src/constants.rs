/// Largest accepted chunk size (4 MiB).
pub const MAX_CHUNK_SIZE: usize = 1 << 22;

/// Chunk size used when none is configured (4 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 12;

/// Default TCP port of the file server.
pub const DEFAULT_PORT: u16 = 1213;

/// Magic bytes opening every connection.
pub const HANDSHAKE_MAGIC: [u8; 4] = *b"FRRY";

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Handshake flag: chunk content is gzip-compressed on the wire.
pub const FLAG_GZIP: u8 = 0x01;

/// Upper bound for encoded chunk content.
///
/// gzip can expand incompressible input slightly, so compressed frames get
/// some headroom above [`MAX_CHUNK_SIZE`].
pub const MAX_WIRE_CONTENT: usize = MAX_CHUNK_SIZE + 64 * 1024;

/// RPC operation requested in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Download,
    Upload,
}

impl Method {
    pub fn as_byte(self) -> u8 {
        match self {
            Method::Download => 0x01,
            Method::Upload => 0x02,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Method::Download),
            0x02 => Some(Method::Upload),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Download => f.write_str("download"),
            Method::Upload => f.write_str("upload"),
        }
    }
}
