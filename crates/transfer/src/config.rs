use ferry_protocol::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};

/// Rejected transfer configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("address must be specified")]
    MissingAddress,

    #[error("chunk size must be specified")]
    ChunkSizeZero,

    #[error("chunk size must be at most {MAX_CHUNK_SIZE} bytes, got {0}")]
    ChunkSizeTooLarge(usize),
}

/// Settings for one client transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Remote peer, `host:port`.
    pub address: String,
    /// Bytes per chunk, `1..=MAX_CHUNK_SIZE`.
    pub chunk_size: usize,
    /// gzip chunk content on the wire.
    pub compress: bool,
}

impl TransferConfig {
    pub fn new(address: impl Into<String>, chunk_size: usize) -> Self {
        Self {
            address: address.into(),
            chunk_size,
            compress: false,
        }
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Checks the address and chunk size without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::MissingAddress);
        }
        validate_chunk_size(self.chunk_size)
    }
}

/// Checks that `chunk_size` lies in `1..=MAX_CHUNK_SIZE`.
pub fn validate_chunk_size(chunk_size: usize) -> Result<(), ConfigError> {
    match chunk_size {
        0 => Err(ConfigError::ChunkSizeZero),
        n if n > MAX_CHUNK_SIZE => Err(ConfigError::ChunkSizeTooLarge(n)),
        _ => Ok(()),
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self::new("127.0.0.1:1213", DEFAULT_CHUNK_SIZE)
    }
}
