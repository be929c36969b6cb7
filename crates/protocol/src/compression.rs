//! gzip helpers for chunk content.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::ProtocolError;

/// Compresses `data` with gzip at the default level.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data).map_err(ProtocolError::Compression)?;
    encoder.finish().map_err(ProtocolError::Compression)
}

/// Decompresses gzip `data`, refusing output larger than `limit` bytes.
pub fn gunzip(data: &[u8], limit: usize) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(ProtocolError::Compression)?;
    if out.len() > limit {
        return Err(ProtocolError::Malformed(format!(
            "decompressed content exceeds {limit} bytes"
        )));
    }
    Ok(out)
}
