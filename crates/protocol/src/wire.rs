//! TCP wire format for ferry transfers.
//!
//! # Wire format
//!
//! ```text
//! HANDSHAKE (client -> server):
//!   [4 bytes: magic "FRRY"][1 byte: version][1 byte: method][1 byte: flags]
//!
//! DOWNLOAD REQUEST (client -> server, after handshake):
//!   [2 bytes BE: path_len][path_len bytes: path UTF-8]
//!
//! FRAME (either direction):
//!   [1 byte: tag][body]
//!
//!   0x01 CHUNK     [2 bytes BE: path_len][path]
//!                  [4 bytes BE: content_len][content]
//!                  [8 bytes BE: size_in_bytes][8 bytes BE: size_total_bytes]
//!                  [1 byte: is_last]
//!   0x02 END       end of stream, no body
//!   0x03 STATUS    [1 byte: code][2 bytes BE: path_len][path]
//!   0x04 ERROR     [2 bytes BE: msg_len][msg UTF-8]
//!   0x05 NOT_FOUND same body as CHUNK, carrying the not-found sentinel
//! ```
//!
//! With the gzip flag, `content` is gzip data; `size_in_bytes` keeps the
//! sender's declared size of the decompressed bytes.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::compression::{gunzip, gzip};
use crate::constants::{
    FLAG_GZIP, HANDSHAKE_MAGIC, MAX_CHUNK_SIZE, MAX_WIRE_CONTENT, Method, PROTOCOL_VERSION,
};
use crate::error::ProtocolError;
use crate::messages::{Chunk, FileRequest, StatusCode, UploadStatus};

pub const TAG_CHUNK: u8 = 0x01;
pub const TAG_END: u8 = 0x02;
pub const TAG_STATUS: u8 = 0x03;
pub const TAG_ERROR: u8 = 0x04;
pub const TAG_NOT_FOUND: u8 = 0x05;

/// Connection preamble sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub method: Method,
    pub compress: bool,
}

/// A single framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Chunk(Chunk),
    End,
    Status(UploadStatus),
    Error(String),
    NotFound(Chunk),
}

/// Writes the connection handshake.
pub async fn write_handshake<W: AsyncWrite + Unpin>(
    writer: &mut W,
    handshake: &Handshake,
) -> Result<(), ProtocolError> {
    let flags = if handshake.compress { FLAG_GZIP } else { 0 };
    writer.write_all(&HANDSHAKE_MAGIC).await?;
    writer.write_u8(PROTOCOL_VERSION).await?;
    writer.write_u8(handshake.method.as_byte()).await?;
    writer.write_u8(flags).await?;
    Ok(())
}

/// Reads and validates the connection handshake.
pub async fn read_handshake<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Handshake, ProtocolError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).await?;
    if magic != HANDSHAKE_MAGIC {
        return Err(ProtocolError::BadMagic);
    }

    let version = reader.read_u8().await?;
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let method_byte = reader.read_u8().await?;
    let method = Method::from_byte(method_byte).ok_or(ProtocolError::UnknownMethod(method_byte))?;
    let flags = reader.read_u8().await?;

    Ok(Handshake {
        method,
        compress: flags & FLAG_GZIP != 0,
    })
}

/// Writes a download request.
pub async fn write_file_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    request: &FileRequest,
) -> Result<(), ProtocolError> {
    write_string(writer, &request.filepath).await
}

/// Reads a download request.
pub async fn read_file_request<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<FileRequest, ProtocolError> {
    Ok(FileRequest {
        filepath: read_string(reader).await?,
    })
}

/// Writes one frame. Chunk content is gzip-compressed when `compress` is set.
///
/// The frame is encoded in full first; a frame that fails to encode leaves
/// nothing on `writer`.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
    compress: bool,
) -> Result<(), ProtocolError> {
    let mut encoded = Vec::new();
    encode_frame(&mut encoded, frame, compress).await?;
    writer.write_all(&encoded).await?;
    Ok(())
}

async fn encode_frame(
    writer: &mut Vec<u8>,
    frame: &Frame,
    compress: bool,
) -> Result<(), ProtocolError> {
    match frame {
        Frame::Chunk(chunk) => {
            writer.write_u8(TAG_CHUNK).await?;
            write_chunk_body(writer, chunk, compress).await?;
        }
        Frame::NotFound(chunk) => {
            writer.write_u8(TAG_NOT_FOUND).await?;
            write_chunk_body(writer, chunk, compress).await?;
        }
        Frame::End => {
            writer.write_u8(TAG_END).await?;
        }
        Frame::Status(status) => {
            writer.write_u8(TAG_STATUS).await?;
            writer.write_u8(status.code.as_byte()).await?;
            write_string(writer, &status.filepath).await?;
        }
        Frame::Error(message) => {
            writer.write_u8(TAG_ERROR).await?;
            write_string(writer, truncate_utf8(message, u16::MAX as usize)).await?;
        }
    }
    Ok(())
}

/// Reads one frame. `compress` must match the handshake flag.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    compress: bool,
) -> Result<Frame, ProtocolError> {
    let tag = reader.read_u8().await?;
    match tag {
        TAG_CHUNK => Ok(Frame::Chunk(read_chunk_body(reader, compress).await?)),
        TAG_NOT_FOUND => Ok(Frame::NotFound(read_chunk_body(reader, compress).await?)),
        TAG_END => Ok(Frame::End),
        TAG_STATUS => {
            let code_byte = reader.read_u8().await?;
            let code =
                StatusCode::from_byte(code_byte).ok_or(ProtocolError::UnknownStatus(code_byte))?;
            let filepath = read_string(reader).await?;
            Ok(Frame::Status(UploadStatus { code, filepath }))
        }
        TAG_ERROR => Ok(Frame::Error(read_string(reader).await?)),
        other => Err(ProtocolError::UnknownTag(other)),
    }
}

async fn write_chunk_body(
    writer: &mut Vec<u8>,
    chunk: &Chunk,
    compress: bool,
) -> Result<(), ProtocolError> {
    write_string(writer, &chunk.filepath).await?;

    let packed;
    let content: &[u8] = if compress {
        packed = gzip(&chunk.content)?;
        &packed
    } else {
        &chunk.content
    };
    if content.len() > MAX_WIRE_CONTENT {
        return Err(ProtocolError::Malformed(format!(
            "chunk content too large: {} bytes (max {MAX_WIRE_CONTENT})",
            content.len()
        )));
    }

    writer.write_u32(content.len() as u32).await?;
    writer.write_all(content).await?;
    writer.write_i64(chunk.size_in_bytes).await?;
    writer.write_i64(chunk.size_total_bytes).await?;
    writer.write_u8(chunk.is_last_chunk as u8).await?;
    Ok(())
}

async fn read_chunk_body<R: AsyncRead + Unpin>(
    reader: &mut R,
    compress: bool,
) -> Result<Chunk, ProtocolError> {
    let filepath = read_string(reader).await?;

    let content_len = reader.read_u32().await? as usize;
    if content_len > MAX_WIRE_CONTENT {
        return Err(ProtocolError::Malformed(format!(
            "chunk content too large: {content_len} bytes (max {MAX_WIRE_CONTENT})"
        )));
    }
    let mut content = vec![0u8; content_len];
    reader.read_exact(&mut content).await?;
    if compress {
        content = gunzip(&content, MAX_CHUNK_SIZE)?;
    }

    let size_in_bytes = reader.read_i64().await?;
    let size_total_bytes = reader.read_i64().await?;
    let is_last_chunk = match reader.read_u8().await? {
        0 => false,
        1 => true,
        other => {
            return Err(ProtocolError::Malformed(format!(
                "invalid last-chunk flag {other}"
            )));
        }
    };

    Ok(Chunk {
        filepath,
        content,
        size_in_bytes,
        size_total_bytes,
        is_last_chunk,
    })
}

async fn write_string<W: AsyncWrite + Unpin>(
    writer: &mut W,
    value: &str,
) -> Result<(), ProtocolError> {
    let bytes = value.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(ProtocolError::Malformed(format!(
            "string too long: {} bytes (max {})",
            bytes.len(),
            u16::MAX
        )));
    }
    writer.write_u16(bytes.len() as u16).await?;
    writer.write_all(bytes).await?;
    Ok(())
}

async fn read_string<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String, ProtocolError> {
    let len = reader.read_u16().await? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf).map_err(|e| ProtocolError::Malformed(format!("invalid UTF-8: {e}")))
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
