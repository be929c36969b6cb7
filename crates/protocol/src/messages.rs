/// A chunk of file data, the unit of every transfer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chunk {
    /// Logical file name. Set on the first chunk of an upload and on every
    /// chunk of a download.
    pub filepath: String,
    /// Raw bytes of this chunk.
    pub content: Vec<u8>,
    /// Declared length of `content`.
    pub size_in_bytes: i64,
    /// Size of the whole file, identical on every chunk of a transfer.
    pub size_total_bytes: i64,
    /// Set on the final chunk only.
    pub is_last_chunk: bool,
}

/// Declared chunk size disagrees with the carried content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("chunk declares {declared} bytes but carries {actual}")]
pub struct SizeMismatch {
    pub declared: i64,
    pub actual: i64,
}

impl Chunk {
    /// Builds a chunk whose `size_in_bytes` matches `content`.
    pub fn new(
        filepath: impl Into<String>,
        content: Vec<u8>,
        size_total_bytes: i64,
        is_last_chunk: bool,
    ) -> Self {
        let size_in_bytes = content.len() as i64;
        Self {
            filepath: filepath.into(),
            content,
            size_in_bytes,
            size_total_bytes,
            is_last_chunk,
        }
    }

    /// The sentinel sent in place of a file that does not exist.
    pub fn not_found(filepath: impl Into<String>) -> Self {
        Self::new(filepath, Vec::new(), 0, true)
    }

    /// Returns `true` if this chunk has the shape of the not-found sentinel.
    pub fn is_not_found_sentinel(&self) -> bool {
        self.is_last_chunk
            && self.size_total_bytes == 0
            && self.size_in_bytes == 0
            && self.content.is_empty()
    }

    /// Checks that `size_in_bytes` equals the content length.
    pub fn check_size(&self) -> Result<(), SizeMismatch> {
        let actual = self.content.len() as i64;
        if self.size_in_bytes != actual {
            return Err(SizeMismatch {
                declared: self.size_in_bytes,
                actual,
            });
        }
        Ok(())
    }
}

/// Requests a download of `filepath`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequest {
    pub filepath: String,
}

impl FileRequest {
    pub fn new(filepath: impl Into<String>) -> Self {
        Self {
            filepath: filepath.into(),
        }
    }
}

/// Outcome code of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Error,
}

impl StatusCode {
    pub fn as_byte(self) -> u8 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::Error => 1,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(StatusCode::Ok),
            1 => Some(StatusCode::Error),
            _ => None,
        }
    }
}

/// Terminal acknowledgment sent once by the receiving side of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadStatus {
    pub code: StatusCode,
    pub filepath: String,
}

impl UploadStatus {
    pub fn ok(filepath: impl Into<String>) -> Self {
        Self {
            code: StatusCode::Ok,
            filepath: filepath.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}
