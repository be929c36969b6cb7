use std::io;

use ferry_protocol::DEFAULT_CHUNK_SIZE;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Splits a byte source into fixed-size blocks.
///
/// Every block except the last is exactly `chunk_size` bytes. One block is
/// read ahead so the final block is known when it is handed out, including
/// when the source length is an exact multiple of `chunk_size`. An empty
/// source yields a single empty final block.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    pending: Option<Vec<u8>>,
    done: bool,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Wraps `reader`.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            reader,
            chunk_size,
            pending: None,
            done: false,
        }
    }

    /// Returns the next block and whether it is the final one, or `None`
    /// once the final block has been returned.
    pub async fn next_block(&mut self) -> io::Result<Option<(Vec<u8>, bool)>> {
        if self.done {
            return Ok(None);
        }

        let current = match self.pending.take() {
            Some(block) => block,
            None => self.read_block().await?,
        };

        // A short block means the source is exhausted.
        if current.len() < self.chunk_size {
            self.done = true;
            return Ok(Some((current, true)));
        }

        let next = self.read_block().await?;
        if next.is_empty() {
            self.done = true;
            return Ok(Some((current, true)));
        }

        self.pending = Some(next);
        Ok(Some((current, false)))
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fills one block, stopping early only at end of input.
    async fn read_block(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }
}

// ---------------------------------------------------------------------------
// Short-write handling
// ---------------------------------------------------------------------------

/// Writes all of `data`, looping over partial writes.
///
/// Any write error is returned as-is on the first occurrence. A write that
/// accepts zero bytes fails with [`io::ErrorKind::WriteZero`].
pub async fn write_chunk_content<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> io::Result<()> {
    let mut offset = 0;
    while offset < data.len() {
        let n = writer.write(&data[offset..]).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("writer accepted no bytes at offset {offset} of {}", data.len()),
            ));
        }
        offset += n;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use super::*;

    /// Accepts at most one byte per write call.
    #[derive(Default)]
    pub(crate) struct OneByteWriter {
        pub(crate) data: Vec<u8>,
        pub(crate) calls: usize,
    }

    impl AsyncWrite for OneByteWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            self.calls += 1;
            match buf.first() {
                Some(&b) => {
                    self.data.push(b);
                    Poll::Ready(Ok(1))
                }
                None => Poll::Ready(Ok(0)),
            }
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Fails every write with the configured error kind.
    struct FailingWriter(io::ErrorKind);

    impl AsyncWrite for FailingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::new(self.0, "injected failure")))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Accepts nothing.
    struct ZeroWriter;

    impl AsyncWrite for ZeroWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Ok(0))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    async fn collect(data: &[u8], chunk_size: usize) -> Vec<(Vec<u8>, bool)> {
        let mut reader = ChunkReader::new(data, chunk_size);
        let mut blocks = Vec::new();
        while let Some(block) = reader.next_block().await.unwrap() {
            blocks.push(block);
        }
        blocks
    }

    #[tokio::test]
    async fn reads_all_with_short_tail() {
        let blocks = collect(b"AABBCCDDEE", 4).await;
        assert_eq!(
            blocks,
            vec![
                (b"AABB".to_vec(), false),
                (b"CCDD".to_vec(), false),
                (b"EE".to_vec(), true),
            ]
        );
    }

    #[tokio::test]
    async fn exact_multiple_marks_last_full_block() {
        let blocks = collect(b"AABBCCDD", 4).await;
        assert_eq!(
            blocks,
            vec![(b"AABB".to_vec(), false), (b"CCDD".to_vec(), true)]
        );
    }

    #[tokio::test]
    async fn empty_source_yields_one_empty_final_block() {
        let blocks = collect(b"", 4).await;
        assert_eq!(blocks, vec![(Vec::new(), true)]);
    }

    #[tokio::test]
    async fn fills_blocks_from_a_trickling_source() {
        // Reads from a duplex return whatever is buffered, often less than asked.
        let (mut tx, rx) = tokio::io::duplex(3);
        let writer = tokio::spawn(async move {
            tx.write_all(b"0123456789").await.unwrap();
        });

        let mut reader = ChunkReader::new(rx, 4);
        let mut blocks = Vec::new();
        while let Some(block) = reader.next_block().await.unwrap() {
            blocks.push(block);
        }
        writer.await.unwrap();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], (b"0123".to_vec(), false));
        assert_eq!(blocks[1], (b"4567".to_vec(), false));
        assert_eq!(blocks[2], (b"89".to_vec(), true));
    }

    #[tokio::test]
    async fn next_block_after_final_is_none() {
        let mut reader = ChunkReader::new(&b"x"[..], 8);
        assert!(reader.next_block().await.unwrap().is_some());
        assert!(reader.next_block().await.unwrap().is_none());
        assert!(reader.next_block().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_chunk_size_uses_default() {
        let reader = ChunkReader::new(&b""[..], 0);
        assert_eq!(reader.chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[tokio::test]
    async fn short_writes_are_completed() {
        let mut w = OneByteWriter::default();
        write_chunk_content(&mut w, b"hello world").await.unwrap();
        assert_eq!(w.data, b"hello world");
        assert_eq!(w.calls, 11);
    }

    #[tokio::test]
    async fn empty_write_makes_no_calls() {
        let mut w = OneByteWriter::default();
        write_chunk_content(&mut w, b"").await.unwrap();
        assert_eq!(w.calls, 0);
    }

    #[tokio::test]
    async fn write_error_surfaces_unchanged() {
        let mut w = FailingWriter(io::ErrorKind::PermissionDenied);
        let err = write_chunk_content(&mut w, b"data").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn zero_length_write_is_write_zero() {
        let err = write_chunk_content(&mut ZeroWriter, b"data").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }
}
