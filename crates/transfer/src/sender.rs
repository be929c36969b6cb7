//! Sending side: turns a local file into an ordered chunk stream.

use std::io;
use std::path::Path;

use ferry_protocol::Chunk;
use tokio::fs::File;
use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::chunked::ChunkReader;
use crate::progress::ProgressSink;
use crate::session::{Stats, TransferSession};
use crate::transport::{ChunkSink, DownloadSink, UploadSink};
use crate::{Phase, TransferError};

/// What the server did with a download request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadServed {
    /// The file was missing; the not-found signal was sent.
    NotFound,
    /// The file was streamed.
    Sent(Stats),
}

/// Streams every block of `reader` into `sink`.
///
/// `name` goes on the first chunk, or on every chunk when
/// `every_chunk_named` is set. The total is taken from `session`, which must
/// already hold it. Exactly one chunk is sent with `is_last_chunk` set, and
/// it is the last one.
pub async fn stream_file<R, S>(
    reader: &mut ChunkReader<R>,
    name: &str,
    every_chunk_named: bool,
    session: &mut TransferSession,
    sink: &mut S,
    progress: &dyn ProgressSink,
) -> Result<(), TransferError>
where
    R: AsyncRead + Unpin + Send,
    S: ChunkSink,
{
    let total = session.total_bytes();
    progress.begin(session.label(), total.max(0) as u64);

    let mut first = true;
    while let Some((content, is_last)) = reader.next_block().await? {
        let filepath = if first || every_chunk_named { name } else { "" };
        let chunk = Chunk::new(filepath, content, total, is_last);
        let n = chunk.size_in_bytes;

        sink.send(chunk)
            .await
            .map_err(|e| TransferError::transport(Phase::SendChunk, e))?;

        session.record(n);
        progress.advance(n as u64, total.max(0) as u64);
        debug!(name, bytes = n, is_last, "chunk sent");
        first = false;
    }

    progress.finish();
    Ok(())
}

/// Uploads the file at `path` and waits for the receiver's acknowledgment.
///
/// The remote name is the file's base name. A non-`Ok` status is returned as
/// [`TransferError::UploadRejected`].
pub async fn upload_file<T: UploadSink>(
    path: &Path,
    chunk_size: usize,
    transport: &mut T,
    progress: &dyn ProgressSink,
) -> Result<Stats, TransferError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TransferError::InvalidPath(format!("no file name: {}", path.display())))?;

    let file = File::open(path).await?;
    let size = file.metadata().await?.len() as i64;

    let mut session = TransferSession::new(name.as_str());
    session.set_total_once(size);

    let mut reader = ChunkReader::new(file, chunk_size);
    stream_file(&mut reader, &name, false, &mut session, transport, progress).await?;
    drop(reader);

    let status = transport
        .close_and_recv()
        .await
        .map_err(|e| TransferError::transport(Phase::ReceiveStatus, e))?;
    if !status.is_ok() {
        let rejected = if status.filepath.is_empty() {
            name
        } else {
            status.filepath
        };
        return Err(TransferError::UploadRejected(rejected));
    }

    let stats = session.finish();
    info!(
        file = %name,
        bytes = stats.bytes,
        chunks = stats.chunks,
        "upload acknowledged"
    );
    Ok(stats)
}

/// Streams the file at `path` to a downloading client.
///
/// `requested` is the name the client asked for; it is carried on every
/// chunk. A missing file is answered with the not-found signal.
pub async fn serve_download<T: DownloadSink>(
    path: &Path,
    requested: &str,
    chunk_size: usize,
    transport: &mut T,
    progress: &dyn ProgressSink,
) -> Result<DownloadServed, TransferError> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "requested file does not exist");
            transport
                .send_not_found(Chunk::not_found(requested))
                .await
                .map_err(|e| TransferError::transport(Phase::SendNotFound, e))?;
            return Ok(DownloadServed::NotFound);
        }
        Err(e) => return Err(e.into()),
    };
    let size = file.metadata().await?.len() as i64;

    let mut session = TransferSession::new(requested);
    session.set_total_once(size);

    let mut reader = ChunkReader::new(file, chunk_size);
    stream_file(&mut reader, requested, true, &mut session, transport, progress).await?;

    let stats = session.finish();
    info!(path = %path.display(), bytes = stats.bytes, "download served");
    Ok(DownloadServed::Sent(stats))
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use ferry_protocol::UploadStatus;
    use tempfile::TempDir;

    use super::*;
    use crate::progress::{CountingProgress, NoProgress};

    /// Records chunks and answers the upload with a fixed status.
    struct RecordingUpload {
        chunks: Vec<Chunk>,
        reply: UploadStatus,
        closed: bool,
    }

    impl RecordingUpload {
        fn replying(reply: UploadStatus) -> Self {
            Self {
                chunks: Vec::new(),
                reply,
                closed: false,
            }
        }
    }

    impl ChunkSink for RecordingUpload {
        type Error = Infallible;

        async fn send(&mut self, chunk: Chunk) -> Result<(), Infallible> {
            assert!(!self.closed, "send after close");
            self.chunks.push(chunk);
            Ok(())
        }
    }

    impl UploadSink for RecordingUpload {
        async fn close_and_recv(&mut self) -> Result<UploadStatus, Infallible> {
            self.closed = true;
            Ok(self.reply.clone())
        }
    }

    async fn chunks_of(data: &[u8], chunk_size: usize) -> Vec<Chunk> {
        let mut reader = ChunkReader::new(data, chunk_size);
        let mut session = TransferSession::new("f");
        session.set_total_once(data.len() as i64);
        let mut sink = Vec::new();
        stream_file(&mut reader, "f", false, &mut session, &mut sink, &NoProgress)
            .await
            .unwrap();
        sink
    }

    fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[tokio::test]
    async fn chunk_counts_and_final_size() {
        let chunk_size = 4;
        for size in 0..=10 * chunk_size {
            let data: Vec<u8> = (0..size).map(|i| i as u8).collect();
            let chunks = chunks_of(&data, chunk_size).await;

            let expected = if size == 0 { 1 } else { size.div_ceil(chunk_size) };
            assert_eq!(chunks.len(), expected, "size {size}");

            let last = chunks.last().unwrap();
            let tail = if size % chunk_size == 0 && size > 0 {
                chunk_size
            } else {
                size % chunk_size
            };
            assert_eq!(last.size_in_bytes as usize, tail, "size {size}");

            for c in &chunks[..chunks.len() - 1] {
                assert_eq!(c.size_in_bytes as usize, chunk_size);
            }
        }
    }

    #[tokio::test]
    async fn produced_chunks_keep_invariants() {
        let data = vec![7u8; 23];
        let chunks = chunks_of(&data, 5).await;

        assert_eq!(chunks.iter().filter(|c| c.is_last_chunk).count(), 1);
        assert!(chunks.last().unwrap().is_last_chunk);
        for c in &chunks {
            assert!(c.check_size().is_ok());
            assert_eq!(c.size_total_bytes, 23);
        }
        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.content.clone()).collect();
        assert_eq!(joined, data);
    }

    #[tokio::test]
    async fn upload_names_only_first_chunk() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "notes.txt", b"abcdefghij");

        let mut transport = RecordingUpload::replying(UploadStatus::ok("notes.txt"));
        let stats = upload_file(&path, 4, &mut transport, &NoProgress)
            .await
            .unwrap();

        assert!(transport.closed);
        assert_eq!(stats.bytes, 10);
        assert_eq!(stats.chunks, 3);
        assert_eq!(transport.chunks[0].filepath, "notes.txt");
        assert!(transport.chunks[1..].iter().all(|c| c.filepath.is_empty()));
    }

    #[tokio::test]
    async fn upload_reports_progress() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "p.bin", &[1u8; 9]);

        let progress = CountingProgress::new();
        let mut transport = RecordingUpload::replying(UploadStatus::ok("p.bin"));
        upload_file(&path, 4, &mut transport, &progress).await.unwrap();

        assert_eq!(progress.label(), "p.bin");
        assert_eq!(progress.total(), 9);
        assert_eq!(progress.transferred(), 9);
        assert_eq!(progress.chunks(), 3);
        assert!(progress.is_finished());
    }

    #[tokio::test]
    async fn rejected_upload_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "r.bin", b"x");

        let reply = UploadStatus {
            code: ferry_protocol::StatusCode::Error,
            filepath: "r.bin".into(),
        };
        let mut transport = RecordingUpload::replying(reply);
        let err = upload_file(&path, 4, &mut transport, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::UploadRejected(p) if p == "r.bin"));
    }

    #[tokio::test]
    async fn upload_of_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let mut transport = RecordingUpload::replying(UploadStatus::ok("x"));
        let err = upload_file(&dir.path().join("absent"), 4, &mut transport, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Io(e) if e.kind() == io::ErrorKind::NotFound));
        assert!(transport.chunks.is_empty());
    }

    #[tokio::test]
    async fn download_names_every_chunk() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "d.bin", &[3u8; 10]);

        let mut sink = Vec::new();
        let served = serve_download(&path, "d.bin", 4, &mut sink, &NoProgress)
            .await
            .unwrap();

        assert!(matches!(served, DownloadServed::Sent(s) if s.bytes == 10));
        assert_eq!(sink.len(), 3);
        assert!(sink.iter().all(|c| c.filepath == "d.bin"));
    }

    #[tokio::test]
    async fn download_of_missing_file_sends_sentinel() {
        let dir = TempDir::new().unwrap();
        let mut sink = Vec::new();
        let served = serve_download(
            &dir.path().join("does/not/exist"),
            "/does/not/exist",
            4,
            &mut sink,
            &NoProgress,
        )
        .await
        .unwrap();

        assert_eq!(served, DownloadServed::NotFound);
        assert_eq!(sink.len(), 1);
        assert!(sink[0].is_not_found_sentinel());
        assert_eq!(sink[0].filepath, "/does/not/exist");
    }

    #[tokio::test]
    async fn download_of_empty_file_is_one_empty_final_chunk() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty", b"");

        let mut sink = Vec::new();
        serve_download(&path, "empty", 4, &mut sink, &NoProgress)
            .await
            .unwrap();

        assert_eq!(sink.len(), 1);
        assert!(sink[0].is_last_chunk);
        assert!(sink[0].content.is_empty());
    }
}
