use chrono::{DateTime, Utc};

/// Per-transfer bookkeeping, owned by the loop that drives one transfer.
#[derive(Debug, Clone)]
pub struct TransferSession {
    label: String,
    started_at: DateTime<Utc>,
    total_bytes: Option<i64>,
    transferred_bytes: i64,
    chunks: u64,
}

impl TransferSession {
    /// Starts a session; the clock starts now.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            started_at: Utc::now(),
            total_bytes: None,
            transferred_bytes: 0,
            chunks: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    /// Records the total size. Only the first call has an effect.
    pub fn set_total_once(&mut self, total: i64) -> i64 {
        *self.total_bytes.get_or_insert(total)
    }

    /// Total size, 0 until known.
    pub fn total_bytes(&self) -> i64 {
        self.total_bytes.unwrap_or(0)
    }

    /// Records one chunk of `bytes`.
    pub fn record(&mut self, bytes: i64) {
        self.transferred_bytes += bytes;
        self.chunks += 1;
    }

    pub fn transferred_bytes(&self) -> i64 {
        self.transferred_bytes
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Closes the session, stamping the finish time.
    pub fn finish(self) -> Stats {
        Stats {
            started_at: self.started_at,
            finished_at: Utc::now(),
            bytes: self.transferred_bytes,
            chunks: self.chunks,
        }
    }
}

/// Timing and volume of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub bytes: i64,
    pub chunks: u64,
}

impl Stats {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Average throughput; 0.0 when the elapsed time is zero.
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed().num_microseconds().unwrap_or(0) as f64 / 1_000_000.0;
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes as f64 / secs
    }
}
