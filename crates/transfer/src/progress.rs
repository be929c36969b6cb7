use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Observer of transfer progress.
///
/// Purely informational: transfers behave identically whatever the sink does.
pub trait ProgressSink: Send + Sync {
    /// Called once, when the total size becomes known.
    fn begin(&self, label: &str, total_bytes: u64);

    /// Called for every chunk with its byte count and the transfer total.
    fn advance(&self, bytes: u64, total_bytes: u64);

    /// Called when the final chunk has been handled.
    fn finish(&self);
}

impl<P: ProgressSink + ?Sized> ProgressSink for std::sync::Arc<P> {
    fn begin(&self, label: &str, total_bytes: u64) {
        (**self).begin(label, total_bytes);
    }

    fn advance(&self, bytes: u64, total_bytes: u64) {
        (**self).advance(bytes, total_bytes);
    }

    fn finish(&self) {
        (**self).finish();
    }
}

/// Creates one [`ProgressSink`] per transfer.
pub trait ProgressFactory: Send + Sync {
    fn create(&self) -> Box<dyn ProgressSink>;
}

impl<F> ProgressFactory for F
where
    F: Fn() -> Box<dyn ProgressSink> + Send + Sync,
{
    fn create(&self) -> Box<dyn ProgressSink> {
        self()
    }
}

/// Discards all progress events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn begin(&self, _label: &str, _total_bytes: u64) {}
    fn advance(&self, _bytes: u64, _total_bytes: u64) {}
    fn finish(&self) {}
}

impl ProgressFactory for NoProgress {
    fn create(&self) -> Box<dyn ProgressSink> {
        Box::new(NoProgress)
    }
}

/// Accumulates progress events (headless runs and tests).
#[derive(Debug, Default)]
pub struct CountingProgress {
    label: Mutex<String>,
    total: AtomicU64,
    transferred: AtomicU64,
    chunks: AtomicU64,
    finished: AtomicBool,
}

impl CountingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(&self) -> String {
        self.label.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::Relaxed)
    }

    pub fn chunks(&self) -> u64 {
        self.chunks.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

impl ProgressSink for CountingProgress {
    fn begin(&self, label: &str, total_bytes: u64) {
        if let Ok(mut l) = self.label.lock() {
            *l = label.to_string();
        }
        self.total.store(total_bytes, Ordering::Relaxed);
    }

    fn advance(&self, bytes: u64, _total_bytes: u64) {
        self.transferred.fetch_add(bytes, Ordering::Relaxed);
        self.chunks.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}
