//! Terminal progress bars.

use std::time::Duration;

use ferry_transfer::{ProgressFactory, ProgressSink};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const TEMPLATE: &str =
    "{msg:20!} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

fn style() -> ProgressStyle {
    ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// One bar for one transfer.
pub struct Bar(ProgressBar);

impl ProgressSink for Bar {
    fn begin(&self, label: &str, total_bytes: u64) {
        self.0.set_length(total_bytes);
        self.0.set_message(label.to_string());
        self.0.enable_steady_tick(Duration::from_millis(200));
    }

    fn advance(&self, bytes: u64, _total_bytes: u64) {
        self.0.inc(bytes);
    }

    fn finish(&self) {
        self.0.finish();
    }
}

impl Drop for Bar {
    fn drop(&mut self) {
        // A failed transfer never reaches finish().
        if !self.0.is_finished() {
            self.0.abandon();
        }
    }
}

/// Stacks one bar per concurrent transfer.
#[derive(Clone, Default)]
pub struct Bars {
    multi: MultiProgress,
}

impl Bars {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressFactory for Bars {
    fn create(&self) -> Box<dyn ProgressSink> {
        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style());
        Box::new(Bar(bar))
    }
}
