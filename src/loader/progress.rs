use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{info, warn};
use std::fmt;
use std::io::{self, Write};

/// Reported after each chunk has been appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Zero-based position of the chunk
    pub index: usize,
    pub rows: usize,
    pub total_chunks: usize,
}

impl fmt::Display for ChunkProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {}/{}: {} rows",
            self.index + 1,
            self.total_chunks,
            self.rows
        )
    }
}

/// Receives progress from the loader between chunk appends. Purely
/// observational.
pub trait ProgressObserver {
    fn start(&mut self, _total_chunks: usize, _total_rows: usize) {}

    fn on_chunk(&mut self, progress: ChunkProgress);

    fn finish(&mut self) {}
}

pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_chunk(&mut self, _progress: ChunkProgress) {}
}

/// One log line per chunk, for non-interactive runs.
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_chunk(&mut self, progress: ChunkProgress) {
        info!("{}", progress);
    }
}

/// One plain `chunk i/n: k rows` line per chunk. Stdout unless told otherwise.
pub struct TextProgress<W: Write = io::Stdout> {
    out: W,
}

impl TextProgress {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TextProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ProgressObserver for TextProgress<W> {
    fn on_chunk(&mut self, progress: ChunkProgress) {
        if let Err(e) = writeln!(self.out, "{}", progress).and_then(|_| self.out.flush()) {
            warn!("Could not write progress: {}", e);
        }
    }
}

// Progress bar drawn on stdout
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stdout());
        let style = ProgressStyle::with_template(
            "Processing chunks {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for BarProgress {
    fn start(&mut self, total_chunks: usize, _total_rows: usize) {
        self.bar.set_length(total_chunks as u64);
        self.bar.set_position(0);
    }

    fn on_chunk(&mut self, progress: ChunkProgress) {
        self.bar.set_message(progress.to_string());
        self.bar.inc(1);
    }

    fn finish(&mut self) {
        self.bar.finish();
    }
}
