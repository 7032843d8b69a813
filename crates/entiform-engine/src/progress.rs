//! Live progress for a pipeline run
//!
//! Workers bump atomic counters; a ticker thread renders a single
//! rewriting status line on stderr, and the completion watcher prints the
//! final summary once.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Shared progress counters
#[derive(Debug)]
pub struct ProgressMonitor {
    total: usize,
    processed: AtomicUsize,
    active: AtomicUsize,
    started: Instant,
    enabled: bool,
    finished: AtomicBool,
}

impl ProgressMonitor {
    /// `enabled = false` keeps counting but never writes to stderr
    pub fn new(total: usize, enabled: bool) -> Self {
        Self {
            total,
            processed: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            started: Instant::now(),
            enabled,
            finished: AtomicBool::new(false),
        }
    }

    pub fn start_job(&self) {
        self.active.fetch_add(1, Ordering::Relaxed);
    }

    /// A job left a worker, whatever its outcome
    pub fn complete_job(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            processed: self.processed.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }

    /// Redraw the status line
    pub fn render(&self) {
        if !self.enabled || self.is_finished() {
            return;
        }

        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{}", self.snapshot().status_line());
        let _ = stderr.flush();
    }

    /// Print the summary line; only the first call has any effect
    pub fn finish(&self) -> bool {
        if self.finished.swap(true, Ordering::SeqCst) {
            return false;
        }

        if self.enabled {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "\r{}", self.snapshot().summary_line());
        }
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub processed: usize,
    pub active: usize,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.processed as f64 / self.total as f64 * 100.0
    }

    /// Files per second
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            "[{:3.0}%] {}/{} files | active:{} | {:.1} files/sec | {:.1?}",
            self.percent(),
            self.processed,
            self.total,
            self.active,
            self.rate(),
            self.elapsed
        )
    }

    pub fn summary_line(&self) -> String {
        format!(
            "[100%] {}/{} files | {:.1} files/sec | {:.1?}",
            self.total,
            self.total,
            self.rate(),
            self.elapsed
        )
    }
}
