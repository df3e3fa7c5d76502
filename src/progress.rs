//! Progress reporting and cancellation for long-running operations.
//!
//! Discovery, extraction and relocation report through a shared
//! [`ProgressReporter`] and poll a [`CancellationToken`] between units of
//! work. Reporters are called from discovery worker threads, so every
//! callback takes `&self`.
//!
//! # Example
//!
//! ```rust,ignore
//! use hashfs::progress::{AtomicProgress, CancellationToken};
//!
//! let progress = AtomicProgress::shared();
//! let cancel = CancellationToken::new();
//! let handler = cancel.clone();
//! ctrlc::set_handler(move || handler.cancel())?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::{Error, Result};

// Floating point versions for formatting calculations
const BYTES_KB: f64 = 1024.0;
const BYTES_MB: f64 = BYTES_KB * 1024.0;
const BYTES_GB: f64 = BYTES_MB * 1024.0;

/// Cooperative cancellation flag shared between threads.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Returns [`Error::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Stage of a run being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Path discovery.
    Discovery,
    /// Writing confirmed and decoy files.
    Extraction,
    /// Writing unrecovered entries.
    Dump,
    /// Resolving renamed resources.
    Relocation,
}

impl Phase {
    /// Short lowercase label.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Extraction => "extract",
            Phase::Dump => "dump",
            Phase::Relocation => "relocate",
        }
    }
}

/// Progress reporting trait for archive operations.
pub trait ProgressReporter: Send + Sync {
    /// Called when a phase starts. `total` is known for extraction phases.
    fn on_phase(&self, phase: Phase, total: Option<u64>) {
        let _ = (phase, total);
    }

    /// Called after each processed item.
    fn on_item(&self, path: &str) {
        let _ = path;
    }

    /// Called when a phase completes.
    fn on_phase_complete(&self, phase: Phase) {
        let _ = phase;
    }

    /// Called on any warning during processing.
    fn on_warning(&self, message: &str) {
        let _ = message;
    }
}

/// A progress reporter that does nothing (null object pattern).
#[derive(Debug, Default, Clone)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

/// Thread-safe progress counters.
#[derive(Debug)]
pub struct AtomicProgress {
    items: AtomicU64,
    total: AtomicU64,
    warnings: AtomicU64,
    start_time: Instant,
}

impl Default for AtomicProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicProgress {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self {
            items: AtomicU64::new(0),
            total: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Creates zeroed counters behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Items processed in the current phase.
    pub fn items(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }

    /// Announced total of the current phase (0 if unknown).
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Warnings seen so far.
    pub fn warnings(&self) -> u64 {
        self.warnings.load(Ordering::Relaxed)
    }

    /// Returns elapsed time since creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl ProgressReporter for AtomicProgress {
    fn on_phase(&self, _phase: Phase, total: Option<u64>) {
        self.items.store(0, Ordering::Relaxed);
        self.total.store(total.unwrap_or(0), Ordering::Relaxed);
    }

    fn on_item(&self, _path: &str) {
        self.items.fetch_add(1, Ordering::Relaxed);
    }

    fn on_warning(&self, _message: &str) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }
}

impl<P: ProgressReporter + ?Sized> ProgressReporter for Arc<P> {
    fn on_phase(&self, phase: Phase, total: Option<u64>) {
        (**self).on_phase(phase, total);
    }

    fn on_item(&self, path: &str) {
        (**self).on_item(path);
    }

    fn on_phase_complete(&self, phase: Phase) {
        (**self).on_phase_complete(phase);
    }

    fn on_warning(&self, message: &str) {
        (**self).on_warning(message);
    }
}

/// Formats a duration with millisecond precision, as used by timing
/// summaries.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.3}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Formats bytes as a human-readable string using IEC units (KiB, MiB, GiB).
///
/// # Examples
///
/// ```rust
/// use hashfs::progress::format_bytes_iec;
///
/// assert_eq!(format_bytes_iec(0), "0 B");
/// assert_eq!(format_bytes_iec(1536), "1.5 KiB");
/// assert_eq!(format_bytes_iec(1048576), "1.0 MiB");
/// ```
pub fn format_bytes_iec(bytes: u64) -> String {
    let bytes_f64 = bytes as f64;
    if bytes_f64 < BYTES_KB {
        format!("{} B", bytes)
    } else if bytes_f64 < BYTES_MB {
        format!("{:.1} KiB", bytes_f64 / BYTES_KB)
    } else if bytes_f64 < BYTES_GB {
        format!("{:.1} MiB", bytes_f64 / BYTES_MB)
    } else {
        format!("{:.1} GiB", bytes_f64 / BYTES_GB)
    }
}
