//! Options for opening archives and for the phases that read them.

use std::sync::Arc;

use crate::junk::JunkOptions;
use crate::progress::{CancellationToken, ProgressReporter};

/// Options controlling how an archive is opened.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Salt to hash paths with instead of the one in the header.
    pub salt: Option<u16>,
    /// Read the version 1 entry table from the end of the file, ignoring the
    /// header offset. Some protected archives corrupt that offset.
    pub force_table_at_end: bool,
    /// Junk classification heuristics.
    pub junk: JunkOptions,
}

impl OpenOptions {
    /// Creates open options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the salt.
    pub fn salt(mut self, salt: u16) -> Self {
        self.salt = Some(salt);
        self
    }

    /// Forces the version 1 entry table to be read from the end of the file.
    pub fn force_table_at_end(mut self, force: bool) -> Self {
        self.force_table_at_end = force;
        self
    }

    /// Sets the junk classification heuristics.
    pub fn junk(mut self, junk: JunkOptions) -> Self {
        self.junk = junk;
        self
    }
}

/// Policy for handling existing files during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Count the file as failed if it exists.
    Error,
    /// Skip files that already exist.
    #[default]
    Skip,
    /// Overwrite existing files.
    Overwrite,
}

/// Thread count configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threads {
    /// Automatically determine thread count.
    #[default]
    Auto,
    /// Use a specific number of threads.
    ///
    /// The count must be non-zero. Use [`NonZeroUsize`](std::num::NonZeroUsize) to ensure
    /// this at compile time. If you have a value that might be zero, use
    /// [`Threads::count_or_single`] instead.
    Count(std::num::NonZeroUsize),
    /// Single-threaded operation.
    Single,
}

impl Threads {
    /// Creates a `Threads::Count` variant from a `usize`.
    ///
    /// Returns `Threads::Single` if the count is zero, otherwise returns
    /// `Threads::Count` with the specified thread count.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hashfs::read::Threads;
    ///
    /// assert_eq!(Threads::count_or_single(0), Threads::Single);
    /// assert_eq!(Threads::count_or_single(4).count(), 4);
    /// ```
    pub fn count_or_single(n: usize) -> Self {
        match std::num::NonZeroUsize::new(n) {
            Some(count) => Self::Count(count),
            None => Self::Single,
        }
    }

    /// Returns the actual thread count.
    ///
    /// - `Threads::Auto`: the number of available CPUs, minimum 1
    /// - `Threads::Count(n)`: `n.get()`
    /// - `Threads::Single`: 1
    pub fn count(&self) -> usize {
        match self {
            Self::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            Self::Count(n) => n.get(),
            Self::Single => 1,
        }
    }

    /// Returns `true` if work should run on the calling thread only.
    pub fn is_single(&self) -> bool {
        self.count() <= 1
    }
}

/// Options for path discovery.
#[derive(Clone)]
pub struct DiscoveryOptions {
    /// Extra start paths, for archives without usable listings.
    pub extra_seeds: Vec<String>,
    /// Also start from a built-in list of well-known paths.
    pub well_known_seeds: bool,
    /// Thread configuration. [`Threads::Single`] scans on the archive's own
    /// handle.
    pub threads: Threads,
    /// Number of pooled reader handles. Defaults to the thread count.
    pub pool_size: Option<usize>,
    /// Cancellation token checked between units of work.
    pub cancel: CancellationToken,
    /// Progress reporter (optional).
    pub progress: Option<Arc<dyn ProgressReporter>>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            extra_seeds: Vec::new(),
            well_known_seeds: true,
            threads: Threads::Auto,
            pool_size: None,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }
}

impl std::fmt::Debug for DiscoveryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryOptions")
            .field("extra_seeds", &self.extra_seeds)
            .field("well_known_seeds", &self.well_known_seeds)
            .field("threads", &self.threads)
            .field("pool_size", &self.pool_size)
            .finish_non_exhaustive()
    }
}

impl DiscoveryOptions {
    /// Creates discovery options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds extra start paths.
    pub fn extra_seeds<I, P>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.extra_seeds.extend(seeds.into_iter().map(Into::into));
        self
    }

    /// Enables or disables the built-in start paths.
    pub fn well_known_seeds(mut self, enabled: bool) -> Self {
        self.well_known_seeds = enabled;
        self
    }

    /// Sets the thread configuration.
    pub fn threads(mut self, threads: Threads) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the reader pool size.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size);
        self
    }

    /// Sets the cancellation token.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Sets the progress reporter.
    pub fn progress(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    /// Effective reader pool size.
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.unwrap_or_else(|| self.threads.count()).max(1)
    }
}

/// Options for extraction.
#[derive(Clone)]
pub struct ExtractOptions {
    /// Archive path prefixes to extract. Empty extracts everything and
    /// enables the unknown-file dump.
    pub filter: Vec<String>,
    /// Policy for handling existing files.
    pub overwrite: OverwritePolicy,
    /// Do everything except touching the filesystem.
    pub dry_run: bool,
    /// Write unrecovered entries under `_unknown` (only without a filter).
    pub dump_unknown: bool,
    /// Write decoy files under `_decoy`.
    pub decoys: bool,
    /// Cancellation token checked between files.
    pub cancel: CancellationToken,
    /// Progress reporter (optional).
    pub progress: Option<Arc<dyn ProgressReporter>>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            filter: Vec::new(),
            overwrite: OverwritePolicy::default(),
            dry_run: false,
            dump_unknown: true,
            decoys: true,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }
}

impl std::fmt::Debug for ExtractOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractOptions")
            .field("filter", &self.filter)
            .field("overwrite", &self.overwrite)
            .field("dry_run", &self.dry_run)
            .field("dump_unknown", &self.dump_unknown)
            .field("decoys", &self.decoys)
            .finish_non_exhaustive()
    }
}

impl ExtractOptions {
    /// Creates extraction options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts extraction to paths starting with one of `prefixes`.
    ///
    /// A lone `/` is the same as no filter.
    pub fn filter<I, P>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.filter = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p| p != "/")
            .collect();
        self
    }

    /// Sets the overwrite policy.
    pub fn overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    /// Enables dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enables or disables the unknown-file dump.
    pub fn dump_unknown(mut self, enabled: bool) -> Self {
        self.dump_unknown = enabled;
        self
    }

    /// Enables or disables writing decoys.
    pub fn decoys(mut self, enabled: bool) -> Self {
        self.decoys = enabled;
        self
    }

    /// Sets the cancellation token.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Sets the progress reporter.
    pub fn progress(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    /// Returns `true` if a path filter is active.
    pub fn is_filtered(&self) -> bool {
        !self.filter.is_empty()
    }

    /// Returns `true` if `path` passes the filter.
    pub fn matches(&self, path: &str) -> bool {
        self.filter.is_empty() || self.filter.iter().any(|p| path.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_options_builder() {
        let opts = OpenOptions::new().salt(12).force_table_at_end(true);
        assert_eq!(opts.salt, Some(12));
        assert!(opts.force_table_at_end);
        assert_eq!(opts.junk, JunkOptions::default());
    }

    #[test]
    fn test_extract_filter() {
        let opts = ExtractOptions::new().filter(["/"]);
        assert!(!opts.is_filtered());
        assert!(opts.matches("/anything"));

        let opts = ExtractOptions::new().filter(["/def/", "/map"]);
        assert!(opts.matches("/def/city.sii"));
        assert!(opts.matches("/map/europe.mbd"));
        assert!(!opts.matches("/model/a.pmd"));
        assert_eq!(opts.overwrite, OverwritePolicy::Skip);
    }

    #[test]
    fn test_discovery_pool_size() {
        let opts = DiscoveryOptions::new().threads(Threads::Single);
        assert_eq!(opts.effective_pool_size(), 1);
        let opts = opts.pool_size(0);
        assert_eq!(opts.effective_pool_size(), 1);
        let opts = DiscoveryOptions::new().pool_size(6);
        assert_eq!(opts.effective_pool_size(), 6);
    }

    #[test]
    fn test_threads() {
        assert!(Threads::Single.is_single());
        assert!(Threads::count_or_single(1).is_single());
        assert!(!Threads::count_or_single(3).is_single());
        assert!(Threads::Auto.count() >= 1);
    }
}
