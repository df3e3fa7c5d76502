//! Mutable discovery state shared by workers.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::scan;
use super::{Discovery, DiscoveryMetrics};
use crate::Result;
use crate::pool::lock_or_recover;
use crate::progress::{CancellationToken, ProgressReporter};
use crate::read::{Archive, ArchiveSource, Entry, join_path};

/// How a candidate path came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Start path, possibly a guess.
    Seed,
    /// Named by a directory listing.
    Listing,
    /// Found inside another file's content.
    Reference,
    /// Another member of a model family.
    Sibling,
}

/// A path waiting to be resolved.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub path: String,
    pub origin: Origin,
}

impl Candidate {
    pub fn new(path: impl Into<String>, origin: Origin) -> Self {
        Self {
            path: path.into(),
            origin,
        }
    }
}

/// All state of one discovery run.
///
/// The visited set is the only deduplication authority: a hash is
/// processed by whichever worker inserts it first.
pub(crate) struct DiscoverySession {
    found: Mutex<BTreeSet<String>>,
    decoys: Mutex<BTreeSet<String>>,
    referenced: Mutex<BTreeSet<String>>,
    visited: Mutex<HashSet<u64>>,
    bytes_inflated: AtomicU64,
    files_parsed: AtomicU64,
    listings_read: AtomicU64,
    decompression_nanos: AtomicU64,
    parse_nanos: AtomicU64,
    /// Decompression time per worker thread.
    worker_nanos: Vec<AtomicU64>,
    cancel: CancellationToken,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl DiscoverySession {
    pub fn new(
        workers: usize,
        cancel: CancellationToken,
        progress: Option<Arc<dyn ProgressReporter>>,
    ) -> Self {
        Self {
            found: Mutex::default(),
            decoys: Mutex::default(),
            referenced: Mutex::default(),
            visited: Mutex::default(),
            bytes_inflated: AtomicU64::new(0),
            files_parsed: AtomicU64::new(0),
            listings_read: AtomicU64::new(0),
            decompression_nanos: AtomicU64::new(0),
            parse_nanos: AtomicU64::new(0),
            worker_nanos: (0..workers.max(1)).map(|_| AtomicU64::new(0)).collect(),
            cancel,
            progress,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Inserts `hash` into the visited set. Returns `false` if it was
    /// already there.
    fn mark_visited(&self, hash: u64) -> bool {
        lock_or_recover(&self.visited).insert(hash)
    }

    /// Resolves one candidate and returns the candidates it leads to.
    ///
    /// Per-entry failures are logged and end the branch. Only cancellation
    /// is returned as an error.
    pub fn process<S: ArchiveSource>(
        &self,
        reader: &mut Archive<S>,
        candidate: Candidate,
        worker: usize,
    ) -> Result<Vec<Candidate>> {
        self.cancel.check()?;

        let path = scan::canonical(&candidate.path);
        let hash = reader.hash_path(&path);

        // Unresolved paths are not marked visited, so the referenced set
        // does not depend on which spelling of a path came first.
        let Some(entry) = reader.entry_by_hash(hash).copied() else {
            if candidate.origin == Origin::Reference {
                log::trace!("unresolved reference: {path}");
                lock_or_recover(&self.referenced).insert(path);
            }
            return Ok(Vec::new());
        };
        if !self.mark_visited(hash) {
            return Ok(Vec::new());
        }

        let junk = reader.junk();
        if junk.is_decoy(hash) {
            log::debug!("decoy: {path}");
            lock_or_recover(&self.decoys).insert(path);
            return Ok(Vec::new());
        }
        if junk.is_junk(hash) {
            log::trace!("junk: {path}");
            return Ok(Vec::new());
        }

        if entry.is_directory {
            return Ok(self.expand_directory(reader, &entry, &path, worker));
        }

        if let Some(progress) = &self.progress {
            progress.on_item(&path);
        }
        lock_or_recover(&self.found).insert(path.clone());

        let mut next: Vec<Candidate> = scan::model_siblings(&path)
            .into_iter()
            .map(|sibling| Candidate::new(sibling, Origin::Sibling))
            .collect();

        // Packed textures are synthesized on extraction; their descriptor
        // only names the synthesized sibling.
        if scan::is_parseable(&path) && !entry.is_packed_texture() {
            self.cancel.check()?;
            next.extend(
                self.scan_file(reader, &entry, &path, worker)
                    .into_iter()
                    .map(|reference| Candidate::new(reference, Origin::Reference)),
            );
        }
        Ok(next)
    }

    fn expand_directory<S: ArchiveSource>(
        &self,
        reader: &mut Archive<S>,
        entry: &Entry,
        path: &str,
        worker: usize,
    ) -> Vec<Candidate> {
        let start = Instant::now();
        let listing = reader.listing_of(entry, false);
        self.add_decompression(start.elapsed(), worker);

        match listing {
            Ok(listing) => {
                self.listings_read.fetch_add(1, Ordering::Relaxed);
                listing
                    .subdirectories
                    .iter()
                    .chain(listing.files.iter())
                    .map(|name| Candidate::new(join_path(path, name), Origin::Listing))
                    .collect()
            }
            Err(e) => {
                log::warn!("cannot read listing of {path}: {e}");
                Vec::new()
            }
        }
    }

    fn scan_file<S: ArchiveSource>(
        &self,
        reader: &mut Archive<S>,
        entry: &Entry,
        path: &str,
        worker: usize,
    ) -> Vec<String> {
        let start = Instant::now();
        let payload = reader.read_payload(entry);
        self.add_decompression(start.elapsed(), worker);

        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("cannot read {path}: {e}");
                return Vec::new();
            }
        };
        self.bytes_inflated
            .fetch_add(payload.len() as u64, Ordering::Relaxed);

        let start = Instant::now();
        let references = scan::references(path, &payload);
        self.parse_nanos
            .fetch_add(nanos(start.elapsed()), Ordering::Relaxed);
        self.files_parsed.fetch_add(1, Ordering::Relaxed);

        log::trace!("{path}: {} references", references.len());
        references
    }

    fn add_decompression(&self, elapsed: Duration, worker: usize) {
        let elapsed = nanos(elapsed);
        self.decompression_nanos
            .fetch_add(elapsed, Ordering::Relaxed);
        self.worker_nanos[worker % self.worker_nanos.len()].fetch_add(elapsed, Ordering::Relaxed);
    }

    /// Publishes the results.
    pub fn finish(self, elapsed: Duration) -> Discovery {
        let wall = self
            .worker_nanos
            .iter()
            .map(|n| n.load(Ordering::Relaxed))
            .max()
            .unwrap_or(0);
        let found = into_inner(self.found);
        let metrics = DiscoveryMetrics {
            elapsed,
            decompression_time: Duration::from_nanos(self.decompression_nanos.into_inner()),
            decompression_wall_time: Duration::from_nanos(wall),
            parse_time: Duration::from_nanos(self.parse_nanos.into_inner()),
            bytes_inflated: self.bytes_inflated.into_inner(),
            files_parsed: self.files_parsed.into_inner(),
            listings_read: self.listings_read.into_inner(),
            unique_files: found.len() as u64,
            workers: self.worker_nanos.len(),
        };
        Discovery {
            found,
            decoys: into_inner(self.decoys),
            referenced: into_inner(self.referenced),
            metrics,
        }
    }
}

fn into_inner<T>(mutex: Mutex<T>) -> T {
    mutex
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
