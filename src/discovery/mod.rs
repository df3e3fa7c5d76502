//! Path discovery for archives without complete directory listings.
//!
//! Entries only carry the hash of their path. Discovery treats the archive
//! as a graph: directory listings and path references inside parseable
//! files (SII units, materials, texture descriptors, model descriptors) are
//! edges, and every path that hashes to an entry is a recovered node.
//!
//! The walk starts at the root listing, a list of well-known definition
//! files and any extra seeds supplied by the caller. With more than one
//! thread, candidates are processed on a rayon pool, each task checking out
//! its own reader from a [`ReaderPool`]. Results do not depend on the thread
//! count.
//!
//! # Example
//!
//! ```rust,ignore
//! use hashfs::read::{Archive, DiscoveryOptions, Threads};
//!
//! let mut archive = Archive::open_path("base.scs")?;
//! let discovery = archive.discover(&DiscoveryOptions::new().threads(Threads::Auto))?;
//! println!("{} files, {} decoys", discovery.found.len(), discovery.decoys.len());
//! ```

pub mod scan;
pub mod seeds;
mod session;

use std::collections::{BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use crate::progress::Phase;
use crate::read::{Archive, ArchiveSource, DiscoveryOptions};
use crate::{Error, Result};

#[cfg(feature = "parallel")]
use crate::pool::ReaderPool;
use session::{Candidate, DiscoverySession, Origin};

/// Timing and volume counters of a discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryMetrics {
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
    /// Time spent reading and inflating payloads, summed over workers.
    pub decompression_time: Duration,
    /// Largest per-worker decompression time.
    pub decompression_wall_time: Duration,
    /// Time spent scanning payloads for references.
    pub parse_time: Duration,
    /// Bytes of scanned payloads after decompression.
    pub bytes_inflated: u64,
    /// Number of files scanned for references.
    pub files_parsed: u64,
    /// Number of directory listings read.
    pub listings_read: u64,
    /// Number of recovered file paths.
    pub unique_files: u64,
    /// Number of workers the run used.
    pub workers: usize,
}

/// Result of a discovery run.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Recovered file paths.
    pub found: BTreeSet<String>,
    /// Paths that resolve to decoy entries.
    pub decoys: BTreeSet<String>,
    /// Referenced paths that this archive does not contain.
    pub referenced: BTreeSet<String>,
    /// Counters.
    pub metrics: DiscoveryMetrics,
}

impl Discovery {
    /// Number of recovered file paths.
    pub fn unique_files(&self) -> usize {
        self.found.len()
    }

    /// Recovered and referenced paths together.
    pub fn all_paths(&self) -> BTreeSet<&str> {
        self.found
            .iter()
            .chain(self.referenced.iter())
            .map(String::as_str)
            .collect()
    }
}

impl<S: ArchiveSource> Archive<S> {
    /// Discovers the paths of this archive's entries.
    ///
    /// See [`discover`].
    pub fn discover(&mut self, options: &DiscoveryOptions) -> Result<Discovery> {
        discover(self, options)
    }
}

/// Discovers the paths of `archive`'s entries.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] if the options' token is cancelled; nothing
/// found up to that point is returned. Returns an error if reader handles
/// for parallel discovery cannot be opened. Unreadable or unparseable
/// entries are logged and skipped.
pub fn discover<S: ArchiveSource>(
    archive: &mut Archive<S>,
    options: &DiscoveryOptions,
) -> Result<Discovery> {
    let start = Instant::now();
    if let Some(progress) = &options.progress {
        progress.on_phase(Phase::Discovery, None);
    }

    let seeds: Vec<Candidate> = seeds::initial(&options.extra_seeds, options.well_known_seeds)
        .into_iter()
        .map(|path| Candidate::new(path, Origin::Seed))
        .collect();

    let session = if options.threads.is_single() {
        run_sequential(archive, options, seeds)?
    } else {
        run_parallel(archive, options, seeds)?
    };

    let discovery = session.finish(start.elapsed());
    log::debug!(
        "discovery: {} found, {} decoys, {} referenced, {} parsed in {:?}",
        discovery.found.len(),
        discovery.decoys.len(),
        discovery.referenced.len(),
        discovery.metrics.files_parsed,
        discovery.metrics.elapsed
    );
    if let Some(progress) = &options.progress {
        progress.on_phase_complete(Phase::Discovery);
    }
    Ok(discovery)
}

/// Processes candidates in FIFO order on the archive's own handle.
fn run_sequential<S: ArchiveSource>(
    archive: &mut Archive<S>,
    options: &DiscoveryOptions,
    seeds: Vec<Candidate>,
) -> Result<DiscoverySession> {
    let session = DiscoverySession::new(1, options.cancel.clone(), options.progress.clone());
    let mut queue: VecDeque<Candidate> = seeds.into();
    while let Some(candidate) = queue.pop_front() {
        queue.extend(session.process(archive, candidate, 0)?);
    }
    Ok(session)
}

#[cfg(not(feature = "parallel"))]
fn run_parallel<S: ArchiveSource>(
    archive: &mut Archive<S>,
    options: &DiscoveryOptions,
    seeds: Vec<Candidate>,
) -> Result<DiscoverySession> {
    log::debug!("built without `parallel`, discovering on one thread");
    run_sequential(archive, options, seeds)
}

#[cfg(feature = "parallel")]
struct ParallelContext<'a, S: ArchiveSource> {
    session: &'a DiscoverySession,
    pool: &'a ReaderPool<S>,
    failure: &'a std::sync::Mutex<Option<Error>>,
}

#[cfg(feature = "parallel")]
fn run_parallel<S: ArchiveSource>(
    archive: &mut Archive<S>,
    options: &DiscoveryOptions,
    seeds: Vec<Candidate>,
) -> Result<DiscoverySession> {
    use std::sync::Mutex;

    let pool = ReaderPool::new(archive, options.effective_pool_size())?;
    let thread_count = options.threads.count();
    let threads = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    log::debug!(
        "discovery on {thread_count} threads, {} readers",
        pool.capacity()
    );

    let session = DiscoverySession::new(
        thread_count,
        options.cancel.clone(),
        options.progress.clone(),
    );
    let failure = Mutex::new(None);
    let context = ParallelContext {
        session: &session,
        pool: &pool,
        failure: &failure,
    };

    threads.install(|| {
        rayon::scope(|scope| {
            for seed in seeds {
                spawn_candidate(scope, &context, seed);
            }
        })
    });

    let stats = pool.stats();
    log::debug!(
        "reader pool: {} checkouts, {} waits",
        stats.checkouts,
        stats.waits
    );

    match failure
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
    {
        Some(e) => Err(e),
        None => Ok(session),
    }
}

#[cfg(feature = "parallel")]
fn spawn_candidate<'s, S: ArchiveSource>(
    scope: &rayon::Scope<'s>,
    context: &'s ParallelContext<'s, S>,
    candidate: Candidate,
) {
    scope.spawn(move |scope| {
        if context.session.is_cancelled() {
            crate::pool::lock_or_recover(context.failure).get_or_insert(Error::Cancelled);
            return;
        }
        let worker = rayon::current_thread_index().unwrap_or(0);
        let result = {
            let mut reader = context.pool.checkout();
            context.session.process(&mut reader, candidate, worker)
        };
        match result {
            Ok(next) => {
                for candidate in next {
                    spawn_candidate(scope, context, candidate);
                }
            }
            Err(e) => {
                crate::pool::lock_or_recover(context.failure).get_or_insert(e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CancellationToken;
    use crate::fixtures::V1Builder;
    use crate::read::{MemorySource, Threads};

    fn sample() -> Archive<MemorySource> {
        V1Builder::new()
            .file(
                "/def/world/model.sii",
                b"SiiNunit\n{\nmodel_def : m.a\n{\n model_desc: \"/model/a.pmd\"\n icon: \"/missing.mat\"\n}\n}\n",
            )
            .file("/model/a.pmd", b"\x00\x01/material/a.mat\x00")
            .file("/model/a.pmg", b"\x15Gmp")
            .file("/material/a.mat", b"material : \"eut2.dif\" {\n texture : \"a.tobj\"\n}\n")
            .file("/unlisted.bin", b"data")
            .dir("/", &["*def"])
            .dir("/def", &["*world"])
            .dir("/def/world", &["model.sii"])
            .build()
    }

    fn options(threads: Threads) -> DiscoveryOptions {
        DiscoveryOptions::new()
            .well_known_seeds(false)
            .threads(threads)
    }

    #[test]
    fn test_follows_references() {
        let mut archive = sample();
        let discovery = archive.discover(&options(Threads::Single)).unwrap();

        let found: Vec<&str> = discovery.found.iter().map(String::as_str).collect();
        assert_eq!(
            found,
            ["/def/world/model.sii", "/material/a.mat", "/model/a.pmd", "/model/a.pmg"]
        );
        assert!(discovery.referenced.contains("/missing.mat"));
        assert!(discovery.referenced.contains("/material/a.tobj"));
        assert!(!discovery.found.contains("/unlisted.bin"));
        assert_eq!(discovery.metrics.files_parsed, 3);
        assert_eq!(discovery.metrics.listings_read, 3);
        assert_eq!(discovery.metrics.unique_files, 4);
    }

    #[test]
    fn test_extra_seed() {
        let mut archive = sample();
        let opts = options(Threads::Single).extra_seeds(["/unlisted.bin", "/nope.sii"]);
        let discovery = archive.discover(&opts).unwrap();
        assert!(discovery.found.contains("/unlisted.bin"));
        // Seeds are guesses, not references.
        assert!(!discovery.referenced.contains("/nope.sii"));
    }

    #[test]
    fn test_thread_count_does_not_change_results() {
        let single = sample().discover(&options(Threads::Single)).unwrap();
        let multi = sample()
            .discover(&options(Threads::count_or_single(4)).pool_size(3))
            .unwrap();
        assert_eq!(single.found, multi.found);
        assert_eq!(single.decoys, multi.decoys);
        assert_eq!(single.referenced, multi.referenced);
        assert_eq!(single.unique_files(), multi.unique_files());
        assert_eq!(single.metrics.files_parsed, multi.metrics.files_parsed);
    }

    #[test]
    fn test_cancelled_run_publishes_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = sample().discover(&options(Threads::Single).cancel(cancel.clone()));
        assert!(matches!(result, Err(Error::Cancelled)));
        let result = sample().discover(&options(Threads::count_or_single(2)).cancel(cancel));
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_all_paths() {
        let discovery = sample().discover(&options(Threads::Single)).unwrap();
        let all = discovery.all_paths();
        assert!(all.contains("/missing.mat"));
        assert!(all.contains("/model/a.pmd"));
    }
}
