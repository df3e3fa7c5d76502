//! Reader pooling for concurrent decompression.
//!
//! An [`Archive`] owns a single read cursor. Discovery workers that
//! decompress in parallel each need their own, so a [`ReaderPool`] keeps a
//! bounded set of independent handles over the same file. The parsed tables
//! are shared between handles; only the byte source is duplicated.
//!
//! # Example
//!
//! ```rust,ignore
//! use hashfs::pool::ReaderPool;
//!
//! let pool = ReaderPool::new(&archive, 8)?;
//! rayon::scope(|s| {
//!     for path in paths {
//!         let pool = &pool;
//!         s.spawn(move |_| {
//!             let mut reader = pool.checkout();
//!             let _ = reader.extract(&path);
//!         });
//!     }
//! });
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::Result;
use crate::read::{Archive, ArchiveSource, FileSource};

pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("reader pool mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Statistics for pool usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of handles checked out.
    pub checkouts: u64,
    /// Number of checkouts that had to wait for a handle.
    pub waits: u64,
}

/// A bounded pool of independent archive handles.
pub struct ReaderPool<S: ArchiveSource = FileSource> {
    idle: Mutex<Vec<Archive<S>>>,
    returned: Condvar,
    capacity: usize,
    checkouts: AtomicU64,
    waits: AtomicU64,
}

impl<S: ArchiveSource> ReaderPool<S> {
    /// Creates a pool of `size` handles cloned from `archive`.
    ///
    /// A size of zero is treated as one.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be reopened.
    pub fn new(archive: &Archive<S>, size: usize) -> Result<Self> {
        let capacity = size.max(1);
        let mut idle = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            idle.push(archive.try_clone()?);
        }
        log::debug!("reader pool with {capacity} handles");
        Ok(Self {
            idle: Mutex::new(idle),
            returned: Condvar::new(),
            capacity,
            checkouts: AtomicU64::new(0),
            waits: AtomicU64::new(0),
        })
    }

    /// Returns the number of handles the pool owns.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of handles currently available.
    pub fn idle_count(&self) -> usize {
        lock_or_recover(&self.idle).len()
    }

    /// Takes a handle, blocking until one is returned if all are in use.
    ///
    /// The handle goes back to the pool when the guard is dropped.
    pub fn checkout(&self) -> PooledReader<'_, S> {
        let mut idle = lock_or_recover(&self.idle);
        let mut waited = false;
        let archive = loop {
            if let Some(archive) = idle.pop() {
                break archive;
            }
            waited = true;
            idle = self
                .returned
                .wait(idle)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        };
        drop(idle);

        self.checkouts.fetch_add(1, Ordering::Relaxed);
        if waited {
            self.waits.fetch_add(1, Ordering::Relaxed);
        }
        PooledReader {
            pool: self,
            archive: Some(archive),
        }
    }

    /// Takes a handle if one is available without blocking.
    pub fn try_checkout(&self) -> Option<PooledReader<'_, S>> {
        let archive = lock_or_recover(&self.idle).pop()?;
        self.checkouts.fetch_add(1, Ordering::Relaxed);
        Some(PooledReader {
            pool: self,
            archive: Some(archive),
        })
    }

    /// Returns the pool statistics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            checkouts: self.checkouts.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
        }
    }

    fn give_back(&self, archive: Archive<S>) {
        lock_or_recover(&self.idle).push(archive);
        self.returned.notify_one();
    }
}

/// A handle checked out of a [`ReaderPool`].
pub struct PooledReader<'a, S: ArchiveSource> {
    pool: &'a ReaderPool<S>,
    archive: Option<Archive<S>>,
}

impl<S: ArchiveSource> Deref for PooledReader<'_, S> {
    type Target = Archive<S>;

    fn deref(&self) -> &Self::Target {
        match &self.archive {
            Some(archive) => archive,
            None => unreachable!("pooled reader used after release"),
        }
    }
}

impl<S: ArchiveSource> DerefMut for PooledReader<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.archive {
            Some(archive) => archive,
            None => unreachable!("pooled reader used after release"),
        }
    }
}

impl<S: ArchiveSource> Drop for PooledReader<'_, S> {
    fn drop(&mut self) {
        if let Some(archive) = self.archive.take() {
            self.pool.give_back(archive);
        }
    }
}
