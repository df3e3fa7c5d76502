//! Several archives handled together.
//!
//! Mods and game layers spread their files over several archives: a
//! definition in one archive often references a model stored in another.
//! An [`ArchiveSet`] discovers every member in parallel, merges the results
//! into one path universe, and lets each member extract the part of the
//! universe it can resolve.
//!
//! Members are kept in priority order. When several members contain the
//! same path, the one added last wins.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::discovery::Discovery;
use crate::extract::ExtractSummary;
use crate::read::{
    Archive, ArchiveSource, DiscoveryOptions, Entry, ExtractOptions, FileSource, OpenOptions,
};
use crate::{Error, Result};

/// One archive of a set.
#[derive(Debug)]
pub struct Member<S = FileSource> {
    /// Display name, usually the file name.
    pub name: String,
    /// The open archive.
    pub archive: Archive<S>,
}

impl<S> Member<S> {
    /// Output subdirectory for separate extraction: the name without its
    /// extension.
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) if dot > 0 => &self.name[..dot],
            _ => &self.name,
        }
    }
}

/// Archives in priority order, lowest first.
#[derive(Debug)]
pub struct ArchiveSet<S = FileSource> {
    members: Vec<Member<S>>,
}

impl<S> Default for ArchiveSet<S> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
        }
    }
}

impl ArchiveSet<FileSource> {
    /// Opens every path that is a valid archive.
    ///
    /// Archives that fail to open are logged and returned with their errors;
    /// they do not prevent the others from opening.
    pub fn open_paths<P: AsRef<Path>>(
        paths: &[P],
        options: &OpenOptions,
    ) -> (Self, Vec<(PathBuf, Error)>) {
        let mut set = Self::new();
        let mut failures = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match Archive::open_path_with(path, options) {
                Ok(archive) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    set.push(name, archive);
                }
                Err(e) => {
                    log::warn!("skipping {}: {e}", path.display());
                    failures.push((path.to_path_buf(), e));
                }
            }
        }
        (set, failures)
    }
}

impl<S: ArchiveSource> ArchiveSet<S> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an archive with a higher priority than every member so far.
    pub fn push(&mut self, name: impl Into<String>, archive: Archive<S>) {
        self.members.push(Member {
            name: name.into(),
            archive,
        });
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in priority order.
    pub fn members(&self) -> &[Member<S>] {
        &self.members
    }

    /// Mutable access to the members, for reading their entries.
    pub fn members_mut(&mut self) -> &mut [Member<S>] {
        &mut self.members
    }

    /// Finds the member that provides `path`: the last one with a file or
    /// directory entry for it.
    pub fn resolve(&self, path: &str) -> Option<(usize, &Entry)> {
        self.members
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, m)| m.archive.try_get_entry(path).map(|e| (i, e)))
    }

    /// Runs discovery on every member, one member per rayon task.
    ///
    /// The result has one discovery per member, in member order. A member
    /// whose discovery fails is logged and contributes an empty discovery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the options' token is cancelled.
    pub fn discover_all(&mut self, options: &DiscoveryOptions) -> Result<Vec<Discovery>> {
        let results = self.run_discovery(options);
        options.cancel.check()?;

        Ok(results
            .into_iter()
            .zip(&self.members)
            .map(|(result, member)| match result {
                Ok(discovery) => discovery,
                Err(e) => {
                    log::warn!("discovery failed for {}: {e}", member.name);
                    Discovery::default()
                }
            })
            .collect())
    }

    #[cfg(feature = "parallel")]
    fn run_discovery(&mut self, options: &DiscoveryOptions) -> Vec<Result<Discovery>> {
        use rayon::prelude::*;

        self.members
            .par_iter_mut()
            .map(|member| member.archive.discover(options))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn run_discovery(&mut self, options: &DiscoveryOptions) -> Vec<Result<Discovery>> {
        self.members
            .iter_mut()
            .map(|member| member.archive.discover(options))
            .collect()
    }

    /// Every recovered or referenced path of any member.
    pub fn universe(discoveries: &[Discovery]) -> BTreeSet<String> {
        discoveries
            .iter()
            .flat_map(|d| d.found.iter().chain(d.referenced.iter()))
            .cloned()
            .collect()
    }

    /// The part of `universe` that member `index` extracts.
    ///
    /// Paths resolving to a file entry of the member are kept, decoys
    /// separately. With `exclusive`, paths that a later member also
    /// provides as a file are left to that member and listed as referenced.
    pub fn localize(&self, index: usize, universe: &BTreeSet<String>, exclusive: bool) -> Discovery {
        let mut local = Discovery::default();
        let Some(member) = self.members.get(index) else {
            return local;
        };
        let archive = &member.archive;
        let later = self.members.get(index + 1..).unwrap_or_default();

        for path in universe {
            let Some(entry) = archive.try_get_entry(path) else {
                continue;
            };
            if entry.is_directory {
                continue;
            }
            let junk = archive.junk();
            if junk.is_decoy(entry.hash) {
                local.decoys.insert(path.clone());
                continue;
            }
            if junk.is_junk(entry.hash) {
                continue;
            }
            let shadowed = exclusive
                && later.iter().any(|m| {
                    m.archive
                        .try_get_entry(path)
                        .is_some_and(|e| !e.is_directory && !m.archive.junk().is_junk(e.hash))
                });
            // Shadowed paths stay known so the member does not dump them.
            if shadowed {
                local.referenced.insert(path.clone());
            } else {
                local.found.insert(path.clone());
            }
        }
        local.metrics.unique_files = local.found.len() as u64;
        local
    }

    /// Extracts the union of `discoveries` member by member.
    ///
    /// With `separate`, every member writes everything it can resolve under
    /// `dest/<stem>`. Otherwise all members share `dest` and each path is
    /// written by the highest-priority member providing it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the options' token is cancelled. The
    /// member being extracted still relocates what it wrote.
    pub fn extract_all(
        &mut self,
        discoveries: &[Discovery],
        dest: &Path,
        options: &ExtractOptions,
        separate: bool,
    ) -> Result<Vec<ExtractSummary>> {
        let universe = Self::universe(discoveries);
        let mut summaries = Vec::with_capacity(self.members.len());

        for index in 0..self.members.len() {
            options.cancel.check()?;
            let local = self.localize(index, &universe, !separate);
            let member = &mut self.members[index];
            let root = if separate {
                dest.join(member.stem())
            } else {
                dest.to_path_buf()
            };
            log::debug!(
                "{}: extracting {} of {} paths",
                member.name,
                local.found.len(),
                universe.len()
            );
            summaries.push(member.archive.extract_discovered(&local, &root, options)?);
        }
        Ok(summaries)
    }
}
