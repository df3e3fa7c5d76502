//! Writing discovered files to disk.
//!
//! Extraction takes a [`Discovery`] and writes every recovered path under
//! an output root:
//!
//! 1. Recovered files, optionally restricted to path prefixes, are written
//!    under their [sanitized](sanitize) names. References to renamed files
//!    are rewritten in text formats and texture descriptors.
//! 2. Decoys are written under `_decoy/`.
//! 3. Without a prefix filter, entries no path was found for are dumped to
//!    `_unknown/`, named by hash and sniffed extension.
//! 4. Renamed resources are [relocated](crate::relocate) once everything
//!    else is written, even when extraction was cancelled.
//!
//! # Example
//!
//! ```rust,ignore
//! use hashfs::read::{Archive, DiscoveryOptions, ExtractOptions};
//!
//! let mut archive = Archive::open_path("mod.scs")?;
//! let discovery = archive.discover(&DiscoveryOptions::default())?;
//! let summary = archive.extract_discovered(&discovery, "out", &ExtractOptions::default())?;
//! println!("{summary}");
//! ```

pub mod sanitize;
pub mod substitution;

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;
use crate::discovery::{Discovery, scan};
use crate::progress::Phase;
use crate::read::{Archive, ArchiveSource, Entry, ExtractOptions, OverwritePolicy};
use crate::relocate::{self, RelocationReport, RelocationSession, UsageRecord};
use crate::sniff;
use crate::texture::dds_path_for;

use sanitize::{relative, sanitize_path};
use substitution::{SubstitutionMap, is_substituted};

/// Folder for decoy files under the output root.
pub const DECOY_DIR: &str = "_decoy";

/// Folder for unrecovered entries under the output root.
pub const UNKNOWN_DIR: &str = "_unknown";

/// Counters of an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Files written, decoys included.
    pub extracted: usize,
    /// Files written under a sanitized name.
    pub renamed: usize,
    /// Files whose references were rewritten.
    pub modified: usize,
    /// Unrecovered entries written to the dump folder.
    pub dumped: usize,
    /// Files left alone because they already existed.
    pub skipped: usize,
    /// Junk entries in the archive.
    pub junk: usize,
    /// Files that could not be read or written.
    pub failed: usize,
    /// Bytes written.
    pub bytes_written: u64,
    /// Relocation counters.
    pub relocation: RelocationReport,
    /// Failed paths and their errors.
    pub failures: Vec<(String, String)>,
}

impl ExtractSummary {
    /// Returns true if nothing failed.
    pub fn is_ok(&self) -> bool {
        self.failed == 0
    }

    /// Adds the counters of another run.
    pub fn merge(&mut self, other: ExtractSummary) {
        self.extracted += other.extracted;
        self.renamed += other.renamed;
        self.modified += other.modified;
        self.dumped += other.dumped;
        self.skipped += other.skipped;
        self.junk += other.junk;
        self.failed += other.failed;
        self.bytes_written += other.bytes_written;
        self.relocation.renamed += other.relocation.renamed;
        self.relocation.patched += other.relocation.patched;
        self.relocation.copied += other.relocation.copied;
        self.relocation.removed += other.relocation.removed;
        self.relocation.failed += other.relocation.failed;
        self.failures.extend(other.failures);
    }

    fn fail(&mut self, path: &str, error: impl fmt::Display) {
        log::warn!("{path}: {error}");
        self.failed += 1;
        self.failures.push((path.to_string(), error.to_string()));
    }
}

impl fmt::Display for ExtractSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} extracted ({} renamed, {} modified, {} dumped), {} skipped, {} junk, {} failed",
            self.extracted,
            self.renamed,
            self.modified,
            self.dumped,
            self.skipped,
            self.junk,
            self.failed
        )
    }
}

impl<S: ArchiveSource> Archive<S> {
    /// Writes the files of `discovery` under `dest`.
    ///
    /// See [`extract_discovered`].
    pub fn extract_discovered(
        &mut self,
        discovery: &Discovery,
        dest: impl AsRef<Path>,
        options: &ExtractOptions,
    ) -> Result<ExtractSummary> {
        extract_discovered(self, discovery, dest.as_ref(), options)
    }
}

/// Writes the files of `discovery` under `dest`.
///
/// Per-file failures are counted in the summary.
///
/// # Errors
///
/// Returns [`Error::Cancelled`](crate::Error::Cancelled) if the options'
/// token is cancelled. Files written up to that point stay, and renamed
/// resources among them are still relocated.
pub fn extract_discovered<S: ArchiveSource>(
    archive: &mut Archive<S>,
    discovery: &Discovery,
    dest: &Path,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    let substitutions = sanitize::substitutions(discovery.found.iter().map(String::as_str));
    let mut run = Extraction {
        junk: archive.junk().junk_count(),
        archive,
        dest,
        options,
        substitutions,
        relocation: RelocationSession::new(),
        summary: ExtractSummary::default(),
    };

    let outcome = run.write_all(discovery);
    run.relocate();
    outcome?;

    run.summary.junk = run.junk;
    log::debug!("{}: {}", dest.display(), run.summary);
    Ok(run.summary)
}

struct Extraction<'a, S> {
    archive: &'a mut Archive<S>,
    dest: &'a Path,
    options: &'a ExtractOptions,
    substitutions: SubstitutionMap,
    relocation: RelocationSession,
    summary: ExtractSummary,
    junk: usize,
}

impl<S: ArchiveSource> Extraction<'_, S> {
    fn write_all(&mut self, discovery: &Discovery) -> Result<()> {
        let options = self.options;
        let files: Vec<&str> = discovery
            .found
            .iter()
            .map(String::as_str)
            .filter(|p| options.matches(p))
            .collect();
        let decoys: Vec<&str> = if options.decoys {
            discovery
                .decoys
                .iter()
                .map(String::as_str)
                .filter(|p| options.matches(p))
                .collect()
        } else {
            Vec::new()
        };

        if let Some(progress) = &options.progress {
            progress.on_phase(Phase::Extraction, Some((files.len() + decoys.len()) as u64));
        }

        let root = self.dest;
        for path in files {
            options.cancel.check()?;
            self.write_file(path, root, true);
            if let Some(progress) = &options.progress {
                progress.on_item(path);
            }
        }

        let decoy_root = root.join(DECOY_DIR);
        for path in decoys {
            options.cancel.check()?;
            self.write_file(path, &decoy_root, false);
            if let Some(progress) = &options.progress {
                progress.on_item(path);
            }
        }

        if let Some(progress) = &options.progress {
            progress.on_phase_complete(Phase::Extraction);
        }

        if !options.is_filtered() && options.dump_unknown && !options.dry_run {
            self.dump_unrecovered(discovery)?;
        }
        Ok(())
    }

    /// Whether an existing file at `target` is replaced. Counts the file
    /// otherwise.
    fn may_write(&mut self, path: &str, target: &Path) -> bool {
        if !target.exists() {
            return true;
        }
        match self.options.overwrite {
            OverwritePolicy::Overwrite => true,
            OverwritePolicy::Skip => {
                self.summary.skipped += 1;
                false
            }
            OverwritePolicy::Error => {
                self.summary.fail(path, "destination exists");
                false
            }
        }
    }

    /// Output path of the archive path `path`.
    fn output_of(&self, path: &str) -> String {
        self.substitutions
            .get(path)
            .cloned()
            .unwrap_or_else(|| sanitize_path(path))
    }

    fn write_file(&mut self, path: &str, root: &Path, rewrite: bool) {
        let output = self.output_of(path);
        let target = root.join(relative(&output));
        if rewrite {
            self.relocation.reserve(&output);
        }
        if !self.may_write(path, &target) {
            return;
        }

        let buffers = match self.archive.extract(path) {
            Ok(buffers) => buffers,
            Err(e) => {
                self.summary.fail(path, e);
                return;
            }
        };

        // A packed texture yields its descriptor and the synthesized image.
        let mut outputs: Vec<(String, PathBuf)> = vec![(output.clone(), target)];
        if buffers.len() > 1 {
            let dds = self.output_of(&dds_path_for(path));
            if rewrite {
                self.relocation.reserve(&dds);
            }
            let dds_target = root.join(relative(&dds));
            outputs.push((dds, dds_target));
        }

        for (buffer, (out_path, file)) in buffers.into_iter().zip(outputs) {
            let buffer = if rewrite {
                self.rewrite(path, &out_path, buffer)
            } else {
                buffer
            };
            if let Err(e) = self.write(&file, &buffer) {
                self.summary.fail(path, e);
                return;
            }
        }

        self.summary.extracted += 1;
        if output != path {
            log::debug!("renamed {path} -> {output}");
            self.summary.renamed += 1;
        }
    }

    /// Applies the substitution map to a buffer of the file at archive path
    /// `path`, about to be written at `out_path`, registering every
    /// replacement for relocation.
    fn rewrite(&mut self, path: &str, out_path: &str, buffer: Vec<u8>) -> Vec<u8> {
        let Some(ext) = scan::extension(out_path) else {
            return buffer;
        };
        if !is_substituted(&ext) {
            return buffer;
        }

        let map = &self.substitutions;
        let relocation = &mut self.relocation;
        let result = substitution::substitute_with(&buffer, &ext, path, map, |s| {
            let intended = sanitize_path(s.original);
            relocation.register_renamed(
                s.original,
                UsageRecord::new(out_path, &intended, s.output, s.written),
            );
        });
        match result {
            Ok((modified, out)) => {
                if modified {
                    self.summary.modified += 1;
                }
                out
            }
            Err(e) => {
                log::warn!("cannot rewrite references in {out_path}: {e}");
                buffer
            }
        }
    }

    fn write(&mut self, file: &Path, data: &[u8]) -> std::io::Result<()> {
        if self.options.dry_run {
            return Ok(());
        }
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file, data)?;
        self.summary.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Dumps non-junk file entries that no known path resolves to.
    fn dump_unrecovered(&mut self, discovery: &Discovery) -> Result<()> {
        let matched: HashSet<u64> = discovery
            .found
            .iter()
            .chain(discovery.decoys.iter())
            .chain(discovery.referenced.iter())
            .map(|p| self.archive.hash_path(p))
            .collect();
        let junk = self.archive.junk();
        let unrecovered: Vec<Entry> = self
            .archive
            .entries()
            .filter(|e| {
                !e.is_directory
                    && !matched.contains(&e.hash)
                    && !junk.is_junk(e.hash)
                    && !junk.is_maybe_junk(e.hash)
            })
            .copied()
            .collect();
        if unrecovered.is_empty() {
            return Ok(());
        }

        let options = self.options;
        if let Some(progress) = &options.progress {
            progress.on_phase(Phase::Dump, Some(unrecovered.len() as u64));
        }
        let root = self.dest.join(UNKNOWN_DIR);

        for entry in unrecovered {
            options.cancel.check()?;
            let label = format!("{:016x}", entry.hash);
            let buffers = match self.archive.extract_entry(&entry, "") {
                Ok(buffers) => buffers,
                Err(e) => {
                    self.summary.fail(&label, e);
                    continue;
                }
            };
            // For packed textures the image is the interesting part.
            let Some(data) = buffers.last() else {
                continue;
            };
            let name = sniff::dump_name(entry.hash, data);
            let target = root.join(&name);
            if !self.may_write(&label, &target) {
                continue;
            }
            match self.write(&target, data) {
                Ok(()) => self.summary.dumped += 1,
                Err(e) => self.summary.fail(&label, e),
            }
            if let Some(progress) = &options.progress {
                progress.on_item(&name);
            }
        }

        if let Some(progress) = &options.progress {
            progress.on_phase_complete(Phase::Dump);
        }
        Ok(())
    }

    fn relocate(&mut self) {
        let plan = self.relocation.finalize();
        if plan.relocations.is_empty() {
            return;
        }
        if let Some(progress) = &self.options.progress {
            progress.on_phase(Phase::Relocation, Some(plan.relocations.len() as u64));
        }
        let report = relocate::execute(&plan, self.dest, self.options.dry_run);
        self.summary.failed += report.failed;
        self.summary.relocation = report;
        if let Some(progress) = &self.options.progress {
            progress.on_phase_complete(Phase::Relocation);
        }
    }
}
