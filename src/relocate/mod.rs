//! Deferred resolution of renamed resources.
//!
//! Sanitizing can send two different archive paths to the same output name,
//! and one resource can be referenced under the same name from several
//! places. Extraction writes each resource once under a provisional name
//! that is unique per source. Whether its intended name is free is only
//! known once every referencing file has been written, so relocation runs in
//! three steps:
//!
//! 1. [`RelocationSession::register`] records a [`UsageRecord`] for every
//!    reference substitution writes, and
//!    [`RelocationSession::reserve`] records every other written file.
//! 2. [`RelocationSession::finalize`] computes final names without touching
//!    the filesystem.
//! 3. [`execute`] patches every referencing file, then copies each resource
//!    to its final names and removes the provisional file.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut session = RelocationSession::new();
//! session.register(usage);
//! let plan = session.finalize();
//! let report = relocate::execute(&plan, Path::new("out"), false);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::scan;
use crate::extract::sanitize::relative;
use crate::extract::substitution::replace_first;
use crate::texture::tobj::Tobj;

/// One place a renamed resource is referenced from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    /// Output path of the referencing file, archive style.
    pub referencing_file: String,
    /// Extension of the referencing file.
    pub referencing_extension: String,
    /// Directory of the target, archive style.
    pub target_dir: String,
    /// Intended target file name without extension.
    pub base_name: String,
    /// Target extension without dot; may be empty.
    pub extension: String,
    /// Where the resource was written during extraction.
    pub provisional: String,
    /// Exact reference text written into the referencing file. Relative
    /// references stay relative.
    pub written_reference: String,
}

impl UsageRecord {
    /// Builds a usage of the resource written at `provisional`, whose
    /// intended output path is `intended`, referenced by the text `written`
    /// from `referencing_file`.
    pub fn new(referencing_file: &str, intended: &str, provisional: &str, written: &str) -> Self {
        let name = scan::file_name(intended);
        let (base_name, extension) = match name.rfind('.') {
            Some(dot) if dot > 0 => (&name[..dot], &name[dot + 1..]),
            _ => (name, ""),
        };
        Self {
            referencing_file: referencing_file.to_string(),
            referencing_extension: scan::extension(referencing_file).unwrap_or_default(),
            target_dir: scan::parent_dir(provisional).to_string(),
            base_name: base_name.to_string(),
            extension: extension.to_string(),
            provisional: provisional.to_string(),
            written_reference: written.to_string(),
        }
    }

    fn destination(&self, base_name: &str) -> String {
        let name = if self.extension.is_empty() {
            base_name.to_string()
        } else {
            format!("{base_name}.{}", self.extension)
        };
        crate::read::join_path(&self.target_dir, &name)
    }
}

/// All usages of one physical resource.
#[derive(Debug, Clone, Default)]
pub struct RelocationPlan {
    /// Where the resource was written during extraction.
    pub source: String,
    /// Archive path the source name was sanitized from.
    pub renamed_from: Option<String>,
    /// Usages in registration order.
    pub usages: Vec<UsageRecord>,
}

/// Collects usages during extraction.
#[derive(Debug, Default)]
pub struct RelocationSession {
    /// Keyed by lowercased provisional path.
    plans: BTreeMap<String, RelocationPlan>,
    /// Plan keys in creation order.
    order: Vec<String>,
    /// Lowercased output paths that final names must not take.
    reserved: HashSet<String>,
    finalized: bool,
}

impl RelocationSession {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of plans.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Returns `true` if nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Marks an output path as taken by another file.
    pub fn reserve(&mut self, path: &str) {
        self.reserved.insert(path.to_lowercase());
    }

    /// Records a usage of a resource that was written under a sanitized
    /// form of the archive path `original`.
    pub fn register_renamed(&mut self, original: &str, usage: UsageRecord) {
        let key = usage.provisional.to_lowercase();
        self.register(usage);
        if let Some(plan) = self.plans.get_mut(&key) {
            plan.renamed_from.get_or_insert_with(|| original.to_string());
        }
    }

    /// Records a usage. Every substituted reference is one usage, so a file
    /// that references a resource twice registers it twice.
    pub fn register(&mut self, usage: UsageRecord) {
        let key = usage.provisional.to_lowercase();
        let plan = self.plans.entry(key.clone()).or_insert_with(|| {
            self.order.push(key);
            RelocationPlan {
                source: usage.provisional.clone(),
                ..RelocationPlan::default()
            }
        });
        log::trace!("usage of {} from {}", usage.provisional, usage.referencing_file);
        plan.usages.push(usage);
    }

    /// Computes final names. Does not touch the filesystem.
    ///
    /// Per plan, an intended base name registered once keeps its name and a
    /// base name registered several times gets `_1`, `_2`, ... in
    /// registration order. A name claimed by an earlier plan, reserved by
    /// another written file or holding another plan's source is bumped to
    /// the next free suffix. A finalized session yields an empty plan on
    /// later calls.
    pub fn finalize(&mut self) -> FinalPlan {
        if self.finalized {
            return FinalPlan::default();
        }
        self.finalized = true;

        let mut claimed = std::mem::take(&mut self.reserved);
        claimed.extend(self.plans.keys().cloned());
        let mut relocations = Vec::with_capacity(self.order.len());

        for key in std::mem::take(&mut self.order) {
            let Some(plan) = self.plans.remove(&key) else {
                continue;
            };
            // A plan may always write over its own source.
            let taken = |destination: &str| {
                let lower = destination.to_lowercase();
                lower != key && claimed.contains(&lower)
            };

            let mut counts: HashMap<&str, usize> = HashMap::new();
            for usage in &plan.usages {
                *counts.entry(usage.base_name.as_str()).or_default() += 1;
            }

            let mut next_suffix: HashMap<&str, usize> = HashMap::new();
            let mut usages = Vec::with_capacity(plan.usages.len());
            for usage in &plan.usages {
                let base = usage.base_name.as_str();
                let mut destination = if counts[base] == 1 {
                    usage.destination(base)
                } else {
                    let n = next_suffix.entry(base).or_insert(0);
                    *n += 1;
                    usage.destination(&format!("{base}_{n}"))
                };
                if taken(&destination) {
                    let n = next_suffix.entry(base).or_insert(0);
                    loop {
                        *n += 1;
                        destination = usage.destination(&format!("{base}_{n}"));
                        if !taken(&destination) {
                            break;
                        }
                    }
                }
                usages.push(FinalUsage {
                    usage: usage.clone(),
                    destination,
                });
            }
            // Claims only block later plans.
            for usage in &usages {
                claimed.insert(usage.destination.to_lowercase());
            }

            relocations.push(Relocation {
                source: plan.source,
                renamed_from: plan.renamed_from,
                usages,
            });
        }
        FinalPlan { relocations }
    }
}

/// A usage with its final destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalUsage {
    /// The registered usage.
    pub usage: UsageRecord,
    /// Final output path, archive style.
    pub destination: String,
}

impl FinalUsage {
    /// Returns `true` if the reference must be rewritten.
    pub fn is_renamed(&self) -> bool {
        self.destination != self.usage.provisional
    }

    /// Reference text pointing at the destination, in the form that was
    /// written. Only the file name changes.
    pub fn reference(&self) -> String {
        let written = &self.usage.written_reference;
        let name = scan::file_name(&self.destination);
        match written.rfind('/') {
            Some(slash) => format!("{}{name}", &written[..=slash]),
            None => name.to_string(),
        }
    }
}

/// Final names for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Where the resource was written during extraction.
    pub source: String,
    /// Archive path the source name was sanitized from.
    pub renamed_from: Option<String>,
    /// Usages and their destinations.
    pub usages: Vec<FinalUsage>,
}

/// Output of [`RelocationSession::finalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalPlan {
    /// One entry per resource, in registration order.
    pub relocations: Vec<Relocation>,
}

impl FinalPlan {
    /// Returns `true` if nothing needs to change.
    pub fn is_noop(&self) -> bool {
        self.relocations
            .iter()
            .all(|r| r.usages.iter().all(|u| !u.is_renamed()))
    }
}

/// Counters of an executed plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocationReport {
    /// Usages whose destination differs from the provisional name.
    pub renamed: usize,
    /// Referencing files rewritten.
    pub patched: usize,
    /// Copies made.
    pub copied: usize,
    /// Provisional files removed.
    pub removed: usize,
    /// Failed patches, copies and removals.
    pub failed: usize,
}

fn output_path(root: &Path, path: &str) -> PathBuf {
    root.join(relative(path))
}

/// Applies `plan` to the files under `root`.
///
/// Every referencing file is patched before any resource is copied or
/// removed, so a referencing file that is itself relocated is patched at
/// its provisional location and its copies carry the patch. Failures are
/// logged and counted; they never stop the remaining usages. With
/// `dry_run`, only the counters are computed.
pub fn execute(plan: &FinalPlan, root: &Path, dry_run: bool) -> RelocationReport {
    let mut report = RelocationReport::default();

    for usage in plan.relocations.iter().flat_map(|r| &r.usages) {
        if !usage.is_renamed() {
            continue;
        }
        report.renamed += 1;
        if dry_run {
            continue;
        }
        match patch(root, usage) {
            Ok(()) => report.patched += 1,
            Err(e) => {
                log::warn!(
                    "cannot patch {} for {}: {e}",
                    usage.usage.referencing_file,
                    usage.destination
                );
                report.failed += 1;
            }
        }
    }
    if dry_run {
        return report;
    }

    for relocation in &plan.relocations {
        let mut all_copied = true;
        let mut keeps_source = false;

        for usage in &relocation.usages {
            if usage.destination.eq_ignore_ascii_case(&relocation.source) {
                keeps_source = true;
                continue;
            }
            match copy(root, &relocation.source, &usage.destination) {
                Ok(()) => report.copied += 1,
                Err(e) => {
                    log::warn!(
                        "cannot copy {} to {}: {e}",
                        relocation.source,
                        usage.destination
                    );
                    report.failed += 1;
                    all_copied = false;
                }
            }
        }

        let any_renamed = relocation.usages.iter().any(FinalUsage::is_renamed);
        if !any_renamed || !all_copied || keeps_source {
            continue;
        }
        let source = output_path(root, &relocation.source);
        match fs::remove_file(&source) {
            Ok(()) => {
                report.removed += 1;
                prune_empty_parents(root, &source);
            }
            Err(e) => {
                log::warn!("cannot remove {}: {e}", source.display());
                report.failed += 1;
            }
        }
    }

    if report.renamed > 0 {
        log::debug!(
            "relocation: {} renamed, {} patched, {} failed",
            report.renamed,
            report.patched,
            report.failed
        );
    }
    report
}

fn patch(root: &Path, usage: &FinalUsage) -> std::io::Result<()> {
    let path = output_path(root, &usage.usage.referencing_file);
    let data = fs::read(&path)?;
    let from = &usage.usage.written_reference;
    let to = usage.reference();

    let patched = if usage.usage.referencing_extension == "tobj" {
        let mut tobj = Tobj::parse(&data).map_err(std::io::Error::other)?;
        let mut done = false;
        tobj.rewrite_paths(|p| {
            (!done && p == from.as_str()).then(|| {
                done = true;
                to.clone()
            })
        });
        done.then(|| tobj.to_bytes())
    } else {
        replace_first(&data, from, &to)
    };

    match patched {
        Some(bytes) => fs::write(&path, bytes),
        None => Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("reference {from} not found"),
        )),
    }
}

fn copy(root: &Path, source: &str, destination: &str) -> std::io::Result<()> {
    let target = output_path(root, destination);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(output_path(root, source), target).map(|_| ())
}

/// Removes empty directories from `path`'s parent up to, not including,
/// `root`.
fn prune_empty_parents(root: &Path, path: &Path) {
    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        if fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(from: &str, target: &str) -> UsageRecord {
        UsageRecord::new(from, target, target, target)
    }

    fn destinations(relocation: &Relocation) -> Vec<&str> {
        relocation
            .usages
            .iter()
            .map(|u| u.destination.as_str())
            .collect()
    }

    #[test]
    fn test_usage_record_fields() {
        let u = UsageRecord::new("/material/a.mat", "/material/t_.tobj", "/material/t_~1.tobj", "t_~1.tobj");
        assert_eq!(u.referencing_extension, "mat");
        assert_eq!(u.target_dir, "/material");
        assert_eq!(u.base_name, "t_");
        assert_eq!(u.extension, "tobj");
        assert_eq!(u.provisional, "/material/t_~1.tobj");
        assert_eq!(u.written_reference, "t_~1.tobj");
    }

    #[test]
    fn test_single_usage_keeps_clean_name() {
        let mut session = RelocationSession::new();
        session.register_renamed("/t/x?.tobj", usage("/a.mat", "/t/x_.tobj"));
        let plan = session.finalize();
        assert_eq!(plan.relocations.len(), 1);
        assert_eq!(plan.relocations[0].renamed_from.as_deref(), Some("/t/x?.tobj"));
        assert_eq!(plan.relocations[0].usages[0].destination, "/t/x_.tobj");
        assert!(plan.is_noop());
    }

    #[test]
    fn test_repeated_base_name_gets_suffixes() {
        let mut session = RelocationSession::new();
        session.register(usage("/a.mat", "/t/x_.tobj"));
        session.register(usage("/b.mat", "/t/x_.tobj"));
        // A second reference from the same file is a usage of its own.
        session.register(usage("/b.mat", "/t/x_.tobj"));
        let plan = session.finalize();
        assert_eq!(
            destinations(&plan.relocations[0]),
            ["/t/x__1.tobj", "/t/x__2.tobj", "/t/x__3.tobj"]
        );
    }

    #[test]
    fn test_claimed_name_is_bumped() {
        let mut session = RelocationSession::new();
        session.register(usage("/a.mat", "/t/X_1.tobj"));
        session.register(usage("/b.mat", "/t/x.tobj"));
        session.register(usage("/c.mat", "/t/x.tobj"));
        let plan = session.finalize();
        assert_eq!(plan.relocations[0].usages[0].destination, "/t/X_1.tobj");
        assert_eq!(destinations(&plan.relocations[1]), ["/t/x_2.tobj", "/t/x_3.tobj"]);
    }

    #[test]
    fn test_collider_moves_off_other_source() {
        // Two sources intended for `/t/a_.dds`; the second was written aside.
        let mut session = RelocationSession::new();
        session.register(UsageRecord::new("/m/x.mat", "/t/a_.dds", "/t/a_~1.dds", "/t/a_~1.dds"));
        session.register(UsageRecord::new("/m/y.mat", "/t/a_.dds", "/t/a_.dds", "/t/a_.dds"));
        let plan = session.finalize();
        assert_eq!(destinations(&plan.relocations[0]), ["/t/a__1.dds"]);
        assert_eq!(destinations(&plan.relocations[1]), ["/t/a_.dds"]);
        assert!(!plan.relocations[1].usages[0].is_renamed());
    }

    #[test]
    fn test_reserved_name_is_bumped() {
        let mut session = RelocationSession::new();
        session.reserve("/t/X_1.dds");
        session.register(usage("/a.mat", "/t/x.dds"));
        session.register(usage("/b.mat", "/t/x.dds"));
        let plan = session.finalize();
        assert_eq!(destinations(&plan.relocations[0]), ["/t/x_2.dds", "/t/x_3.dds"]);
    }

    #[test]
    fn test_reference_keeps_written_form() {
        let final_usage = |written: &str| FinalUsage {
            usage: UsageRecord::new("/t/x.mat", "/t/b_.dds", "/t/b_.dds", written),
            destination: "/t/b__2.dds".to_string(),
        };
        assert_eq!(final_usage("/t/b_.dds").reference(), "/t/b__2.dds");
        assert_eq!(final_usage("b_.dds").reference(), "b__2.dds");
        assert_eq!(final_usage("../t/b_.dds").reference(), "../t/b__2.dds");
    }

    #[test]
    fn test_finalize_twice_is_noop() {
        let mut session = RelocationSession::new();
        session.register(usage("/a.mat", "/t/x.tobj"));
        session.register(usage("/b.mat", "/t/x.tobj"));
        let first = session.finalize();
        assert_eq!(first.relocations.len(), 1);
        assert_eq!(session.finalize(), FinalPlan::default());
    }

    #[test]
    fn test_execute_copies_patches_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("t")).unwrap();
        fs::write(root.join("t/x.dds"), b"pixels").unwrap();
        fs::write(root.join("a.mat"), b"texture : \"/t/x.dds\"\n").unwrap();
        fs::write(root.join("b.mat"), b"texture : \"/t/x.dds\"\n").unwrap();

        let mut session = RelocationSession::new();
        session.register(usage("/a.mat", "/t/x.dds"));
        session.register(usage("/b.mat", "/t/x.dds"));
        let plan = session.finalize();
        let report = execute(&plan, root, false);

        assert_eq!(report.renamed, 2);
        assert_eq!(report.patched, 2);
        assert_eq!(report.copied, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 0);
        assert!(!root.join("t/x.dds").exists());
        assert_eq!(fs::read(root.join("t/x_1.dds")).unwrap(), b"pixels");
        assert_eq!(fs::read(root.join("t/x_2.dds")).unwrap(), b"pixels");
        assert_eq!(
            fs::read_to_string(root.join("b.mat")).unwrap(),
            "texture : \"/t/x_2.dds\"\n"
        );
    }

    #[test]
    fn test_every_reference_site_is_patched() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("b.dds"), b"pixels").unwrap();
        fs::write(root.join("x.mat"), b"texture : \"/b.dds\"\n").unwrap();
        fs::write(root.join("y.mat"), b"texture : \"/b.dds\"\ndetail : \"b.dds\"\n").unwrap();

        let mut session = RelocationSession::new();
        session.register(usage("/x.mat", "/b.dds"));
        session.register(usage("/y.mat", "/b.dds"));
        session.register(UsageRecord::new("/y.mat", "/b.dds", "/b.dds", "b.dds"));
        let report = execute(&session.finalize(), root, false);

        assert_eq!(report.patched, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(
            fs::read_to_string(root.join("y.mat")).unwrap(),
            "texture : \"/b_2.dds\"\ndetail : \"b_3.dds\"\n"
        );
        for name in ["b_1.dds", "b_2.dds", "b_3.dds"] {
            assert_eq!(fs::read(root.join(name)).unwrap(), b"pixels");
        }
        assert!(!root.join("b.dds").exists());
    }

    #[test]
    fn test_relocated_referrer_is_patched_first() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("m")).unwrap();
        fs::write(root.join("t.dds"), b"pixels").unwrap();
        fs::write(root.join("m/x.mat"), b"texture : \"/t.dds\"\n").unwrap();
        fs::write(root.join("m/y.mat"), b"texture : \"/t.dds\"\n").unwrap();
        fs::write(root.join("a.sii"), b"m: \"/m/x.mat\"\n").unwrap();
        fs::write(root.join("b.sii"), b"m: \"/m/x.mat\"\n").unwrap();

        // The material plan is registered first and moves its source away.
        let mut session = RelocationSession::new();
        session.register(usage("/a.sii", "/m/x.mat"));
        session.register(usage("/b.sii", "/m/x.mat"));
        session.register(usage("/m/x.mat", "/t.dds"));
        session.register(usage("/m/y.mat", "/t.dds"));
        let report = execute(&session.finalize(), root, false);

        assert_eq!(report.failed, 0);
        assert_eq!(report.patched, 4);
        assert!(!root.join("m/x.mat").exists());
        for copy in ["m/x_1.mat", "m/x_2.mat"] {
            let text = fs::read_to_string(root.join(copy)).unwrap();
            assert_eq!(text, "texture : \"/t_1.dds\"\n");
        }
        assert_eq!(fs::read(root.join("t_1.dds")).unwrap(), b"pixels");
        assert_eq!(fs::read_to_string(root.join("b.sii")).unwrap(), "m: \"/m/x_2.mat\"\n");
    }

    #[test]
    fn test_failed_copy_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.mat"), b"\"/gone.dds\"").unwrap();
        fs::write(root.join("b.mat"), b"\"/gone.dds\"").unwrap();

        let mut session = RelocationSession::new();
        session.register(usage("/a.mat", "/gone.dds"));
        session.register(usage("/b.mat", "/gone.dds"));
        let report = execute(&session.finalize(), root, false);
        assert_eq!(report.copied, 0);
        assert_eq!(report.failed, 2);
        assert_eq!(report.removed, 0);
    }

    #[test]
    fn test_dry_run_only_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RelocationSession::new();
        session.register(usage("/a.mat", "/x.dds"));
        session.register(usage("/b.mat", "/x.dds"));
        let report = execute(&session.finalize(), dir.path(), true);
        assert_eq!(report.renamed, 2);
        assert_eq!(report.patched + report.copied + report.failed, 0);
    }

    #[test]
    fn test_prune_stops_at_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("a/b/f"), b"").unwrap();
        fs::remove_file(root.join("a/b/f")).unwrap();
        prune_empty_parents(root, &root.join("a/b/f"));
        assert!(!root.join("a").exists());
        assert!(root.exists());
    }
}
