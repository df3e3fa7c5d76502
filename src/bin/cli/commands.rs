//! Command implementation for the CLI tool.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use walkdir::WalkDir;

use hashfs::{
    Archive, ArchiveSet, ArchiveSource, CancellationToken, DiscoveryOptions, ExtractOptions,
    ExtractSummary, JunkOptions, OpenOptions, OverwritePolicy, Threads,
};

use crate::Cli;
use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::output::{Listing, OutputFormatter, RunTimes, create_formatter};
use crate::progress::CliProgress;

/// Extension of archives picked up from input directories.
const ARCHIVE_EXTENSION: &str = "scs";

/// Runs the command line and returns the process exit code.
pub fn run(cli: &Cli, cancel: &CancellationToken) -> ExitCode {
    let formatter = create_formatter(cli.json);

    let inputs = expand_inputs(&cli.inputs);
    if inputs.is_empty() {
        eprintln!("Error: no archives found");
        return ExitCode::BadArgs;
    }

    let open_start = Instant::now();
    let (mut set, failures) = ArchiveSet::open_paths(&inputs, &open_options(cli));
    let open = open_start.elapsed();
    for (path, e) in &failures {
        eprintln!("Error: {}: {}", path.display(), e);
    }
    if set.is_empty() {
        return failures
            .first()
            .map_or(ExitCode::BadArchive, |(_, e)| error_to_exit_code(e));
    }
    let partial = if failures.is_empty() {
        ExitCode::Success
    } else {
        ExitCode::Warning
    };

    if cli.list || cli.list_all {
        let listings: Vec<Listing<'_>> = set
            .members_mut()
            .iter_mut()
            .map(|member| Listing {
                archive: &member.name,
                paths: if cli.list {
                    root_listing(&mut member.archive)
                } else {
                    all_listings(&mut member.archive)
                },
            })
            .collect();
        print!("{}", formatter.format_listings(&listings));
        return partial;
    }

    let progress = Arc::new(CliProgress::new(cli.quiet || cli.json));

    let discoveries = match set.discover_all(&discovery_options(cli, cancel).progress(progress.clone())) {
        Ok(d) => d,
        Err(e) => {
            progress.abandon_with_message("Discovery failed");
            eprintln!("Error: {}", e);
            return error_to_exit_code(&e);
        }
    };
    progress.finish();

    let mut times = RunTimes {
        open,
        ..RunTimes::default()
    };
    times.add_discoveries(&discoveries);

    if cli.list_paths {
        let listings: Vec<Listing<'_>> = set
            .members()
            .iter()
            .zip(&discoveries)
            .map(|(member, discovery)| Listing {
                archive: &member.name,
                paths: discovery.found.iter().cloned().collect(),
            })
            .collect();
        print!("{}", formatter.format_listings(&listings));
        return partial;
    }

    if cli.benchmark {
        print!("{}", formatter.format_benchmark(&times));
        return partial;
    }

    extract(cli, cancel, &mut set, &discoveries, times, &*formatter, &progress).max_severity(partial)
}

fn extract<S: ArchiveSource>(
    cli: &Cli,
    cancel: &CancellationToken,
    set: &mut ArchiveSet<S>,
    discoveries: &[hashfs::Discovery],
    mut times: RunTimes,
    formatter: &dyn OutputFormatter,
    progress: &Arc<CliProgress>,
) -> ExitCode {
    if !cli.dry_run {
        if let Err(e) = std::fs::create_dir_all(&cli.output) {
            eprintln!("Error creating output directory: {}", e);
            return ExitCode::IoError;
        }
    }

    let options = extract_options(cli, cancel).progress(progress.clone());
    let extract_start = Instant::now();
    let result = set.extract_all(discoveries, &cli.output, &options, cli.separate);
    times.extract = extract_start.elapsed();

    match result {
        Ok(summaries) => {
            progress.finish();
            let mut summary = ExtractSummary::default();
            for part in summaries {
                summary.merge(part);
            }
            let times = cli.times.then_some(&times);
            print!("{}", formatter.format_summary(&summary, times));
            if summary.is_ok() {
                ExitCode::Success
            } else {
                ExitCode::Warning
            }
        }
        Err(e) => {
            progress.abandon_with_message("Extraction failed");
            eprintln!("Error: {}", e);
            error_to_exit_code(&e)
        }
    }
}

impl ExitCode {
    /// The more severe of two outcomes of the same run.
    fn max_severity(self, other: ExitCode) -> ExitCode {
        if self == ExitCode::Success { other } else { self }
    }
}

/// Replaces directories by the archives found beneath them.
fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut archives = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            archives.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(input)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_archive(e.path()))
            .map(|e| e.into_path())
            .collect();
        found.sort();
        archives.extend(found);
    }
    archives
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

fn open_options(cli: &Cli) -> OpenOptions {
    let mut options = OpenOptions::new().force_table_at_end(cli.table_at_end);
    if let Some(salt) = cli.salt {
        options = options.salt(salt);
    }
    if cli.no_junk_filter {
        options = options.junk(JunkOptions::none());
    }
    options
}

fn discovery_options(cli: &Cli, cancel: &CancellationToken) -> DiscoveryOptions {
    let threads = if cli.single_thread {
        Threads::Single
    } else {
        match cli.threads {
            0 => Threads::Auto,
            n => Threads::count_or_single(n),
        }
    };
    let mut options = DiscoveryOptions::new()
        .extra_seeds(cli.additional.iter().cloned())
        .well_known_seeds(!cli.no_well_known)
        .threads(threads)
        .cancel(cancel.clone());
    if let Some(size) = cli.pool_size {
        options = options.pool_size(size);
    }
    options
}

fn extract_options(cli: &Cli, cancel: &CancellationToken) -> ExtractOptions {
    let overwrite = if cli.overwrite {
        OverwritePolicy::Overwrite
    } else {
        OverwritePolicy::Skip
    };
    ExtractOptions::new()
        .filter(cli.filter.iter().cloned())
        .overwrite(overwrite)
        .dry_run(cli.dry_run)
        .dump_unknown(!cli.no_dump)
        .decoys(!cli.no_decoys)
        .cancel(cancel.clone())
}

/// Root directory names, subdirectories marked with a trailing `/`.
fn root_listing<S: ArchiveSource>(archive: &mut Archive<S>) -> Vec<String> {
    match archive.directory_listing("/", false, true) {
        Ok(listing) => listing
            .subdirectories
            .into_iter()
            .map(|dir| format!("{dir}/"))
            .chain(listing.files)
            .collect(),
        Err(e) => {
            eprintln!("warning: no root listing: {}", e);
            Vec::new()
        }
    }
}

/// Every path reachable through directory listings from the root.
fn all_listings<S: ArchiveSource>(archive: &mut Archive<S>) -> Vec<String> {
    let mut paths = BTreeSet::new();
    let mut visited = BTreeSet::new();
    let mut pending = vec!["/".to_string()];

    while let Some(dir) = pending.pop() {
        if !visited.insert(dir.clone()) {
            continue;
        }
        match archive.directory_listing(&dir, false, true) {
            Ok(listing) => {
                for sub in listing.subdirectories {
                    paths.insert(format!("{sub}/"));
                    pending.push(sub);
                }
                paths.extend(listing.files);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => log::warn!("cannot list {dir}: {e}"),
        }
    }
    paths.into_iter().collect()
}
