//! CLI tool for recovering and extracting HashFS archives.

mod commands;
mod exit_codes;
mod output;
mod progress;

use clap::{ArgGroup, Parser};
use hashfs::CancellationToken;
use std::path::PathBuf;

/// Recover paths in HashFS archives and extract them
#[derive(Parser, Debug)]
#[command(name = "hashfs")]
#[command(author, version, about = "Recover paths in HashFS archives and extract them", long_about = None)]
#[command(group(ArgGroup::new("mode").multiple(false)))]
pub struct Cli {
    /// Archive files, or directories to search for .scs archives
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long, default_value = ".")]
    output: PathBuf,

    /// Only extract paths starting with these prefixes (disables the unknown-file dump)
    #[arg(short = 'p', long = "partial", value_delimiter = ',')]
    filter: Vec<String>,

    /// Extra start paths for discovery
    #[arg(short = 'a', long = "additional", value_delimiter = ',')]
    additional: Vec<String>,

    /// Do not start discovery from the built-in well-known paths
    #[arg(long)]
    no_well_known: bool,

    /// Hash salt to use instead of the one in the header
    #[arg(long)]
    salt: Option<u16>,

    /// Read the version 1 entry table from the end of the file
    #[arg(long)]
    table_at_end: bool,

    /// Treat every entry as real, disabling alias and overlap detection
    #[arg(long)]
    no_junk_filter: bool,

    /// Number of discovery threads (0 = auto)
    #[arg(short = 't', long, default_value = "0", env = "HASHFS_THREADS")]
    threads: usize,

    /// Discover on the calling thread only
    #[arg(short = 'S', long)]
    single_thread: bool,

    /// Number of pooled archive readers (default: thread count)
    #[arg(long)]
    pool_size: Option<usize>,

    /// Report what would be written without touching the filesystem
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Replace files that already exist
    #[arg(short = 'f', long)]
    overwrite: bool,

    /// Do not dump unrecovered entries to _unknown
    #[arg(long)]
    no_dump: bool,

    /// Do not write decoy files to _decoy
    #[arg(long)]
    no_decoys: bool,

    /// Extract each archive into its own subdirectory
    #[arg(long)]
    separate: bool,

    /// Print the root directory listing and exit
    #[arg(long, group = "mode")]
    list: bool,

    /// Print every discovered path and exit
    #[arg(long, group = "mode")]
    list_paths: bool,

    /// Print the contents of every listed directory and exit
    #[arg(long, group = "mode")]
    list_all: bool,

    /// Run discovery only and print its timings
    #[arg(long, group = "mode")]
    benchmark: bool,

    /// Append a timing breakdown to the summary
    #[arg(long)]
    times: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Suppress progress output
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let handler = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if handler.is_cancelled() {
            std::process::exit(exit_codes::USER_INTERRUPT);
        }
        eprintln!("\nInterrupted, finishing relocation (press Ctrl+C again to abort)");
        handler.cancel();
    }) {
        eprintln!("warning: cannot install Ctrl+C handler: {e}");
    }

    let exit_code = commands::run(&cli, &cancel);
    std::process::exit(exit_code.code());
}
