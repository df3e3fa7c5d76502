//! Progress bar implementation for CLI operations.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use hashfs::progress::{Phase, ProgressReporter};

const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix:>9} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {prefix:>9} [{elapsed_precise}] {pos} items {wide_msg}";

/// One progress bar that is reused for every phase of a run.
pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    /// Creates a new progress display
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new_spinner()
        };
        Self { bar }
    }

    /// Sets the message shown next to a spinner
    pub fn set_message(&self, msg: impl Into<String>) {
        self.bar.set_message(msg.into());
    }

    /// Clears the display
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Leaves a final message in place of the bar
    pub fn abandon_with_message(&self, msg: impl Into<String>) {
        self.bar.abandon_with_message(msg.into());
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

impl ProgressReporter for CliProgress {
    fn on_phase(&self, phase: Phase, total: Option<u64>) {
        self.bar.reset();
        self.bar.set_prefix(phase.label());
        match total {
            Some(total) => {
                self.bar.set_style(style(BAR_TEMPLATE));
                self.bar.set_length(total);
                self.bar.disable_steady_tick();
            }
            None => {
                self.bar.set_style(style(SPINNER_TEMPLATE));
                self.bar.enable_steady_tick(Duration::from_millis(100));
            }
        }
    }

    fn on_item(&self, path: &str) {
        self.bar.inc(1);
        // Only the spinner template shows the message.
        self.bar.set_message(path.to_string());
    }

    fn on_phase_complete(&self, _phase: Phase) {
        self.bar.disable_steady_tick();
    }

    fn on_warning(&self, message: &str) {
        self.bar.println(format!("warning: {message}"));
    }
}
