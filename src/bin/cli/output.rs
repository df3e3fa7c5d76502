//! Output formatting for CLI operations.

use serde_json::json;
use std::time::Duration;
use hashfs::{Discovery, ExtractSummary};

/// Timings of one run, summed over all archives.
#[derive(Debug, Clone, Default)]
pub struct RunTimes {
    pub open: Duration,
    pub search: Duration,
    pub decompression: Duration,
    pub decompression_wall: Duration,
    pub parse: Duration,
    pub files_parsed: u64,
    pub unique_files: u64,
    pub bytes_inflated: u64,
    pub extract: Duration,
}

impl RunTimes {
    /// Adds the discovery counters of every archive.
    pub fn add_discoveries(&mut self, discoveries: &[Discovery]) {
        for discovery in discoveries {
            let m = &discovery.metrics;
            self.search += m.elapsed;
            self.decompression += m.decompression_time;
            self.decompression_wall = self.decompression_wall.max(m.decompression_wall_time);
            self.parse += m.parse_time;
            self.files_parsed += m.files_parsed;
            self.unique_files += m.unique_files;
            self.bytes_inflated += m.bytes_inflated;
        }
    }
}

/// A list of paths belonging to one archive.
pub struct Listing<'a> {
    pub archive: &'a str,
    pub paths: Vec<String>,
}

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats path listings
    fn format_listings(&self, listings: &[Listing<'_>]) -> String;

    /// Formats the end-of-run summary
    fn format_summary(&self, summary: &ExtractSummary, times: Option<&RunTimes>) -> String;

    /// Formats discovery-only benchmark results
    fn format_benchmark(&self, times: &RunTimes) -> String;
}

fn ms(duration: Duration) -> u128 {
    duration.as_millis()
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_listings(&self, listings: &[Listing<'_>]) -> String {
        let mut output = String::new();
        let many = listings.len() > 1;
        for listing in listings {
            if many {
                output.push_str(&format!("{}:\n", listing.archive));
            }
            for path in &listing.paths {
                if many {
                    output.push_str("  ");
                }
                output.push_str(path);
                output.push('\n');
            }
        }
        output
    }

    fn format_summary(&self, summary: &ExtractSummary, times: Option<&RunTimes>) -> String {
        let mut output = summary.to_string();
        if let Some(t) = times {
            output.push_str(&format!(
                " | open={}ms, search={}ms (decomp={}ms, decomp_wall={}ms, parse={}ms, files={}, unique={}, bytes={}), extract={}ms",
                ms(t.open),
                ms(t.search),
                ms(t.decompression),
                ms(t.decompression_wall),
                ms(t.parse),
                t.files_parsed,
                t.unique_files,
                t.bytes_inflated,
                ms(t.extract)
            ));
        }
        output.push('\n');

        if summary.relocation.renamed > 0 {
            output.push_str(&format!(
                "Relocated {} references ({} patched, {} copied, {} removed)\n",
                summary.relocation.renamed,
                summary.relocation.patched,
                summary.relocation.copied,
                summary.relocation.removed
            ));
        }
        if !summary.failures.is_empty() {
            output.push_str("\nFailures:\n");
            for (path, error) in &summary.failures {
                output.push_str(&format!("  {}: {}\n", path, error));
            }
        }
        output
    }

    fn format_benchmark(&self, t: &RunTimes) -> String {
        format!(
            "open={}ms, search={}ms (decomp={}ms, decomp_wall={}ms, parse={}ms, files={}, unique={}, bytes={})\n",
            ms(t.open),
            ms(t.search),
            ms(t.decompression),
            ms(t.decompression_wall),
            ms(t.parse),
            t.files_parsed,
            t.unique_files,
            t.bytes_inflated
        )
    }
}

/// JSON output formatter
pub struct JsonFormatter;

fn times_json(t: &RunTimes) -> serde_json::Value {
    json!({
        "open_ms": ms(t.open) as u64,
        "search_ms": ms(t.search) as u64,
        "decompression_ms": ms(t.decompression) as u64,
        "decompression_wall_ms": ms(t.decompression_wall) as u64,
        "parse_ms": ms(t.parse) as u64,
        "files_parsed": t.files_parsed,
        "unique_files": t.unique_files,
        "bytes_inflated": t.bytes_inflated,
        "extract_ms": ms(t.extract) as u64,
    })
}

impl OutputFormatter for JsonFormatter {
    fn format_listings(&self, listings: &[Listing<'_>]) -> String {
        let items: Vec<_> = listings
            .iter()
            .map(|l| json!({ "archive": l.archive, "paths": l.paths }))
            .collect();
        serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_summary(&self, summary: &ExtractSummary, times: Option<&RunTimes>) -> String {
        let obj = json!({
            "success": summary.is_ok(),
            "extracted": summary.extracted,
            "renamed": summary.renamed,
            "modified": summary.modified,
            "dumped": summary.dumped,
            "skipped": summary.skipped,
            "junk": summary.junk,
            "failed": summary.failed,
            "bytes_written": summary.bytes_written,
            "relocation": {
                "renamed": summary.relocation.renamed,
                "patched": summary.relocation.patched,
                "copied": summary.relocation.copied,
                "removed": summary.relocation.removed,
                "failed": summary.relocation.failed,
            },
            "failures": summary.failures.iter().map(|(p, e)| json!({"path": p, "error": e})).collect::<Vec<_>>(),
            "times": times.map(times_json),
        });
        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_benchmark(&self, times: &RunTimes) -> String {
        serde_json::to_string_pretty(&times_json(times)).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Creates the appropriate formatter
pub fn create_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(HumanFormatter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_with_times() {
        let summary = ExtractSummary {
            extracted: 3,
            renamed: 1,
            ..ExtractSummary::default()
        };
        let times = RunTimes {
            open: Duration::from_millis(5),
            search: Duration::from_millis(40),
            files_parsed: 2,
            unique_files: 3,
            extract: Duration::from_millis(7),
            ..RunTimes::default()
        };
        let line = HumanFormatter.format_summary(&summary, Some(&times));
        assert_eq!(
            line,
            "3 extracted (1 renamed, 0 modified, 0 dumped), 0 skipped, 0 junk, 0 failed \
             | open=5ms, search=40ms (decomp=0ms, decomp_wall=0ms, parse=0ms, files=2, unique=3, bytes=0), extract=7ms\n"
        );
    }

    #[test]
    fn test_json_summary() {
        let summary = ExtractSummary {
            failed: 1,
            failures: vec![("/a".into(), "boom".into())],
            ..ExtractSummary::default()
        };
        let text = JsonFormatter.format_summary(&summary, None);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["failures"][0]["path"], "/a");
        assert!(value["times"].is_null());
    }
}
