//! Junk entry classification.
//!
//! Protected archives pad their entry tables with entries that do not
//! correspond to real files. They are classified once when an archive is
//! opened:
//!
//! - **Junk** entries are structurally excluded from unrecovered-file
//!   reporting. An entry whose payload lies outside the file is junk. An
//!   entry whose payload is byte-for-byte the same range as an earlier entry
//!   in table order is an *alias*; any path that resolves to an alias is a
//!   decoy and is quarantined instead of trusted.
//! - **Maybe-junk** entries are suspicious but not conclusive: their payload
//!   partially overlaps another entry's payload. They are only suppressed
//!   from the unknown-file dump.
//!
//! Both heuristics can be switched off through [`JunkOptions`].

use std::collections::HashMap;

use crate::read::Entry;

/// Why an entry was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JunkReason {
    /// The payload range ends past the end of the archive file.
    OutOfBounds,
    /// Same payload range and sizes as the earlier entry `of`.
    Alias {
        /// Hash of the entry that owns the payload.
        of: u64,
    },
    /// Payload range partially overlaps the entry `with`.
    Overlap {
        /// Hash of one overlapping entry.
        with: u64,
    },
}

/// Toggles for the classification heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JunkOptions {
    /// Classify payload aliases as junk (and their paths as decoys).
    pub aliases: bool,
    /// Classify partially overlapping payloads as maybe-junk.
    pub overlaps: bool,
}

impl Default for JunkOptions {
    fn default() -> Self {
        Self {
            aliases: true,
            overlaps: true,
        }
    }
}

impl JunkOptions {
    /// Disables every heuristic except the out-of-bounds check.
    pub fn none() -> Self {
        Self {
            aliases: false,
            overlaps: false,
        }
    }
}

/// Junk and maybe-junk entries of one archive.
#[derive(Debug, Clone, Default)]
pub struct JunkClassification {
    junk: HashMap<u64, JunkReason>,
    maybe_junk: HashMap<u64, JunkReason>,
}

impl JunkClassification {
    /// Classifies `entries`, which must be given in table order.
    pub fn classify<'a>(
        entries: impl IntoIterator<Item = &'a Entry>,
        file_len: u64,
        options: &JunkOptions,
    ) -> Self {
        let mut classification = Self::default();
        let mut payload_owner: HashMap<(u64, u32, u32), u64> = HashMap::new();
        let mut ranges = Vec::new();

        for entry in entries.into_iter().filter(|e| !e.is_directory) {
            let range = entry.stored_range();
            if range.end > file_len {
                classification
                    .junk
                    .insert(entry.hash, JunkReason::OutOfBounds);
                continue;
            }

            if options.aliases {
                let key = (entry.offset, entry.compressed_size, entry.size);
                match payload_owner.get(&key) {
                    Some(&owner) if owner != entry.hash => {
                        classification
                            .junk
                            .insert(entry.hash, JunkReason::Alias { of: owner });
                        continue;
                    }
                    Some(_) => {}
                    None => {
                        payload_owner.insert(key, entry.hash);
                    }
                }
            }

            if !range.is_empty() {
                ranges.push((range, entry.hash));
            }
        }

        if options.overlaps {
            classification.mark_overlaps(ranges);
        }

        if !classification.junk.is_empty() || !classification.maybe_junk.is_empty() {
            log::debug!(
                "classified {} junk and {} maybe-junk entries",
                classification.junk.len(),
                classification.maybe_junk.len()
            );
        }
        classification
    }

    fn mark_overlaps(&mut self, mut ranges: Vec<(std::ops::Range<u64>, u64)>) {
        ranges.sort_by_key(|(range, hash)| (range.start, range.end, *hash));

        let mut reach: Option<(u64, u64)> = None;
        for (range, hash) in ranges {
            if let Some((end, owner)) = reach {
                if range.start < end {
                    self.maybe_junk
                        .entry(hash)
                        .or_insert(JunkReason::Overlap { with: owner });
                    self.maybe_junk
                        .entry(owner)
                        .or_insert(JunkReason::Overlap { with: hash });
                }
            }
            match reach {
                Some((end, _)) if end >= range.end => {}
                _ => reach = Some((range.end, hash)),
            }
        }
    }

    /// Returns `true` if `hash` is junk.
    pub fn is_junk(&self, hash: u64) -> bool {
        self.junk.contains_key(&hash)
    }

    /// Returns `true` if `hash` is maybe-junk.
    pub fn is_maybe_junk(&self, hash: u64) -> bool {
        self.maybe_junk.contains_key(&hash)
    }

    /// Returns `true` if paths resolving to `hash` are decoys.
    pub fn is_decoy(&self, hash: u64) -> bool {
        matches!(self.junk.get(&hash), Some(JunkReason::Alias { .. }))
    }

    /// Returns the junk reason for `hash`.
    pub fn reason(&self, hash: u64) -> Option<JunkReason> {
        self.junk
            .get(&hash)
            .or_else(|| self.maybe_junk.get(&hash))
            .copied()
    }

    /// Number of junk entries.
    pub fn junk_count(&self) -> usize {
        self.junk.len()
    }

    /// Number of maybe-junk entries.
    pub fn maybe_junk_count(&self) -> usize {
        self.maybe_junk.len()
    }

    /// Iterates over junk entries.
    pub fn junk(&self) -> impl Iterator<Item = (u64, JunkReason)> + '_ {
        self.junk.iter().map(|(h, r)| (*h, *r))
    }
}
