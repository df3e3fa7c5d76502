//! Filesystem-legal output names for archive paths.
//!
//! Archive paths may contain characters that are illegal on common
//! filesystems, or device names reserved on Windows. Sanitizing keeps the
//! `/`-separated archive shape and repairs each segment:
//!
//! - `<>:"\|?*` and control characters become `_`
//! - trailing dots and spaces are removed
//! - reserved device names (`CON`, `COM1.txt`, ...) get a `_` prefix
//! - segments that end up empty become `_`

use std::collections::{BTreeSet, HashMap, HashSet};

/// Windows device names. Reserved with any extension and in any case.
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '\\', '|', '?', '*'];

fn is_windows_reserved(name: &str) -> bool {
    let base = match name.find('.') {
        Some(pos) => &name[..pos],
        None => name,
    };
    WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| base.eq_ignore_ascii_case(reserved))
}

/// Sanitizes one path segment.
pub fn sanitize_segment(segment: &str) -> String {
    let replaced: String = segment
        .chars()
        .map(|c| {
            if c.is_control() || ILLEGAL_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_end_matches(['.', ' ']);

    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "_".to_string()
    } else if is_windows_reserved(trimmed) {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Sanitizes an absolute archive path. The result is again an absolute
/// archive-style path.
///
/// ```
/// use hashfs::extract::sanitize::sanitize_path;
///
/// assert_eq!(sanitize_path("/def/what?.sii"), "/def/what_.sii");
/// assert_eq!(sanitize_path("/ui/con.mat"), "/ui/_con.mat");
/// ```
pub fn sanitize_path(path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(sanitize_segment)
        .collect();
    format!("/{}", segments.join("/"))
}

/// Archive path relative to an output root.
pub fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Maps every path whose output name differs from it to that name.
///
/// Output names are sanitized paths, unique ignoring ASCII case. Paths that
/// need no sanitizing keep their names. In sorted path order, a sanitized
/// name that is already taken gets a `~N` suffix on its stem. The `.dds`
/// siblings that packed textures reference are named the same way.
pub fn substitutions<'a>(paths: impl IntoIterator<Item = &'a str>) -> HashMap<String, String> {
    let mut all = BTreeSet::new();
    for path in paths {
        if path.ends_with(".tobj") {
            all.insert(crate::texture::dds_path_for(path));
        }
        all.insert(path.to_string());
    }

    let mut taken: HashSet<String> = all
        .iter()
        .filter(|path| sanitize_path(path) == **path)
        .map(|path| path.to_ascii_lowercase())
        .collect();
    let mut map = HashMap::new();
    for path in all {
        let sanitized = sanitize_path(&path);
        if sanitized == path {
            continue;
        }
        let output = unique_name(&sanitized, &taken);
        if output != sanitized {
            log::debug!("{path} collides on {sanitized}, writing {output}");
        }
        taken.insert(output.to_ascii_lowercase());
        map.insert(path, output);
    }
    map
}

/// Returns `path`, or the first `stem~N.ext` variant of it that is not in
/// `taken`. `taken` holds lowercased paths.
pub fn unique_name(path: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(&path.to_ascii_lowercase()) {
        return path.to_string();
    }
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let (stem, ext) = match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => path.split_at(name_start + dot),
        _ => (path, ""),
    };
    let mut n = 1usize;
    loop {
        let candidate = format!("{stem}~{n}{ext}");
        if !taken.contains(&candidate.to_ascii_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}
