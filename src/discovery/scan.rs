//! Path reference extraction from entry contents.
//!
//! Every scanner returns absolute, normalized paths. Relative references
//! are resolved against the directory of the file they were found in.

use crate::sii;
use crate::texture::tobj::Tobj;

/// Extensions whose contents are scanned for references.
pub const PARSEABLE_EXTENSIONS: &[&str] = &["sii", "sui", "mat", "font", "soundref", "tobj", "pmd"];

/// Extensions of the model family. Finding one member makes the others
/// candidates.
pub const MODEL_FAMILY: &[&str] = &["pmd", "pmg", "pmc", "pma", "ppd"];

/// Minimum length of a printable run in binary model descriptors.
const MIN_BINARY_STRING: usize = 4;

/// Longest extension accepted when deciding whether a literal is a path.
const MAX_EXTENSION_LEN: usize = 12;

/// Returns the lowercased extension of the last path segment.
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    let dot = name.rfind('.')?;
    let ext = &name[dot + 1..];
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// Returns the last path segment.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Returns the directory part of an absolute path, `/` for top-level names.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// Returns `true` if the entry at `path` is scanned for references.
pub fn is_parseable(path: &str) -> bool {
    extension(path).is_some_and(|ext| PARSEABLE_EXTENSIONS.contains(&ext.as_str()))
}

/// Resolves `reference` against `base_dir` into a normalized absolute path.
///
/// `#` suffixes (sound event names) are dropped, `.` and empty segments are
/// removed and `..` pops a segment. Returns `None` for references that are
/// empty once normalized.
pub fn resolve(base_dir: &str, reference: &str) -> Option<String> {
    let reference = reference.split('#').next().unwrap_or_default().trim();
    if reference.is_empty() {
        return None;
    }

    let mut segments: Vec<&str> = Vec::new();
    let joined = if reference.starts_with('/') {
        None
    } else {
        Some(base_dir)
    };
    for part in joined
        .into_iter()
        .flat_map(|dir| dir.split('/'))
        .chain(reference.split('/'))
    {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(part),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(format!("/{}", segments.join("/")))
}

/// Normalizes a candidate path. The root stays `/`.
pub fn canonical(path: &str) -> String {
    resolve("/", path).unwrap_or_else(|| "/".to_string())
}

/// Returns the other members of the model family for a model path.
pub fn model_siblings(path: &str) -> Vec<String> {
    let Some(ext) = extension(path) else {
        return Vec::new();
    };
    if !MODEL_FAMILY.contains(&ext.as_str()) {
        return Vec::new();
    }
    let stem = &path[..path.len() - ext.len()];
    MODEL_FAMILY
        .iter()
        .filter(|sibling| **sibling != ext)
        .map(|sibling| format!("{stem}{sibling}"))
        .collect()
}

/// Heuristic for string literals that name a file or directory.
fn looks_like_path(literal: &str) -> bool {
    if literal.is_empty()
        || literal.len() > 512
        || literal.contains("://")
        || literal.chars().any(|c| c.is_control() || c == '"' || c == '\\')
    {
        return false;
    }
    if literal.starts_with('/') {
        return literal.len() > 1;
    }
    let name = file_name(literal.split('#').next().unwrap_or_default());
    match name.rfind('.') {
        Some(dot) if dot > 0 => {
            let ext = &name[dot + 1..];
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !name.contains(char::is_whitespace)
        }
        _ => false,
    }
}

/// Extracts references from the payload of the entry at `path`.
///
/// Content that cannot be decoded yields no references.
pub fn references(path: &str, data: &[u8]) -> Vec<String> {
    let base = parent_dir(path);
    let raw = match extension(path).as_deref() {
        Some("sii") | Some("sui") | Some("mat") | Some("soundref") => text_references(data),
        Some("font") => font_references(data),
        Some("tobj") => match Tobj::parse(data) {
            Ok(tobj) => tobj.texture_paths,
            Err(e) => {
                log::trace!("{path}: not a texture descriptor: {e}");
                Vec::new()
            }
        },
        Some("pmd") => binary_strings(data),
        _ => Vec::new(),
    };

    let mut out: Vec<String> = raw
        .iter()
        .filter_map(|reference| resolve(base, reference))
        .collect();
    out.sort();
    out.dedup();
    out
}

fn decode_text(data: &[u8]) -> Option<String> {
    let plain = match sii::decode(data) {
        Ok(plain) => plain,
        Err(e) => {
            log::trace!("undecodable text payload: {e}");
            return None;
        }
    };
    Some(String::from_utf8_lossy(&plain).into_owned())
}

/// References in SII-dialect text: string values of parsed units and
/// `@include` targets, or every quoted literal when the text does not parse.
fn text_references(data: &[u8]) -> Vec<String> {
    let Some(text) = decode_text(data) else {
        return Vec::new();
    };

    match sii::parser::parse(&text) {
        Ok(file) => {
            let mut out: Vec<String> = file.includes.clone();
            file.for_each_string(&mut |s| {
                if looks_like_path(s) {
                    out.push(s.to_string());
                }
            });
            out
        }
        Err(e) => {
            log::trace!("falling back to literal scan: {e}");
            quoted_literals(&text)
        }
    }
}

/// Every quoted literal that looks like a path, plus `@include` targets.
fn quoted_literals(text: &str) -> Vec<String> {
    let text = sii::strip_comments(sii::trim_bom(text));
    let mut out = Vec::new();

    for line in text.lines() {
        if let Some(target) = line.trim().strip_prefix("@include") {
            out.push(target.trim().trim_matches('"').to_string());
            continue;
        }
        let mut parts = line.split('"');
        parts.next();
        while let Some(literal) = parts.next() {
            if looks_like_path(literal) {
                out.push(literal.to_string());
            }
            // Skip the text between this literal and the next one.
            parts.next();
        }
    }
    out
}

/// `.font` files reference their glyph materials in `key:value` lines.
fn font_references(data: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(data);
    text.lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| line.split(|c: char| c.is_whitespace() || matches!(c, ',' | ':' | ';' | '"')))
        .filter(|token| token.contains('/') && looks_like_path(token))
        .map(str::to_string)
        .collect()
}

/// Printable ASCII runs starting with `/`, as stored in model descriptors.
fn binary_strings(data: &[u8]) -> Vec<String> {
    data.split(|b| !(0x20..0x7f).contains(b))
        .filter(|run| run.len() >= MIN_BINARY_STRING)
        .filter_map(|run| {
            let start = run.iter().position(|&b| b == b'/')?;
            let s = std::str::from_utf8(&run[start..]).ok()?;
            looks_like_path(s).then(|| s.to_string())
        })
        .collect()
}
