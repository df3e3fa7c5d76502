//! Rewriting path references inside extracted files.
//!
//! When a file is written under a sanitized name, files that reference it
//! must be rewritten to match. Text formats (`.sii`, `.sui`, `.mat`) have
//! their quoted literals replaced; texture descriptors get their texture
//! path fields rewritten and are re-serialized.

use std::collections::HashMap;

use crate::Result;
use crate::discovery::scan;
use crate::sii;
use crate::texture::tobj::Tobj;

/// Original archive path to replacement path.
pub type SubstitutionMap = HashMap<String, String>;

/// Extensions (without dot) whose content is rewritten.
pub const SUBSTITUTED_EXTENSIONS: &[&str] = &["sii", "sui", "mat", "tobj"];

/// Returns `true` if files with `extension` can contain rewritable
/// references.
pub fn is_substituted(extension: &str) -> bool {
    SUBSTITUTED_EXTENSIONS.contains(&extension)
}

/// One rewritten reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Substitution<'a> {
    /// Archive path the reference resolved to.
    pub original: &'a str,
    /// Output path of the referenced file.
    pub output: &'a str,
    /// Text written in place of the reference.
    pub written: &'a str,
}

/// Looks references of one file up in the map.
struct Resolver<'a> {
    map: &'a SubstitutionMap,
    /// Archive directory of the referencing file.
    base_dir: &'a str,
    /// Output directory of the referencing file.
    out_dir: &'a str,
}

impl<'a> Resolver<'a> {
    fn new(map: &'a SubstitutionMap, referrer: &'a str) -> Self {
        let output = map.get(referrer).map_or(referrer, String::as_str);
        Self {
            map,
            base_dir: scan::parent_dir(referrer),
            out_dir: scan::parent_dir(output),
        }
    }

    /// Returns the resolved original path, its output path and the text to
    /// write. Relative references stay relative.
    fn lookup(&self, reference: &str) -> Option<(String, &'a str, String)> {
        if reference.starts_with('/') {
            let (original, output) = self.map.get_key_value(reference)?;
            return Some((original.clone(), output.as_str(), output.clone()));
        }
        let original = scan::resolve(self.base_dir, reference)?;
        let output = self.map.get(&original)?.as_str();
        let written = relative_to(self.out_dir, output);
        Some((original, output, written))
    }
}

/// Path of `target` relative to the directory `from_dir`, both absolute.
pub fn relative_to(from_dir: &str, target: &str) -> String {
    let from: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    let mut parts = vec![".."; from.len() - common];
    parts.extend(&to[common..]);
    parts.join("/")
}

/// Replaces references in `buffer`, found in the file at archive path
/// `referrer`, according to `map`.
///
/// Absolute references are looked up as written. Relative references are
/// resolved against the directory of `referrer` and rewritten relative to
/// its output directory. Returns whether anything was replaced and the
/// resulting buffer. SII buffers are always returned decoded. Other
/// extensions are returned unchanged.
///
/// # Errors
///
/// Returns [`Error::Decode`](crate::Error::Decode) if a SII buffer cannot be
/// decoded or a texture descriptor cannot be parsed.
pub fn substitute(
    buffer: &[u8],
    extension: &str,
    referrer: &str,
    map: &SubstitutionMap,
) -> Result<(bool, Vec<u8>)> {
    substitute_with(buffer, extension, referrer, map, |_| {})
}

/// Like [`substitute`], calling `on_replace` for every replaced reference.
pub fn substitute_with<F>(
    buffer: &[u8],
    extension: &str,
    referrer: &str,
    map: &SubstitutionMap,
    mut on_replace: F,
) -> Result<(bool, Vec<u8>)>
where
    F: FnMut(&Substitution<'_>),
{
    let resolver = Resolver::new(map, referrer);
    match extension {
        "sii" => {
            let plain = sii::decode(buffer)?;
            Ok(replace_literals(&plain, &resolver, &mut on_replace))
        }
        "sui" | "mat" => Ok(replace_literals(buffer, &resolver, &mut on_replace)),
        "tobj" => {
            if map.is_empty() {
                return Ok((false, buffer.to_vec()));
            }
            let mut tobj = Tobj::parse(buffer)?;
            let changed = tobj.rewrite_paths(|path| {
                let (original, output, written) = resolver.lookup(path)?;
                on_replace(&Substitution {
                    original: &original,
                    output,
                    written: &written,
                });
                Some(written)
            });
            Ok(if changed {
                (true, tobj.to_bytes())
            } else {
                (false, buffer.to_vec())
            })
        }
        _ => Ok((false, buffer.to_vec())),
    }
}

/// Splits a quoted literal into its path part and a `#` suffix.
fn split_literal(piece: &str) -> (&str, &str) {
    match piece.find('#') {
        Some(hash) => piece.split_at(hash),
        None => (piece, ""),
    }
}

/// Replaces quoted literals whose path part (before any `#`) resolves to a
/// key of the map.
fn replace_literals<F>(buffer: &[u8], resolver: &Resolver<'_>, on_replace: &mut F) -> (bool, Vec<u8>)
where
    F: FnMut(&Substitution<'_>),
{
    if resolver.map.is_empty() {
        return (false, buffer.to_vec());
    }
    let text = String::from_utf8_lossy(buffer);
    let mut out = String::with_capacity(text.len());
    let mut modified = false;

    // Odd-numbered pieces are inside quotes.
    for (i, piece) in text.split('"').enumerate() {
        if i > 0 {
            out.push('"');
        }
        if i % 2 == 1 {
            let (path, suffix) = split_literal(piece);
            if let Some((original, output, written)) = resolver.lookup(path) {
                on_replace(&Substitution {
                    original: &original,
                    output,
                    written: &written,
                });
                out.push_str(&written);
                out.push_str(suffix);
                modified = true;
                continue;
            }
        }
        out.push_str(piece);
    }

    if modified {
        (true, out.into_bytes())
    } else {
        (false, buffer.to_vec())
    }
}

/// Replaces the first quoted literal whose path part is exactly `from`.
///
/// Returns `None` if no such literal occurs.
pub fn replace_first(buffer: &[u8], from: &str, to: &str) -> Option<Vec<u8>> {
    if from.is_empty() {
        return None;
    }
    let text = String::from_utf8_lossy(buffer);
    let mut out = String::with_capacity(text.len() + to.len());
    let mut done = false;
    for (i, piece) in text.split('"').enumerate() {
        if i > 0 {
            out.push('"');
        }
        if !done && i % 2 == 1 {
            let (path, suffix) = split_literal(piece);
            if path == from {
                out.push_str(to);
                out.push_str(suffix);
                done = true;
                continue;
            }
        }
        out.push_str(piece);
    }
    done.then(|| out.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> SubstitutionMap {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_text_literals() {
        let m = map(&[("/a/b?.tobj", "/a/b_.tobj")]);
        let text = b"material : \"eut2.dif\" {\n texture : \"/a/b?.tobj\"\n other : \"/a/b?.tobj2\"\n}\n";
        let (modified, out) = substitute(text, "mat", "/a/x.mat", &m).unwrap();
        assert!(modified);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "material : \"eut2.dif\" {\n texture : \"/a/b_.tobj\"\n other : \"/a/b?.tobj2\"\n}\n"
        );
    }

    #[test]
    fn test_hash_suffix_kept() {
        let m = map(&[("/s/x:y.bank", "/s/x_y.bank")]);
        let (modified, out) = substitute(b"source: \"/s/x:y.bank#ev\"", "sui", "/s/a.sui", &m).unwrap();
        assert!(modified);
        assert_eq!(out, b"source: \"/s/x_y.bank#ev\"");
    }

    #[test]
    fn test_relative_references() {
        let m = map(&[("/t/b?.dds", "/t/b_.dds"), ("/t/sub?/c.dds", "/t/sub_/c.dds")]);
        let text = b"texture : \"b?.dds\"\n detail : \"./sub?/c.dds\"\n up : \"../t/b?.dds\"\n";
        let mut seen = Vec::new();
        let (modified, out) = substitute_with(text, "mat", "/t/x.mat", &m, |s| {
            seen.push((s.original.to_string(), s.output.to_string(), s.written.to_string()));
        })
        .unwrap();
        assert!(modified);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "texture : \"b_.dds\"\n detail : \"sub_/c.dds\"\n up : \"b_.dds\"\n"
        );
        assert_eq!(seen[0], ("/t/b?.dds".into(), "/t/b_.dds".into(), "b_.dds".into()));
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_relative_from_renamed_directory() {
        // The referencing file itself moves to `/m_/`.
        let m = map(&[("/m?/x.mat", "/m_/x.mat"), ("/t/b?.dds", "/t/b_.dds")]);
        let (_, out) = substitute(b"texture : \"../t/b?.dds\"", "mat", "/m?/x.mat", &m).unwrap();
        assert_eq!(out, b"texture : \"../t/b_.dds\"");
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(relative_to("/t", "/t/b.dds"), "b.dds");
        assert_eq!(relative_to("/m/x", "/t/b.dds"), "../../t/b.dds");
        assert_eq!(relative_to("/", "/t/b.dds"), "t/b.dds");
    }

    #[test]
    fn test_sii_is_decoded() {
        let plain = b"SiiNunit\n{\nu : .a\n{\n p: \"/x/con.pmd\"\n}\n}\n";
        let m = map(&[("/x/con.pmd", "/x/_con.pmd")]);
        let (modified, out) = substitute(&sii::obfuscate(plain, 9), "sii", "/def/a.sii", &m).unwrap();
        assert!(modified);
        assert!(String::from_utf8(out).unwrap().contains("\"/x/_con.pmd\""));

        let (modified, out) =
            substitute(&sii::obfuscate(plain, 9), "sii", "/def/a.sii", &SubstitutionMap::new()).unwrap();
        assert!(!modified);
        assert_eq!(out, plain);
    }

    #[test]
    fn test_tobj_rewrite() {
        let tobj = Tobj {
            texture_paths: vec!["/t/a*.dds".into(), "c?.dds".into()],
            ..Tobj::default()
        };
        let m = map(&[("/t/a*.dds", "/t/a_.dds"), ("/t/c?.dds", "/t/c_.dds")]);
        let mut seen = Vec::new();
        let (modified, out) = substitute_with(&tobj.to_bytes(), "tobj", "/t/a.tobj", &m, |s| {
            seen.push(s.original.to_string());
        })
        .unwrap();
        assert!(modified);
        assert_eq!(seen, ["/t/a*.dds", "/t/c?.dds"]);
        assert_eq!(Tobj::parse(&out).unwrap().texture_paths, ["/t/a_.dds", "c_.dds"]);
    }

    #[test]
    fn test_other_extensions_untouched() {
        let m = map(&[("/a", "/b")]);
        assert_eq!(substitute(b"\"/a\"", "txt", "/x.txt", &m).unwrap(), (false, b"\"/a\"".to_vec()));
    }

    #[test]
    fn test_replace_first() {
        assert_eq!(
            replace_first(b"x \"/a/b\" \"/a/b\"", "/a/b", "/c").unwrap(),
            b"x \"/c\" \"/a/b\""
        );
        // Only whole literals match, and `#` suffixes are kept.
        assert_eq!(
            replace_first(b"\"/a/bc\" \"/a/b#ev\"", "/a/b", "/c").unwrap(),
            b"\"/a/bc\" \"/c#ev\""
        );
        assert!(replace_first(b"\"abc\"", "zz", "y").is_none());
        assert!(replace_first(b"/a/b unquoted", "/a/b", "/c").is_none());
    }
}
