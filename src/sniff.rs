//! File type sniffing for entries whose path is unknown.
//!
//! Engine formats are recognized by their own magics. Everything else falls
//! back to the [`infer`] crate, and finally to `txt` for valid UTF-8 or no
//! extension at all.

use crate::sii::{SCSC_MAGIC, THREE_NK_MAGIC};
use crate::texture::tobj::TOBJ_MAGIC;

const DDS_MAGIC: &[u8; 4] = b"DDS ";
const SII_TEXT_MAGIC: &[u8] = b"SiiNunit";
const PMG_SIGNATURE: &[u8; 3] = b"Gmp";
const UTF8_BOM: &[u8; 3] = b"\xEF\xBB\xBF";

/// Output subfolder for a family of file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileGroup {
    /// Model geometry and its companions.
    Model,
    /// Materials.
    Material,
    /// Texture descriptors and images.
    Texture,
}

impl FileGroup {
    /// Folder name used under the unknown-file dump directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            FileGroup::Model => "model",
            FileGroup::Material => "material",
            FileGroup::Texture => "texture",
        }
    }

    /// Returns the group an extension (without dot) belongs to.
    pub fn for_extension(ext: &str) -> Option<Self> {
        match ext {
            "pmg" | "pmd" | "pmc" | "pma" | "ppd" => Some(FileGroup::Model),
            "mat" => Some(FileGroup::Material),
            "tobj" | "dds" | "png" | "jpg" | "tga" | "bmp" => Some(FileGroup::Texture),
            _ => None,
        }
    }
}

/// Guesses the extension (without dot) of a payload.
pub fn extension(data: &[u8]) -> Option<&'static str> {
    let text = data.strip_prefix(UTF8_BOM).unwrap_or(data);

    if data.len() >= 4 && u32::from_le_bytes([data[0], data[1], data[2], data[3]]) == TOBJ_MAGIC {
        return Some("tobj");
    }
    if data.starts_with(DDS_MAGIC) {
        return Some("dds");
    }
    if text.starts_with(SII_TEXT_MAGIC)
        || data.starts_with(SCSC_MAGIC)
        || data.starts_with(THREE_NK_MAGIC)
    {
        return Some("sii");
    }
    if data.len() >= 4 && &data[1..4] == PMG_SIGNATURE {
        return Some("pmg");
    }
    if looks_like_material(text) {
        return Some("mat");
    }
    if let Some(kind) = infer::get(data) {
        return Some(kind.extension());
    }
    if !data.is_empty() && std::str::from_utf8(data).is_ok() {
        return Some("txt");
    }
    None
}

fn looks_like_material(text: &[u8]) -> bool {
    let head = &text[..text.len().min(64)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    (head.starts_with("effect") || head.starts_with("material")) && head.contains(':')
}

/// Relative dump path for an unrecovered entry: an optional group folder,
/// then the hash as 16 hex digits and the sniffed extension.
pub fn dump_name(hash: u64, data: &[u8]) -> String {
    match extension(data) {
        Some(ext) => match FileGroup::for_extension(ext) {
            Some(group) => format!("{}/{hash:016x}.{ext}", group.dir_name()),
            None => format!("{hash:016x}.{ext}"),
        },
        None => format!("{hash:016x}"),
    }
}
