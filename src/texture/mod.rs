//! Texture descriptors and packed-texture reconstruction.
//!
//! Version 2 archives do not store `.tobj`/`.dds` pairs. Instead, an image
//! chunk carries a compact [`PackedTexture`] descriptor next to the raw GPU
//! payload, and readers rebuild both files on extraction:
//!
//! - a minimal [`Tobj`] whose texture path is the `.tobj` path with a `.dds`
//!   extension, and
//! - a DDS file with a DX10 extension header whose pixel data is the payload
//!   with GPU alignment padding removed (see [`dds::synthesize`]).

pub mod dds;
pub mod tobj;

pub use dds::DxgiFormat;
pub use tobj::{Tobj, TobjAddr, TobjFilter, TobjMipFilter, TobjType};

/// Compact texture parameters stored in a version 2 image chunk.
///
/// The two flag words are kept verbatim; accessors decode the packed bit
/// fields on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedTexture {
    /// Width of the top mip level in pixels.
    pub width: u32,
    /// Height of the top mip level in pixels.
    pub height: u32,
    /// Image flags: mips, format, cube, faces, alignments.
    pub image_flags: u32,
    /// Sampler flags: filters and address modes.
    pub sample_flags: u32,
}

impl PackedTexture {
    /// Number of mip levels (at least 1).
    pub fn mipmap_count(&self) -> u32 {
        (self.image_flags & 0xF) + 1
    }

    /// DXGI pixel format of the payload.
    pub fn format(&self) -> DxgiFormat {
        DxgiFormat((self.image_flags >> 4) & 0xFF)
    }

    /// Whether the texture is a cube map.
    pub fn is_cube(&self) -> bool {
        (self.image_flags >> 12) & 0x3 != 0
    }

    /// Number of faces or array slices recorded in the flags.
    pub fn face_count(&self) -> u32 {
        ((self.image_flags >> 14) & 0x3F) + 1
    }

    /// Row pitch alignment of the payload in bytes.
    pub fn pitch_alignment(&self) -> u32 {
        1 << ((self.image_flags >> 20) & 0xF)
    }

    /// Per-surface alignment of the payload in bytes.
    pub fn image_alignment(&self) -> u32 {
        1 << ((self.image_flags >> 24) & 0xF)
    }

    /// Number of surfaces stored back to back in the payload.
    pub fn surface_count(&self) -> u32 {
        if self.is_cube() { 6 } else { self.face_count() }
    }

    /// Magnification filter.
    pub fn mag_filter(&self) -> TobjFilter {
        if self.sample_flags & 0x1 != 0 {
            TobjFilter::Linear
        } else {
            TobjFilter::Default
        }
    }

    /// Minification filter.
    pub fn min_filter(&self) -> TobjFilter {
        if self.sample_flags & 0x2 != 0 {
            TobjFilter::Linear
        } else {
            TobjFilter::Default
        }
    }

    /// Mip filter.
    pub fn mip_filter(&self) -> TobjMipFilter {
        match (self.sample_flags >> 2) & 0x3 {
            1 => TobjMipFilter::Trilinear,
            2 => TobjMipFilter::Nearest,
            3 => TobjMipFilter::NoMips,
            _ => TobjMipFilter::Default,
        }
    }

    /// Address modes for the U, V and W axes.
    pub fn addr(&self) -> [TobjAddr; 3] {
        [4, 7, 10].map(|shift| TobjAddr::from((self.sample_flags >> shift) as u8 & 0x7))
    }

    /// Builds the descriptor that references the synthesized DDS sibling of
    /// `tobj_path`.
    pub fn to_tobj(&self, tobj_path: &str) -> Tobj {
        let [addr_u, addr_v, addr_w] = self.addr();
        Tobj {
            kind: if self.is_cube() {
                TobjType::CubeMap
            } else {
                TobjType::Map2D
            },
            mag_filter: self.mag_filter(),
            min_filter: self.min_filter(),
            mip_filter: self.mip_filter(),
            addr_u,
            addr_v,
            addr_w,
            texture_paths: vec![dds_path_for(tobj_path)],
            ..Tobj::default()
        }
    }
}

/// Returns `path` with its extension replaced by `.dds`.
pub fn dds_path_for(path: &str) -> String {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) => format!("{}.dds", &path[..name_start + dot]),
        None => format!("{path}.dds"),
    }
}
