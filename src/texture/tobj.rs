//! The `.tobj` texture descriptor format.
//!
//! A descriptor is a 40-byte header followed by one record per referenced
//! texture file: a u32 length, four bytes of padding and the UTF-8 path.
//! Map and 3D textures carry one record; cube maps may carry six.
//!
//! Only the fields used by reconstruction and path rewriting are named.
//! Every other header byte is carried through [`Tobj::parse`] and
//! [`Tobj::to_bytes`] untouched.

use crate::{Error, Result};

/// Magic at the start of every descriptor.
pub const TOBJ_MAGIC: u32 = 0x70b1_0a01;

/// Size of the fixed header.
pub const HEADER_SIZE: usize = 40;

const OFFSET_BIAS: usize = 22;
const OFFSET_TYPE: usize = 24;
const OFFSET_MAG: usize = 26;
const OFFSET_MIN: usize = 27;
const OFFSET_MIP: usize = 28;
const OFFSET_ADDR_U: usize = 30;
const OFFSET_ADDR_V: usize = 31;
const OFFSET_ADDR_W: usize = 32;
const OFFSET_NOCOMPRESS: usize = 33;
const OFFSET_NOANISOTROPIC: usize = 35;
const OFFSET_COLOR_SPACE: usize = 38;

const NAMED_OFFSETS: [usize; 11] = [
    OFFSET_BIAS,
    OFFSET_TYPE,
    OFFSET_MAG,
    OFFSET_MIN,
    OFFSET_MIP,
    OFFSET_ADDR_U,
    OFFSET_ADDR_V,
    OFFSET_ADDR_W,
    OFFSET_NOCOMPRESS,
    OFFSET_NOANISOTROPIC,
    OFFSET_COLOR_SPACE,
];

/// Texture kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TobjType {
    /// 1D texture.
    Map1D,
    /// 2D texture.
    #[default]
    Map2D,
    /// 3D texture.
    Map3D,
    /// Cube map.
    CubeMap,
    /// Unrecognized type byte.
    Other(u8),
}

impl From<u8> for TobjType {
    fn from(value: u8) -> Self {
        match value {
            1 => TobjType::Map1D,
            2 => TobjType::Map2D,
            3 => TobjType::Map3D,
            5 => TobjType::CubeMap,
            other => TobjType::Other(other),
        }
    }
}

impl From<TobjType> for u8 {
    fn from(value: TobjType) -> Self {
        match value {
            TobjType::Map1D => 1,
            TobjType::Map2D => 2,
            TobjType::Map3D => 3,
            TobjType::CubeMap => 5,
            TobjType::Other(other) => other,
        }
    }
}

/// Magnification/minification filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TobjFilter {
    /// Nearest neighbour.
    Nearest,
    /// Linear.
    Linear,
    /// Engine default.
    #[default]
    Default,
    /// Unrecognized value.
    Other(u8),
}

impl From<u8> for TobjFilter {
    fn from(value: u8) -> Self {
        match value {
            0 => TobjFilter::Nearest,
            1 => TobjFilter::Linear,
            3 => TobjFilter::Default,
            other => TobjFilter::Other(other),
        }
    }
}

impl From<TobjFilter> for u8 {
    fn from(value: TobjFilter) -> Self {
        match value {
            TobjFilter::Nearest => 0,
            TobjFilter::Linear => 1,
            TobjFilter::Default => 3,
            TobjFilter::Other(other) => other,
        }
    }
}

/// Mip filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TobjMipFilter {
    /// Nearest mip.
    Nearest,
    /// Trilinear.
    Trilinear,
    /// Mipmapping disabled.
    NoMips,
    /// Engine default.
    #[default]
    Default,
    /// Unrecognized value.
    Other(u8),
}

impl From<u8> for TobjMipFilter {
    fn from(value: u8) -> Self {
        match value {
            0 => TobjMipFilter::Nearest,
            1 => TobjMipFilter::Trilinear,
            2 => TobjMipFilter::NoMips,
            3 => TobjMipFilter::Default,
            other => TobjMipFilter::Other(other),
        }
    }
}

impl From<TobjMipFilter> for u8 {
    fn from(value: TobjMipFilter) -> Self {
        match value {
            TobjMipFilter::Nearest => 0,
            TobjMipFilter::Trilinear => 1,
            TobjMipFilter::NoMips => 2,
            TobjMipFilter::Default => 3,
            TobjMipFilter::Other(other) => other,
        }
    }
}

/// Texture address mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TobjAddr {
    /// Wrap.
    #[default]
    Repeat,
    /// Clamp.
    Clamp,
    /// Clamp to edge.
    ClampToEdge,
    /// Clamp to border.
    ClampToBorder,
    /// Mirror.
    Mirror,
    /// Mirror once, then clamp.
    MirrorClamp,
    /// Mirror once, then clamp to edge.
    MirrorClampToEdge,
    /// Unrecognized value.
    Other(u8),
}

impl From<u8> for TobjAddr {
    fn from(value: u8) -> Self {
        match value {
            0 => TobjAddr::Repeat,
            1 => TobjAddr::Clamp,
            2 => TobjAddr::ClampToEdge,
            3 => TobjAddr::ClampToBorder,
            4 => TobjAddr::Mirror,
            5 => TobjAddr::MirrorClamp,
            6 => TobjAddr::MirrorClampToEdge,
            other => TobjAddr::Other(other),
        }
    }
}

impl From<TobjAddr> for u8 {
    fn from(value: TobjAddr) -> Self {
        match value {
            TobjAddr::Repeat => 0,
            TobjAddr::Clamp => 1,
            TobjAddr::ClampToEdge => 2,
            TobjAddr::ClampToBorder => 3,
            TobjAddr::Mirror => 4,
            TobjAddr::MirrorClamp => 5,
            TobjAddr::MirrorClampToEdge => 6,
            TobjAddr::Other(other) => other,
        }
    }
}

/// A parsed texture descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tobj {
    /// Texture kind.
    pub kind: TobjType,
    /// Magnification filter.
    pub mag_filter: TobjFilter,
    /// Minification filter.
    pub min_filter: TobjFilter,
    /// Mip filter.
    pub mip_filter: TobjMipFilter,
    /// U address mode.
    pub addr_u: TobjAddr,
    /// V address mode.
    pub addr_v: TobjAddr,
    /// W address mode.
    pub addr_w: TobjAddr,
    /// Disable runtime compression.
    pub no_compress: bool,
    /// Disable anisotropic filtering.
    pub no_anisotropic: bool,
    /// Custom color space flag.
    pub custom_color_space: bool,
    /// Mip bias.
    pub bias: u8,
    /// Referenced texture files, usually absolute archive paths.
    pub texture_paths: Vec<String>,
    pub(crate) header: [u8; HEADER_SIZE],
}

impl Default for Tobj {
    fn default() -> Self {
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&TOBJ_MAGIC.to_le_bytes());
        Self {
            kind: TobjType::Map2D,
            mag_filter: TobjFilter::Default,
            min_filter: TobjFilter::Default,
            mip_filter: TobjMipFilter::Default,
            addr_u: TobjAddr::Repeat,
            addr_v: TobjAddr::Repeat,
            addr_w: TobjAddr::Repeat,
            no_compress: false,
            no_anisotropic: false,
            custom_color_space: false,
            bias: 0,
            texture_paths: Vec::new(),
            header,
        }
    }
}

impl Tobj {
    /// Parses a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the header is truncated, the magic does not
    /// match, or a texture record runs past the end of the buffer.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Decode(format!(
                "tobj too short: {} bytes",
                data.len()
            )));
        }
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&data[..HEADER_SIZE]);

        let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        if magic != TOBJ_MAGIC {
            return Err(Error::Decode(format!("bad tobj magic {magic:#010x}")));
        }

        let mut texture_paths = Vec::new();
        let mut pos = HEADER_SIZE;
        while pos + 8 <= data.len() {
            let len = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
                as usize;
            pos += 8;
            let end = pos
                .checked_add(len)
                .filter(|&end| end <= data.len())
                .ok_or_else(|| Error::Decode("tobj texture path out of bounds".into()))?;
            texture_paths.push(String::from_utf8_lossy(&data[pos..end]).into_owned());
            pos = end;
        }

        let tobj = Self {
            kind: TobjType::from(header[OFFSET_TYPE]),
            mag_filter: TobjFilter::from(header[OFFSET_MAG]),
            min_filter: TobjFilter::from(header[OFFSET_MIN]),
            mip_filter: TobjMipFilter::from(header[OFFSET_MIP]),
            addr_u: TobjAddr::from(header[OFFSET_ADDR_U]),
            addr_v: TobjAddr::from(header[OFFSET_ADDR_V]),
            addr_w: TobjAddr::from(header[OFFSET_ADDR_W]),
            no_compress: header[OFFSET_NOCOMPRESS] != 0,
            no_anisotropic: header[OFFSET_NOANISOTROPIC] != 0,
            custom_color_space: header[OFFSET_COLOR_SPACE] != 0,
            bias: header[OFFSET_BIAS],
            texture_paths,
            header: [0u8; HEADER_SIZE],
        };
        // Named fields live in the struct; only the remaining bytes are kept raw.
        for offset in NAMED_OFFSETS {
            header[offset] = 0;
        }
        Ok(Self { header, ..tobj })
    }

    /// Serializes the descriptor.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = self.header;
        header[OFFSET_BIAS] = self.bias;
        header[OFFSET_TYPE] = self.kind.into();
        header[OFFSET_MAG] = self.mag_filter.into();
        header[OFFSET_MIN] = self.min_filter.into();
        header[OFFSET_MIP] = self.mip_filter.into();
        header[OFFSET_ADDR_U] = self.addr_u.into();
        header[OFFSET_ADDR_V] = self.addr_v.into();
        header[OFFSET_ADDR_W] = self.addr_w.into();
        header[OFFSET_NOCOMPRESS] = u8::from(self.no_compress);
        header[OFFSET_NOANISOTROPIC] = u8::from(self.no_anisotropic);
        header[OFFSET_COLOR_SPACE] = u8::from(self.custom_color_space);

        let paths_len: usize = self.texture_paths.iter().map(|p| p.len() + 8).sum();
        let mut out = Vec::with_capacity(HEADER_SIZE + paths_len);
        out.extend_from_slice(&header);
        for path in &self.texture_paths {
            out.extend_from_slice(&(path.len() as u32).to_le_bytes());
            out.extend_from_slice(&[0u8; 4]);
            out.extend_from_slice(path.as_bytes());
        }
        out
    }

    /// Applies `rewrite` to every texture path. Returns `true` if any path
    /// changed.
    pub fn rewrite_paths(&mut self, mut rewrite: impl FnMut(&str) -> Option<String>) -> bool {
        let mut changed = false;
        for path in &mut self.texture_paths {
            if let Some(new_path) = rewrite(path) {
                if new_path != *path {
                    *path = new_path;
                    changed = true;
                }
            }
        }
        changed
    }
}
