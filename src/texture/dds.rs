//! DDS reconstruction for packed textures.
//!
//! The archive stores the GPU-ready payload with each row padded to the
//! pitch alignment and each mip level padded to the image alignment. A DDS
//! file stores rows tightly packed, so [`synthesize`] walks every surface and
//! mip level, copies the meaningful bytes of each row and drops the padding.

use super::PackedTexture;
use crate::{Error, Result};

const DDS_MAGIC: &[u8; 4] = b"DDS ";
const HEADER_SIZE: u32 = 124;
const PIXEL_FORMAT_SIZE: u32 = 32;

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_MIPMAPCOUNT: u32 = 0x20000;

const DDPF_FOURCC: u32 = 0x4;
const FOURCC_DX10: &[u8; 4] = b"DX10";

const DDSCAPS_COMPLEX: u32 = 0x8;
const DDSCAPS_TEXTURE: u32 = 0x1000;
const DDSCAPS_MIPMAP: u32 = 0x40_0000;
const DDSCAPS2_CUBEMAP_ALL_FACES: u32 = 0xFE00;

const D3D10_RESOURCE_DIMENSION_TEXTURE2D: u32 = 3;
const D3D10_RESOURCE_MISC_TEXTURECUBE: u32 = 0x4;

/// A DXGI pixel format value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DxgiFormat(pub u32);

#[allow(missing_docs)]
impl DxgiFormat {
    pub const R32G32B32A32_FLOAT: Self = Self(2);
    pub const R16G16B16A16_FLOAT: Self = Self(10);
    pub const R10G10B10A2_UNORM: Self = Self(24);
    pub const R11G11B10_FLOAT: Self = Self(26);
    pub const R8G8B8A8_UNORM: Self = Self(28);
    pub const R8G8B8A8_UNORM_SRGB: Self = Self(29);
    pub const R16G16_FLOAT: Self = Self(34);
    pub const R32_FLOAT: Self = Self(41);
    pub const R8G8_UNORM: Self = Self(49);
    pub const R16_FLOAT: Self = Self(54);
    pub const R8_UNORM: Self = Self(61);
    pub const A8_UNORM: Self = Self(65);
    pub const BC1_UNORM: Self = Self(71);
    pub const BC1_UNORM_SRGB: Self = Self(72);
    pub const BC2_UNORM: Self = Self(74);
    pub const BC3_UNORM: Self = Self(77);
    pub const BC3_UNORM_SRGB: Self = Self(78);
    pub const BC4_UNORM: Self = Self(80);
    pub const BC5_UNORM: Self = Self(83);
    pub const B5G6R5_UNORM: Self = Self(85);
    pub const B8G8R8A8_UNORM: Self = Self(87);
    pub const B8G8R8X8_UNORM: Self = Self(88);
    pub const BC6H_UF16: Self = Self(95);
    pub const BC7_UNORM: Self = Self(98);
    pub const BC7_UNORM_SRGB: Self = Self(99);

    /// Bytes per 4x4 block for block-compressed formats.
    pub fn block_size(self) -> Option<u32> {
        match self.0 {
            70..=72 | 79..=81 => Some(8),
            73..=78 | 82..=84 | 94..=99 => Some(16),
            _ => None,
        }
    }

    /// Bits per pixel for uncompressed formats.
    pub fn bits_per_pixel(self) -> Option<u32> {
        match self.0 {
            1..=4 => Some(128),
            5..=8 => Some(96),
            9..=22 => Some(64),
            23..=47 | 67..=69 | 87..=93 => Some(32),
            48..=59 | 85 | 86 | 115 => Some(16),
            60..=66 => Some(8),
            _ => None,
        }
    }

    /// Tightly packed `(row bytes, row count)` of one mip level.
    pub fn level_layout(self, width: u32, height: u32) -> Option<(usize, usize)> {
        if let Some(block) = self.block_size() {
            let blocks_wide = width.div_ceil(4).max(1);
            let blocks_high = height.div_ceil(4).max(1);
            return Some(((blocks_wide * block) as usize, blocks_high as usize));
        }
        let bpp = self.bits_per_pixel()?;
        Some(((width * bpp).div_ceil(8) as usize, height as usize))
    }
}

fn align_up(value: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}

/// Removes pitch and image alignment padding from a packed payload.
///
/// Formats without a known layout are returned unchanged.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the payload is shorter than its declared
/// surfaces and mip levels require.
pub fn strip_alignment(texture: &PackedTexture, data: &[u8]) -> Result<Vec<u8>> {
    let format = texture.format();
    if format.level_layout(1, 1).is_none() {
        log::debug!("unknown DXGI format {}, keeping payload as is", format.0);
        return Ok(data.to_vec());
    }

    let pitch_alignment = texture.pitch_alignment() as usize;
    let image_alignment = texture.image_alignment() as usize;
    let mut out = Vec::with_capacity(data.len());
    let mut pos = 0usize;

    for _surface in 0..texture.surface_count() {
        for mip in 0..texture.mipmap_count() {
            let width = (texture.width >> mip).max(1);
            let height = (texture.height >> mip).max(1);
            let Some((row_bytes, rows)) = format.level_layout(width, height) else {
                return Ok(data.to_vec());
            };
            let pitch = align_up(row_bytes, pitch_alignment);
            let level_size = align_up(pitch * rows, image_alignment);

            let level_end = pos + pitch * (rows - 1) + row_bytes;
            if level_end > data.len() {
                return Err(Error::Decode(format!(
                    "texture payload too short: mip {mip} needs {level_end} bytes, have {}",
                    data.len()
                )));
            }
            for row in 0..rows {
                let start = pos + row * pitch;
                out.extend_from_slice(&data[start..start + row_bytes]);
            }
            pos += level_size;
        }
    }

    Ok(out)
}

/// Builds a complete DDS file (header, DX10 header and pixel data) for a
/// packed texture whose decoded payload is `data`.
pub fn synthesize(texture: &PackedTexture, data: &[u8]) -> Result<Vec<u8>> {
    let pixels = strip_alignment(texture, data)?;
    let mips = texture.mipmap_count();

    let mut flags = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT;
    if mips > 0 {
        flags |= DDSD_MIPMAPCOUNT;
    }
    let mut caps = DDSCAPS_TEXTURE;
    let mut caps2 = 0;
    let mut misc_flag = 0;
    if mips > 1 {
        caps |= DDSCAPS_MIPMAP | DDSCAPS_COMPLEX;
    }
    if texture.is_cube() {
        caps |= DDSCAPS_COMPLEX;
        caps2 |= DDSCAPS2_CUBEMAP_ALL_FACES;
        misc_flag |= D3D10_RESOURCE_MISC_TEXTURECUBE;
    }

    let mut out = Vec::with_capacity(4 + HEADER_SIZE as usize + 20 + pixels.len());
    let mut put = |value: u32| out.extend_from_slice(&value.to_le_bytes());

    put(u32::from_le_bytes(*DDS_MAGIC));
    put(HEADER_SIZE);
    put(flags);
    put(texture.height);
    put(texture.width);
    put(0); // pitch or linear size
    put(0); // depth
    put(mips);
    for _ in 0..11 {
        put(0);
    }
    put(PIXEL_FORMAT_SIZE);
    put(DDPF_FOURCC);
    put(u32::from_le_bytes(*FOURCC_DX10));
    for _ in 0..5 {
        put(0);
    }
    put(caps);
    put(caps2);
    put(0);
    put(0);
    put(0);
    // DX10 extension
    put(texture.format().0);
    put(D3D10_RESOURCE_DIMENSION_TEXTURE2D);
    put(misc_flag);
    put(1);
    put(0);

    out.extend_from_slice(&pixels);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(data: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
    }

    fn texture(width: u32, height: u32, image_flags: u32) -> PackedTexture {
        PackedTexture {
            width,
            height,
            image_flags,
            sample_flags: 0,
        }
    }

    #[test]
    fn test_level_layout() {
        assert_eq!(DxgiFormat::BC1_UNORM.level_layout(8, 8), Some((16, 2)));
        assert_eq!(DxgiFormat::BC3_UNORM.level_layout(1, 1), Some((16, 1)));
        assert_eq!(DxgiFormat::R8G8B8A8_UNORM.level_layout(3, 2), Some((12, 2)));
        assert_eq!(DxgiFormat(0).level_layout(4, 4), None);
    }

    #[test]
    fn test_strip_pitch_padding() {
        // 2x2 RGBA8, one mip, pitch aligned to 16 bytes
        let flags = (28 << 4) | (4 << 20);
        let tex = texture(2, 2, flags);
        let mut data = Vec::new();
        data.extend_from_slice(&[1u8; 8]);
        data.extend_from_slice(&[0u8; 8]);
        data.extend_from_slice(&[2u8; 8]);
        data.extend_from_slice(&[0u8; 8]);
        let pixels = strip_alignment(&tex, &data).unwrap();
        assert_eq!(pixels.len(), 16);
        assert_eq!(&pixels[..8], &[1u8; 8]);
        assert_eq!(&pixels[8..], &[2u8; 8]);
    }

    #[test]
    fn test_strip_image_padding_between_mips() {
        // 4x4 BC1 with two mips, each level aligned to 32 bytes
        let flags = 1 | (71 << 4) | (5 << 24);
        let tex = texture(4, 4, flags);
        let mut data = vec![0xAAu8; 8];
        data.extend_from_slice(&[0u8; 24]);
        data.extend_from_slice(&[0xBBu8; 8]);
        let pixels = strip_alignment(&tex, &data).unwrap();
        assert_eq!(pixels.len(), 16);
        assert_eq!(&pixels[..8], &[0xAAu8; 8]);
        assert_eq!(&pixels[8..], &[0xBBu8; 8]);
    }

    #[test]
    fn test_short_payload_is_error() {
        let tex = texture(8, 8, 71 << 4);
        assert!(matches!(strip_alignment(&tex, &[0u8; 8]), Err(Error::Decode(_))));
    }

    #[test]
    fn test_header_fields() {
        let flags = 1 | (77 << 4) | (1 << 12);
        let tex = texture(4, 4, flags);
        let payload = vec![0u8; 6 * 32];
        let dds = synthesize(&tex, &payload).unwrap();

        assert_eq!(&dds[..4], b"DDS ");
        assert_eq!(u32_at(&dds, 4), 124);
        assert_eq!(u32_at(&dds, 12), 4);
        assert_eq!(u32_at(&dds, 16), 4);
        assert_eq!(u32_at(&dds, 28), 2);
        assert_eq!(&dds[84..88], b"DX10");
        let caps = u32_at(&dds, 108);
        assert_ne!(caps & DDSCAPS_MIPMAP, 0);
        assert_ne!(caps & DDSCAPS_COMPLEX, 0);
        assert_eq!(u32_at(&dds, 112), DDSCAPS2_CUBEMAP_ALL_FACES);
        assert_eq!(u32_at(&dds, 128), 77);
        assert_eq!(u32_at(&dds, 132), D3D10_RESOURCE_DIMENSION_TEXTURE2D);
        assert_eq!(u32_at(&dds, 136), D3D10_RESOURCE_MISC_TEXTURECUBE);
        assert_eq!(u32_at(&dds, 140), 1);
        // 6 faces x (16 + 16) bytes of BC3 blocks
        assert_eq!(dds.len(), 148 + 6 * 32);
    }
}
