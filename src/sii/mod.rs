//! SII text configuration support.
//!
//! SII files are stored in one of three wire forms:
//!
//! - plain text, starting with `SiiNunit` (possibly after a byte order mark)
//! - `ScsC`: a 32-byte HMAC, a 16-byte IV and the plain size, followed by
//!   the zlib-compressed text encrypted with AES-256-CBC under a fixed key
//! - `3nK`: a 6-byte header ending in a seed byte, followed by the text
//!   xored with a keystream derived from the seed
//!
//! [`decode`] peels these layers until plain text remains. The [`parser`]
//! module turns plain text into units and typed attribute values.

pub mod parser;

pub use parser::{SiiFile, Unit, Value};

use crate::codec::inflate;
use crate::{Error, Result};

/// Magic of the encrypted form.
pub const SCSC_MAGIC: &[u8; 4] = b"ScsC";

/// Magic of the obfuscated form.
pub const THREE_NK_MAGIC: &[u8; 3] = b"3nK";

/// Header size of the obfuscated form: magic, a u16, and the seed.
const THREE_NK_HEADER_SIZE: usize = 6;

/// Header size of the encrypted form: magic, HMAC, IV and plain size.
const SCSC_HEADER_SIZE: usize = 4 + 32 + 16 + 4;

/// Upper bound on nested wire layers.
const MAX_LAYERS: usize = 8;

#[cfg(feature = "aes")]
const SII_KEY: [u8; 32] = [
    0x2a, 0x5f, 0xcb, 0x17, 0x91, 0xd2, 0x2f, 0xb6, 0x02, 0x45, 0xb3, 0xd8, 0x36, 0x9e, 0xd0, 0xb2,
    0xc2, 0x73, 0x71, 0x56, 0x3f, 0xbf, 0x1f, 0x3c, 0x9e, 0xdf, 0x6b, 0x11, 0x82, 0x5a, 0x5d, 0x0a,
];

/// Wire form of a SII buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiiForm {
    /// Plain text.
    Plain,
    /// AES-encrypted and compressed.
    Encrypted,
    /// Xor-obfuscated.
    Obfuscated,
}

impl SiiForm {
    /// Detects the wire form from the leading bytes.
    pub fn detect(data: &[u8]) -> Self {
        if data.starts_with(SCSC_MAGIC) {
            SiiForm::Encrypted
        } else if data.starts_with(THREE_NK_MAGIC) {
            SiiForm::Obfuscated
        } else {
            SiiForm::Plain
        }
    }
}

/// Decodes a SII buffer to plain text bytes.
///
/// Plain buffers are returned unchanged. Layers are removed repeatedly, so
/// an obfuscated buffer inside an encrypted one decodes fully.
///
/// # Errors
///
/// Returns [`Error::Decode`] for truncated or corrupt layers, and
/// [`Error::UnsupportedFeature`] for encrypted input when the `aes` feature
/// is disabled.
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for _ in 0..MAX_LAYERS {
        current = match SiiForm::detect(&current) {
            SiiForm::Plain => return Ok(current),
            SiiForm::Encrypted => decrypt(&current)?,
            SiiForm::Obfuscated => deobfuscate(&current)?,
        };
    }
    Err(Error::Decode(format!(
        "more than {MAX_LAYERS} nested SII layers"
    )))
}

/// Removes one `ScsC` layer.
#[cfg(feature = "aes")]
pub fn decrypt(data: &[u8]) -> Result<Vec<u8>> {
    use aes::Aes256;
    use cbc::cipher::block_padding::Pkcs7;
    use cbc::cipher::{BlockDecryptMut, KeyIvInit};

    type Aes256CbcDec = cbc::Decryptor<Aes256>;

    if data.len() < SCSC_HEADER_SIZE || !data.starts_with(SCSC_MAGIC) {
        return Err(Error::Decode("not an encrypted SII buffer".into()));
    }
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&data[36..52]);
    let size = u32::from_le_bytes([data[52], data[53], data[54], data[55]]);

    let mut buf = data[SCSC_HEADER_SIZE..].to_vec();
    let plain = Aes256CbcDec::new(&SII_KEY.into(), &iv.into())
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| Error::Decode("SII decryption failed: bad padding".into()))?;
    inflate(plain, size as usize)
}

/// Removes one `ScsC` layer.
#[cfg(not(feature = "aes"))]
pub fn decrypt(_data: &[u8]) -> Result<Vec<u8>> {
    Err(Error::unsupported("encrypted SII (built without `aes`)"))
}

fn three_nk_key(index: u8) -> u8 {
    (((index << 2) ^ !index) << 3) ^ index
}

/// Removes one `3nK` layer.
pub fn deobfuscate(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < THREE_NK_HEADER_SIZE || !data.starts_with(THREE_NK_MAGIC) {
        return Err(Error::Decode("not a 3nK buffer".into()));
    }
    let seed = data[5];
    Ok(data[THREE_NK_HEADER_SIZE..]
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ three_nk_key(seed.wrapping_add(i as u8)))
        .collect())
}

/// Applies a `3nK` layer with the given seed.
pub fn obfuscate(data: &[u8], seed: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(THREE_NK_HEADER_SIZE + data.len());
    out.extend_from_slice(THREE_NK_MAGIC);
    out.extend_from_slice(&1u16.to_le_bytes());
    out.push(seed);
    out.extend(
        data.iter()
            .enumerate()
            .map(|(i, b)| b ^ three_nk_key(seed.wrapping_add(i as u8))),
    );
    out
}

/// Strips a leading UTF-8 byte order mark.
pub fn trim_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Removes `#`, `//` and `/* */` comments outside of quoted strings.
///
/// Line comments keep their terminating line break.
pub fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push(c);
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == '"' {
                        break;
                    }
                }
            }
            '#' => skip_line(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'/') => skip_line(&mut chars, &mut out),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, out: &mut String) {
    let mut prev = '\0';
    for c in chars.by_ref() {
        if c == '\n' {
            if prev == '\r' {
                out.push('\r');
            }
            out.push('\n');
            return;
        }
        prev = c;
    }
}
