//! Zlib codec implementation.

use std::io::{self, Read};

use flate2::bufread::ZlibDecoder as FlateDecoder;

use crate::{Error, Result};

/// Zlib decoder over a buffered source.
pub struct ZlibDecoder<R> {
    inner: FlateDecoder<R>,
}

impl<R> std::fmt::Debug for ZlibDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZlibDecoder").finish_non_exhaustive()
    }
}

impl<R: io::BufRead> ZlibDecoder<R> {
    /// Creates a new zlib decoder.
    ///
    /// # Arguments
    ///
    /// * `input` - The compressed data source (must implement BufRead)
    pub fn new(input: R) -> Self {
        Self {
            inner: FlateDecoder::new(input),
        }
    }
}

impl<R: io::BufRead> Read for ZlibDecoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Largest output reservation made up front. Declared sizes come from the
/// archive and are not trusted beyond this.
const MAX_RESERVE: usize = 1 << 20;

/// Inflates a complete zlib stream held in memory into exactly `size`
/// bytes.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the stream is corrupt or inflates to a
/// length other than `size`.
pub fn inflate(data: &[u8], size: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(size.min(MAX_RESERVE));
    ZlibDecoder::new(data)
        .take(size as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::Decode(format!("zlib: {e}")))?;
    if out.len() != size {
        return Err(Error::Decode(format!(
            "zlib: expected {size} bytes, stream holds {}{}",
            out.len().min(size),
            if out.len() > size { " or more" } else { "" }
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    #[test]
    fn test_inflate() {
        let original = b"my hovercraft is full of eels.".repeat(20);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(inflate(&compressed, original.len()).unwrap(), original);
    }

    #[test]
    fn test_inflate_rejects_wrong_size() {
        let original = b"abcdefgh".repeat(64);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        let err = inflate(&compressed, original.len() - 1).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        let err = inflate(&compressed, original.len() + 1).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_inflate_huge_declared_size() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"tiny").unwrap();
        let compressed = encoder.finish().unwrap();
        let err = inflate(&compressed, u32::MAX as usize).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_inflate_garbage() {
        let err = inflate(b"definitely not zlib", 0).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
