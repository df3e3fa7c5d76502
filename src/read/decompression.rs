//! Payload reading, decompression and directory listings.

use std::io::SeekFrom;

use crate::codec::Codec;
use crate::format::header::ArchiveHeader;
use crate::format::reader::read_bytes;
use crate::format::{v1, v2};
use crate::texture::dds;
use crate::{Error, Result};

use super::{Archive, ArchiveSource, DirectoryListing, Entry, EntryType, normalize};

impl<S: ArchiveSource> Archive<S> {
    /// Reads the stored (still encoded) bytes of an entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if the payload lies outside the file.
    pub fn read_stored(&mut self, entry: &Entry) -> Result<Vec<u8>> {
        let range = entry.stored_range();
        if range.end > self.index.file_len {
            return Err(Error::InvalidFormat(format!(
                "payload of {:016x} at {:#x}..{:#x} runs past end of file",
                entry.hash, range.start, range.end
            )));
        }
        self.source.seek(SeekFrom::Start(range.start))?;
        Ok(read_bytes(&mut self.source, (range.end - range.start) as usize)?)
    }

    /// Reads and decodes the payload of an entry.
    ///
    /// For packed textures this is the raw GPU payload, not a DDS file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] for corrupt zlib or GDeflate streams.
    pub fn read_payload(&mut self, entry: &Entry) -> Result<Vec<u8>> {
        let stored = self.read_stored(entry)?;
        Codec::for_entry(entry).decode(stored, entry.size)
    }

    /// Extracts the file at `path`.
    ///
    /// See [`Archive::extract_entry`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] if the path does not resolve.
    pub fn extract(&mut self, path: &str) -> Result<Vec<Vec<u8>>> {
        let entry = *self.get_entry(path)?;
        self.extract_entry(&entry, path)
    }

    /// Extracts an entry that was resolved from `path`.
    ///
    /// Regular files and directories yield one buffer. Packed textures yield
    /// two: a synthesized `.tobj` descriptor pointing at the sibling `.dds`,
    /// then the synthesized DDS file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] if `entry` does not belong to this
    /// archive, plus any error of [`Archive::read_payload`].
    pub fn extract_entry(&mut self, entry: &Entry, path: &str) -> Result<Vec<Vec<u8>>> {
        if !self.contains(entry) {
            return Err(Error::not_found(path));
        }

        match &entry.texture {
            None => Ok(vec![self.read_payload(entry)?]),
            Some(texture) => {
                let tobj = texture.to_tobj(path).to_bytes();
                let payload = self.read_payload(entry)?;
                let dds = dds::synthesize(texture, &payload)?;
                Ok(vec![tobj, dds])
            }
        }
    }

    /// Lists the directory at `path`.
    ///
    /// With `files_only`, subdirectories are omitted. With `absolute`, every
    /// name is joined with the normalized directory path.
    ///
    /// # Errors
    ///
    /// - [`Error::EntryNotFound`] if the path does not resolve
    /// - [`Error::NotADirectory`] if it resolves to a file
    /// - [`Error::Decode`] if the listing payload is malformed
    pub fn directory_listing(
        &mut self,
        path: &str,
        files_only: bool,
        absolute: bool,
    ) -> Result<DirectoryListing> {
        let dir = normalize(path);
        let entry = match self.entry_exists(&dir) {
            EntryType::NotFound => return Err(Error::not_found(dir)),
            EntryType::File => return Err(Error::NotADirectory { path: dir }),
            EntryType::Directory => *self.get_entry(&dir)?,
        };

        let listing = self.listing_of(&entry, files_only)?;
        Ok(if absolute {
            listing.into_absolute(&dir)
        } else {
            listing
        })
    }

    /// Decodes the listing stored in a directory entry, merging version 1
    /// fragments that share its hash.
    pub(crate) fn listing_of(&mut self, entry: &Entry, files_only: bool) -> Result<DirectoryListing> {
        match self.index.header {
            ArchiveHeader::V1(_) => {
                let mut listing = DirectoryListing::default();
                let fragments: Vec<Entry> = self.fragments_of(entry.hash).copied().collect();
                for part in std::iter::once(entry).chain(fragments.iter()) {
                    let payload = self.read_payload(part)?;
                    v1::parse_listing(&payload, files_only, &mut listing);
                }
                Ok(listing)
            }
            ArchiveHeader::V2(_) => {
                let payload = self.read_payload(entry)?;
                v2::parse_listing(&payload, files_only)
            }
        }
    }
}
