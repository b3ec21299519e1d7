//! Image container framing
//!
//! An image is the encrypted payload followed immediately by the metadata
//! block. There is no header, magic number or other framing.

use crate::binary::{write_bytes, BinaryWrite};
use crate::metadata::{ImageMetadata, MetadataError, METADATA_SIZE};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Structural problems with an image or its metadata
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("Image is {len} bytes, shorter than the {}-byte metadata block", METADATA_SIZE)]
    Truncated { len: usize },

    #[error("Metadata declares a {declared}-byte payload but the image carries {actual} bytes")]
    PayloadSizeMismatch { declared: u32, actual: usize },

    #[error("Firmware of {len} bytes does not fit the 32-bit size fields")]
    TooLarge { len: usize },
}

/// A packaged firmware image: encrypted payload plus metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedImage {
    payload: Vec<u8>,
    metadata: ImageMetadata,
}

impl SealedImage {
    pub(crate) fn new(payload: Vec<u8>, metadata: ImageMetadata) -> Self {
        Self { payload, metadata }
    }

    /// Split raw image bytes into payload and metadata
    ///
    /// Fails if the image is shorter than the metadata block or if the
    /// declared `enc_size` disagrees with the actual payload length.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let split = bytes
            .len()
            .checked_sub(METADATA_SIZE)
            .ok_or(FormatError::Truncated { len: bytes.len() })?;
        let (payload, block) = bytes.split_at(split);
        let metadata = ImageMetadata::decode(block)?;

        if metadata.enc_size as usize != payload.len() {
            return Err(FormatError::PayloadSizeMismatch {
                declared: metadata.enc_size,
                actual: payload.len(),
            });
        }

        Ok(Self {
            payload: payload.to_vec(),
            metadata,
        })
    }

    /// Read and parse an image file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, crate::FwSealError> {
        let bytes = fs::read(path)?;
        Ok(Self::parse(&bytes)?)
    }

    /// The encrypted payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The decoded metadata block
    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    /// Serialize the whole image
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.serialized_size());
        out.extend_from_slice(&self.payload);
        out.extend_from_slice(&self.metadata.encode());
        out
    }

    /// Write the image to `path` without ever exposing a partial file
    ///
    /// The bytes go to a temporary file in the destination directory, which
    /// is renamed over `path` only after everything has been flushed.
    pub fn write_atomic<P: AsRef<Path>>(&self, path: P) -> io::Result<u64> {
        write_atomic(path.as_ref(), |file| self.write_to(file))?;
        Ok(self.serialized_size() as u64)
    }
}

impl BinaryWrite for SealedImage {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_bytes(writer, &self.payload)?;
        self.metadata.write_to(writer)
    }

    fn serialized_size(&self) -> usize {
        self.payload.len() + self.metadata.serialized_size()
    }
}

/// Create `path` through a temporary sibling file that is persisted on success
pub(crate) fn write_atomic<F>(path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut fs::File) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    fill(temp.as_file_mut())?;
    temp.as_file_mut().flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_image(payload_len: u32) -> SealedImage {
        let metadata = ImageMetadata::new(
            payload_len,
            payload_len.saturating_sub(3),
            &[1; 16],
            &[2; 32],
            &[3; 64],
        )
        .unwrap();
        SealedImage::new(vec![0xC3; payload_len as usize], metadata)
    }

    #[test]
    fn test_to_bytes_layout() {
        let image = sample_image(32);
        let bytes = image.to_bytes();

        assert_eq!(bytes.len(), 32 + 256);
        assert!(bytes[..32].iter().all(|&b| b == 0xC3));
        assert_eq!(&bytes[32..36], &32u32.to_le_bytes());
        assert_eq!(bytes.len(), image.serialized_size());
    }

    #[test]
    fn test_parse_round_trip() {
        let image = sample_image(48);
        let parsed = SealedImage::parse(&image.to_bytes()).unwrap();
        assert_eq!(parsed, image);
    }

    #[test]
    fn test_parse_truncated() {
        assert_eq!(
            SealedImage::parse(&[0u8; 100]),
            Err(FormatError::Truncated { len: 100 })
        );
    }

    #[test]
    fn test_parse_size_mismatch() {
        let mut bytes = sample_image(32).to_bytes();
        bytes.remove(0);
        assert_eq!(
            SealedImage::parse(&bytes),
            Err(FormatError::PayloadSizeMismatch {
                declared: 32,
                actual: 31
            })
        );
    }

    #[test]
    fn test_write_atomic() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = dir.path().join("image.bin");
        let image = sample_image(16);

        let written = image.write_atomic(&path)?;
        assert_eq!(written, 16 + 256);
        assert_eq!(fs::read(&path)?, image.to_bytes());

        // Only the final file remains in the directory
        assert_eq!(fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_write_atomic_failure_leaves_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = TempDir::new()?;
        let path = dir.path().join("image.bin");

        let result = write_atomic(&path, |file| {
            file.write_all(b"partial")?;
            Err(io::Error::new(io::ErrorKind::Other, "boom"))
        });

        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_write_atomic_missing_directory() {
        let path = Path::new("/nonexistent-fwseal-dir/image.bin");
        assert!(sample_image(16).write_atomic(path).is_err());
        assert!(!path.exists());
    }
}
