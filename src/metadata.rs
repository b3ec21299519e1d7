//! Metadata block codec
//!
//! Every firmware image ends with a fixed 256-byte metadata block. The
//! layout is described once, by [`LAYOUT`], and both [`ImageMetadata::encode`]
//! and [`ImageMetadata::decode`] slice through the same table.
//!
//! ```text
//! offset  size  field
//!      0     4  enc_size   (u32 LE)
//!      4     4  raw_size   (u32 LE)
//!      8     4  pad_size   (u32 LE)
//!     12    16  iv
//!     28    32  digest     (SHA-256 of plaintext)
//!     60    64  signature  (ECDSA P-256 r || s, big-endian)
//!    124    16  reserved   (0x00)
//!    140   116  filler     (0xFF)
//! ```

use crate::binary::{get_array, get_u32_le, put_u32_le, read_array, BinaryRead, BinaryWrite};
use serde::Serialize;
use std::fmt;
use std::io::{self, Read, Write};
use std::ops::Range;
use thiserror::Error;

/// One entry of the metadata schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub width: usize,
}

impl FieldSpec {
    const fn new(name: &'static str, offset: usize, width: usize) -> Self {
        Self {
            name,
            offset,
            width,
        }
    }

    /// Byte range covered by this field
    pub const fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.width
    }

    const fn end(&self) -> usize {
        self.offset + self.width
    }
}

pub const ENC_SIZE: FieldSpec = FieldSpec::new("enc_size", 0, 4);
pub const RAW_SIZE: FieldSpec = FieldSpec::new("raw_size", ENC_SIZE.end(), 4);
pub const PAD_SIZE: FieldSpec = FieldSpec::new("pad_size", RAW_SIZE.end(), 4);
pub const IV: FieldSpec = FieldSpec::new("iv", PAD_SIZE.end(), IV_SIZE);
pub const DIGEST: FieldSpec = FieldSpec::new("digest", IV.end(), DIGEST_SIZE);
pub const SIGNATURE: FieldSpec = FieldSpec::new("signature", DIGEST.end(), SIGNATURE_SIZE);
pub const RESERVED: FieldSpec = FieldSpec::new("reserved", SIGNATURE.end(), 16);
pub const FILLER: FieldSpec = FieldSpec::new(
    "filler",
    RESERVED.end(),
    METADATA_SIZE - VALID_METADATA_SIZE,
);

/// The metadata schema, in on-disk order
pub const LAYOUT: [FieldSpec; 8] = [
    ENC_SIZE, RAW_SIZE, PAD_SIZE, IV, DIGEST, SIGNATURE, RESERVED, FILLER,
];

/// Total size of the metadata block
pub const METADATA_SIZE: usize = 256;
/// Bytes of the block that carry meaning; the rest is filler
pub const VALID_METADATA_SIZE: usize = 140;

pub const IV_SIZE: usize = 16;
pub const DIGEST_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;

const RESERVED_BYTE: u8 = 0x00;
const FILLER_BYTE: u8 = 0xFF;

const fn layout_is_contiguous() -> bool {
    let mut i = 1;
    while i < LAYOUT.len() {
        if LAYOUT[i].offset != LAYOUT[i - 1].end() {
            return false;
        }
        i += 1;
    }
    LAYOUT[0].offset == 0
}

const _: () = assert!(VALID_METADATA_SIZE <= METADATA_SIZE);
const _: () = assert!(RESERVED.end() == VALID_METADATA_SIZE);
const _: () = assert!(FILLER.end() == METADATA_SIZE);
const _: () = assert!(layout_is_contiguous());

/// Metadata codec errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// A field handed to the encoder has the wrong fixed length
    #[error("Cannot encode field '{field}': expected {expected} bytes, got {got}")]
    Encoding {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    /// The encrypted size is smaller than the raw size, so no pad size exists
    #[error("Cannot encode sizes: raw_size {raw_size} exceeds enc_size {enc_size}")]
    SizeOrder { enc_size: u32, raw_size: u32 },

    /// The decoder was handed something other than a full block
    #[error("Cannot decode metadata: expected {expected} bytes, got {got}")]
    Decoding { expected: usize, got: usize },
}

/// Structured view of the metadata block
///
/// Values are whatever the block says; decoding does not check that they
/// make sense together. That is the verifier's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    pub enc_size: u32,
    pub raw_size: u32,
    pub pad_size: u32,
    #[serde(serialize_with = "hex::serde::serialize")]
    pub iv: [u8; IV_SIZE],
    #[serde(serialize_with = "hex::serde::serialize")]
    pub digest: [u8; DIGEST_SIZE],
    #[serde(serialize_with = "hex::serde::serialize")]
    pub signature: [u8; SIGNATURE_SIZE],
}

impl ImageMetadata {
    /// Build metadata from loosely typed inputs, checking every fixed width
    ///
    /// `pad_size` is always derived as `enc_size - raw_size`.
    pub fn new(
        enc_size: u32,
        raw_size: u32,
        iv: &[u8],
        digest: &[u8],
        signature: &[u8],
    ) -> Result<Self, MetadataError> {
        let pad_size = enc_size
            .checked_sub(raw_size)
            .ok_or(MetadataError::SizeOrder { enc_size, raw_size })?;

        Ok(Self {
            enc_size,
            raw_size,
            pad_size,
            iv: fixed(&IV, iv)?,
            digest: fixed(&DIGEST, digest)?,
            signature: fixed(&SIGNATURE, signature)?,
        })
    }

    /// Serialize into the 256-byte on-disk block
    pub fn encode(&self) -> [u8; METADATA_SIZE] {
        let mut block = [FILLER_BYTE; METADATA_SIZE];

        put_u32_le(&mut block, ENC_SIZE.range(), self.enc_size);
        put_u32_le(&mut block, RAW_SIZE.range(), self.raw_size);
        put_u32_le(&mut block, PAD_SIZE.range(), self.pad_size);
        block[IV.range()].copy_from_slice(&self.iv);
        block[DIGEST.range()].copy_from_slice(&self.digest);
        block[SIGNATURE.range()].copy_from_slice(&self.signature);
        block[RESERVED.range()].fill(RESERVED_BYTE);

        block
    }

    /// Parse a 256-byte block
    ///
    /// Reserved and filler bytes are not inspected.
    pub fn decode(block: &[u8]) -> Result<Self, MetadataError> {
        if block.len() != METADATA_SIZE {
            return Err(MetadataError::Decoding {
                expected: METADATA_SIZE,
                got: block.len(),
            });
        }

        Ok(Self {
            enc_size: get_u32_le(block, ENC_SIZE.range()),
            raw_size: get_u32_le(block, RAW_SIZE.range()),
            pad_size: get_u32_le(block, PAD_SIZE.range()),
            iv: get_array(block, IV.range()),
            digest: get_array(block, DIGEST.range()),
            signature: get_array(block, SIGNATURE.range()),
        })
    }
}

impl BinaryRead for ImageMetadata {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let block: [u8; METADATA_SIZE] = read_array(reader)?;
        Self::decode(&block).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl BinaryWrite for ImageMetadata {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.encode())
    }

    fn serialized_size(&self) -> usize {
        METADATA_SIZE
    }
}

impl fmt::Display for ImageMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Enc firmware size : {} bytes", self.enc_size)?;
        writeln!(f, "  Raw firmware size : {} bytes", self.raw_size)?;
        writeln!(f, "  Pad size          : {} bytes", self.pad_size)?;
        writeln!(f, "  AES IV            : {}", hex::encode(self.iv))?;
        writeln!(f, "  SHA-256           : {}", hex::encode(self.digest))?;
        write!(f, "  ECDSA signature   : {}", hex::encode(self.signature))
    }
}

fn fixed<const N: usize>(field: &FieldSpec, bytes: &[u8]) -> Result<[u8; N], MetadataError> {
    bytes.try_into().map_err(|_| MetadataError::Encoding {
        field: field.name,
        expected: field.width,
        got: bytes.len(),
    })
}
