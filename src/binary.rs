//! Binary serialization infrastructure for the image container
//!
//! This module provides traits and helpers for reading and writing the
//! fixed-layout structures of a firmware image. All multi-byte integers
//! use little-endian byte order, which is what the bootloader expects.

use std::io::{self, Read, Write};
use std::ops::Range;

/// Trait for types that can be read from binary format
pub trait BinaryRead: Sized {
    /// Read this type from a binary reader
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self>;
}

/// Trait for types that can be written to binary format
pub trait BinaryWrite {
    /// Write this type to a binary writer
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    /// Get the size in bytes when serialized
    fn serialized_size(&self) -> usize;
}

/// Read a u32 (little-endian) from a byte range of `block`
///
/// Panics if `range` is not exactly four bytes inside `block`; callers pass
/// ranges from the compile-time checked metadata layout.
pub fn get_u32_le(block: &[u8], range: Range<usize>) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&block[range]);
    u32::from_le_bytes(buf)
}

/// Write a u32 (little-endian) into a byte range of `block`
pub fn put_u32_le(block: &mut [u8], range: Range<usize>, value: u32) {
    block[range].copy_from_slice(&value.to_le_bytes());
}

/// Copy a fixed-size array out of a byte range of `block`
pub fn get_array<const N: usize>(block: &[u8], range: Range<usize>) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&block[range]);
    out
}

/// Read exactly N bytes from a reader
pub fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Write bytes to a writer
pub fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes)
}
