//! Container header codec
//!
//! The file begins with a `u32 offset` (distance from the end of that
//! field to the first variant), followed by the header block:
//!
//! ```text
//! u32 header_size             = 20 + |free_data|
//! u32 number_of_variants
//! u32 number_of_samples
//! 4 bytes magic               "bgen" (all-zero accepted on read)
//! free_data[header_size - 20]
//! u32 flags                   bits 0-1 compression, 2-5 layout, 31 sample ids
//! ```
//!
//! A [`Context`] is the decoded header; it is immutable for the life of a
//! reader, except that a filtered rewrite overwrites `number_of_variants`.

use std::io::{Read, Write};

use crate::endian;
use crate::error::{HeaderError, Result};

/// Magic bytes written into every header
pub const MAGIC: [u8; 4] = *b"bgen";

/// Fixed portion of the header block, in bytes
pub const FIXED_HEADER_SIZE: u32 = 20;

const COMPRESSION_MASK: u32 = 0x3;
const LAYOUT_SHIFT: u32 = 2;
const LAYOUT_MASK: u32 = 0xF << LAYOUT_SHIFT;
const SAMPLE_IDENTIFIERS: u32 = 1 << 31;

/// On-disk dialect of the variant and probability blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// 16-bit probabilities, biallelic diploid only
    V1,
    /// Bit-packed probabilities, arbitrary ploidy and allele count
    V2,
}

impl Layout {
    fn from_flags(flags: u32) -> Result<Self> {
        match (flags & LAYOUT_MASK) >> LAYOUT_SHIFT {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(HeaderError::UnsupportedLayout(other).into()),
        }
    }

    fn to_bits(self) -> u32 {
        let value = match self {
            Self::V1 => 1,
            Self::V2 => 2,
        };
        value << LAYOUT_SHIFT
    }
}

/// Compression applied to each variant's probability payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zlib,
    Zstd,
}

impl Compression {
    fn from_flags(flags: u32) -> Result<Self> {
        match flags & COMPRESSION_MASK {
            0 => Ok(Self::None),
            1 => Ok(Self::Zlib),
            2 => Ok(Self::Zstd),
            other => Err(HeaderError::UnsupportedCompression(other).into()),
        }
    }

    fn to_bits(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Zlib => 1,
            Self::Zstd => 2,
        }
    }
}

/// Decoded header block, read-only after construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    pub layout: Layout,
    pub compression: Compression,
    pub has_sample_identifiers: bool,
    /// Fixed once the file is written; every variant encodes this many samples
    pub number_of_samples: u32,
    /// Advisory count; overwritten when producing a filtered output
    pub number_of_variants: u32,
    /// Opaque payload between the fixed header fields and the flags word
    pub free_data: Vec<u8>,
}

impl Context {
    /// Size of the header block in bytes, a function of the free data
    #[must_use]
    pub fn header_size(&self) -> u32 {
        FIXED_HEADER_SIZE + self.free_data.len() as u32
    }

    /// Assembles the flags word from the decomposed fields
    #[must_use]
    pub fn flags(&self) -> u32 {
        let mut flags = self.compression.to_bits() | self.layout.to_bits();
        if self.has_sample_identifiers {
            flags |= SAMPLE_IDENTIFIERS;
        }
        flags
    }
}

/// Reads the `u32 offset` field at the start of the file.
pub fn read_offset<R: Read>(reader: &mut R) -> Result<u32> {
    endian::read_u32(reader)
}

/// Writes the `u32 offset` field at the start of the file.
pub fn write_offset<W: Write>(writer: &mut W, offset: u32) -> Result<()> {
    endian::write_u32(writer, offset)
}

/// Decodes a header block, returning the context and the bytes consumed.
pub fn read_header_block<R: Read>(reader: &mut R) -> Result<(Context, usize)> {
    let header_size = endian::read_u32(reader)?;
    if header_size < FIXED_HEADER_SIZE {
        return Err(HeaderError::InvalidHeaderSize(header_size).into());
    }
    let number_of_variants = endian::read_u32(reader)?;
    let number_of_samples = endian::read_u32(reader)?;

    let mut magic = [0u8; 4];
    endian::read_bytes(reader, &mut magic)?;
    if magic != MAGIC && magic != [0u8; 4] {
        return Err(HeaderError::InvalidMagic(magic).into());
    }

    let mut free_data = vec![0u8; (header_size - FIXED_HEADER_SIZE) as usize];
    endian::read_bytes(reader, &mut free_data)?;

    let flags = endian::read_u32(reader)?;
    let layout = Layout::from_flags(flags)?;
    let compression = Compression::from_flags(flags)?;
    let known = COMPRESSION_MASK | LAYOUT_MASK | SAMPLE_IDENTIFIERS;
    if flags & !known != 0 {
        return Err(HeaderError::ReservedFlagBits(flags & !known).into());
    }

    let context = Context {
        layout,
        compression,
        has_sample_identifiers: flags & SAMPLE_IDENTIFIERS != 0,
        number_of_samples,
        number_of_variants,
        free_data,
    };
    Ok((context, header_size as usize))
}

/// Encodes a header block, returning the bytes written.
pub fn write_header_block<W: Write>(writer: &mut W, context: &Context) -> Result<usize> {
    let header_size = context.header_size();
    endian::write_u32(writer, header_size)?;
    endian::write_u32(writer, context.number_of_variants)?;
    endian::write_u32(writer, context.number_of_samples)?;
    endian::write_bytes(writer, &MAGIC)?;
    endian::write_bytes(writer, &context.free_data)?;
    endian::write_u32(writer, context.flags())?;
    Ok(header_size as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn context() -> Context {
        Context {
            layout: Layout::V2,
            compression: Compression::Zlib,
            has_sample_identifiers: true,
            number_of_samples: 500,
            number_of_variants: 199,
            free_data: b"free text".to_vec(),
        }
    }

    #[test]
    fn test_header_round_trip() {
        let original = context();
        let mut buf = Vec::new();
        let written = write_header_block(&mut buf, &original).unwrap();
        assert_eq!(written, 20 + original.free_data.len());
        assert_eq!(buf.len(), written);

        let (decoded, consumed) = read_header_block(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_header_size_tracks_free_data() {
        let mut ctx = context();
        assert_eq!(ctx.header_size(), 29);
        ctx.free_data.clear();
        assert_eq!(ctx.header_size(), 20);
    }

    #[test]
    fn test_flags_word_layout() {
        let ctx = context();
        // zlib = 1, layout 2 at bits 2-5, sample ids at bit 31
        assert_eq!(ctx.flags(), 1 | (2 << 2) | (1 << 31));
    }

    #[test]
    fn test_zero_magic_accepted() {
        let mut buf = Vec::new();
        write_header_block(&mut buf, &context()).unwrap();
        buf[12..16].fill(0);
        assert!(read_header_block(&mut Cursor::new(&buf)).is_ok());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = Vec::new();
        write_header_block(&mut buf, &context()).unwrap();
        buf[12..16].copy_from_slice(b"vcf!");
        let err = read_header_block(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Header(HeaderError::InvalidMagic(_))
        ));
    }

    #[test]
    fn test_unknown_layout_rejected() {
        let ctx = Context {
            free_data: Vec::new(),
            ..context()
        };
        let mut buf = Vec::new();
        write_header_block(&mut buf, &ctx).unwrap();
        // overwrite flags with layout value 5
        buf[16..20].copy_from_slice(&(5u32 << 2 | 1).to_le_bytes());
        let err = read_header_block(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Header(HeaderError::UnsupportedLayout(5))
        ));
    }

    #[test]
    fn test_unknown_compression_rejected() {
        let ctx = Context {
            free_data: Vec::new(),
            ..context()
        };
        let mut buf = Vec::new();
        write_header_block(&mut buf, &ctx).unwrap();
        buf[16..20].copy_from_slice(&(3u32 | (2 << 2)).to_le_bytes());
        let err = read_header_block(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Header(HeaderError::UnsupportedCompression(3))
        ));
    }

    #[test]
    fn test_reserved_bits_rejected() {
        let ctx = Context {
            free_data: Vec::new(),
            ..context()
        };
        let mut buf = Vec::new();
        write_header_block(&mut buf, &ctx).unwrap();
        buf[16..20].copy_from_slice(&((2u32 << 2) | 1 | (1 << 10)).to_le_bytes());
        let err = read_header_block(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Header(HeaderError::ReservedFlagBits(_))
        ));
    }

    #[test]
    fn test_offset_round_trip() {
        let mut buf = Vec::new();
        write_offset(&mut buf, 9_000).unwrap();
        assert_eq!(read_offset(&mut Cursor::new(&buf)).unwrap(), 9_000);
    }
}
