//! Little-endian wire primitives
//!
//! Every multi-byte integer in the container format is little-endian on
//! disk regardless of host. This module wraps the fixed-width reads and
//! writes plus the two length-prefixed string shapes the format uses
//! (`u16`-counted for identifiers, `u32`-counted for alleles).

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{ReadError, Result, WriteError};

/// Fills `buf` from the reader, mapping a short read to [`ReadError::TruncatedInput`].
pub fn read_bytes<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ReadError::TruncatedInput { needed: buf.len() }.into()
        } else {
            crate::Error::Io(e)
        }
    })
}

fn map_read(e: io::Error, width: usize) -> crate::Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ReadError::TruncatedInput { needed: width }.into()
    } else {
        crate::Error::Io(e)
    }
}

fn map_write(e: io::Error) -> crate::Error {
    WriteError::WriteFailed(e).into()
}

pub fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    reader.read_u8().map_err(|e| map_read(e, 1))
}

pub fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    reader.read_u16::<LittleEndian>().map_err(|e| map_read(e, 2))
}

pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    reader.read_u32::<LittleEndian>().map_err(|e| map_read(e, 4))
}

pub fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    reader.read_u64::<LittleEndian>().map_err(|e| map_read(e, 8))
}

pub fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    reader.read_i32::<LittleEndian>().map_err(|e| map_read(e, 4))
}

pub fn read_i64<R: Read>(reader: &mut R) -> Result<i64> {
    reader.read_i64::<LittleEndian>().map_err(|e| map_read(e, 8))
}

pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> Result<()> {
    writer.write_u8(value).map_err(map_write)
}

pub fn write_u16<W: Write>(writer: &mut W, value: u16) -> Result<()> {
    writer.write_u16::<LittleEndian>(value).map_err(map_write)
}

pub fn write_u32<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_u32::<LittleEndian>(value).map_err(map_write)
}

pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> Result<()> {
    writer.write_u64::<LittleEndian>(value).map_err(map_write)
}

pub fn write_i32<W: Write>(writer: &mut W, value: i32) -> Result<()> {
    writer.write_i32::<LittleEndian>(value).map_err(map_write)
}

pub fn write_i64<W: Write>(writer: &mut W, value: i64) -> Result<()> {
    writer.write_i64::<LittleEndian>(value).map_err(map_write)
}

pub fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    writer.write_all(bytes).map_err(map_write)
}

/// Reads a string preceded by a `u16` byte count.
pub fn read_u16_prefixed_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_u16(reader)? as usize;
    let mut buf = vec![0u8; len];
    read_bytes(reader, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Writes a string preceded by a `u16` byte count.
///
/// Returns the number of bytes written.
pub fn write_u16_prefixed_string<W: Write>(writer: &mut W, value: &str) -> Result<usize> {
    write_u16(writer, value.len() as u16)?;
    write_bytes(writer, value.as_bytes())?;
    Ok(2 + value.len())
}

/// Reads a string preceded by a `u32` byte count (allele dialect).
pub fn read_u32_prefixed_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_u32(reader)? as usize;
    let mut buf = vec![0u8; len];
    read_bytes(reader, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Writes a string preceded by a `u32` byte count (allele dialect).
///
/// Returns the number of bytes written.
pub fn write_u32_prefixed_string<W: Write>(writer: &mut W, value: &str) -> Result<usize> {
    write_u32(writer, value.len() as u32)?;
    write_bytes(writer, value.as_bytes())?;
    Ok(4 + value.len())
}
