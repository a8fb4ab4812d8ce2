//! Variant identifier codec
//!
//! Each variant in the stream opens with an identifying block. The two
//! layout dialects differ in the prefix: layout 1 repeats the sample
//! count and implies exactly two alleles, layout 2 records an explicit
//! `u16` allele count. SNPID, rsid and chromosome carry `u16` length
//! prefixes; alleles carry `u32` prefixes.

use std::io::{self, Read, Write};

use crate::context::{Context, Layout};
use crate::endian;
use crate::error::{ReadError, Result, VariantError};

/// Per-variant identifying tuple
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Variant {
    pub snp_id: String,
    pub rsid: String,
    pub chromosome: String,
    pub position: u32,
    pub alleles: Vec<String>,
}

impl Variant {
    #[must_use]
    pub fn number_of_alleles(&self) -> u16 {
        self.alleles.len() as u16
    }
}

/// Reads `buf.len()` bytes, distinguishing a clean end-of-stream at the
/// first byte (no further variants) from mid-record truncation.
fn read_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(ReadError::TruncatedInput {
                    needed: buf.len() - filled,
                }
                .into())
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Decodes the next variant identifying block.
///
/// Returns `Ok(None)` on a clean end-of-stream at the block boundary.
pub fn read_snp_identifying_data<R: Read>(
    reader: &mut R,
    context: &Context,
) -> Result<Option<Variant>> {
    let snp_id = match context.layout {
        Layout::V1 => {
            let mut count_buf = [0u8; 4];
            if !read_or_eof(reader, &mut count_buf)? {
                return Ok(None);
            }
            let got = u32::from_le_bytes(count_buf);
            if got != context.number_of_samples {
                return Err(VariantError::SampleCountMismatch {
                    expected: context.number_of_samples,
                    got,
                }
                .into());
            }
            endian::read_u16_prefixed_string(reader)?
        }
        Layout::V2 => {
            let mut len_buf = [0u8; 2];
            if !read_or_eof(reader, &mut len_buf)? {
                return Ok(None);
            }
            let len = u16::from_le_bytes(len_buf) as usize;
            let mut buf = vec![0u8; len];
            endian::read_bytes(reader, &mut buf)?;
            String::from_utf8(buf)?
        }
    };

    let rsid = endian::read_u16_prefixed_string(reader)?;
    let chromosome = endian::read_u16_prefixed_string(reader)?;
    let position = endian::read_u32(reader)?;

    let number_of_alleles = match context.layout {
        Layout::V1 => 2,
        Layout::V2 => endian::read_u16(reader)?,
    };
    if number_of_alleles < 2 {
        return Err(VariantError::TooFewAlleles(number_of_alleles).into());
    }

    let mut alleles = Vec::with_capacity(number_of_alleles as usize);
    for _ in 0..number_of_alleles {
        alleles.push(endian::read_u32_prefixed_string(reader)?);
    }

    Ok(Some(Variant {
        snp_id,
        rsid,
        chromosome,
        position,
        alleles,
    }))
}

/// Encodes a variant identifying block in the context's dialect.
///
/// The `allele` callback yields the i-th allele so the caller need not
/// hold them in a collection. Returns the bytes written.
pub fn write_snp_identifying_data<W, F>(
    writer: &mut W,
    context: &Context,
    snp_id: &str,
    rsid: &str,
    chromosome: &str,
    position: u32,
    number_of_alleles: u16,
    mut allele: F,
) -> Result<usize>
where
    W: Write,
    F: FnMut(usize) -> String,
{
    if number_of_alleles < 2 {
        return Err(VariantError::TooFewAlleles(number_of_alleles).into());
    }
    let mut written = 0;
    match context.layout {
        Layout::V1 => {
            if number_of_alleles != 2 {
                return Err(VariantError::InvalidRecord(format!(
                    "layout 1 requires exactly 2 alleles, got {number_of_alleles}"
                ))
                .into());
            }
            endian::write_u32(writer, context.number_of_samples)?;
            written += 4;
        }
        Layout::V2 => {}
    }

    written += endian::write_u16_prefixed_string(writer, snp_id)?;
    written += endian::write_u16_prefixed_string(writer, rsid)?;
    written += endian::write_u16_prefixed_string(writer, chromosome)?;
    endian::write_u32(writer, position)?;
    written += 4;

    if context.layout == Layout::V2 {
        endian::write_u16(writer, number_of_alleles)?;
        written += 2;
    }
    for i in 0..number_of_alleles as usize {
        written += endian::write_u32_prefixed_string(writer, &allele(i))?;
    }
    Ok(written)
}

/// Convenience wrapper serializing an assembled [`Variant`].
pub fn write_variant<W: Write>(
    writer: &mut W,
    context: &Context,
    variant: &Variant,
) -> Result<usize> {
    write_snp_identifying_data(
        writer,
        context,
        &variant.snp_id,
        &variant.rsid,
        &variant.chromosome,
        variant.position,
        variant.number_of_alleles(),
        |i| variant.alleles[i].clone(),
    )
}
