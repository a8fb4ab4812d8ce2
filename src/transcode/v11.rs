//! Fast layout-2 → layout-1 transcoder
//!
//! Supported input: layout-2, unphased, 8 bits per probability, all
//! variants biallelic and all samples diploid. Instead of a full decode,
//! each sample's two packed bytes index a precomputed table mapping the
//! 16-bit `(x, y)` pair to the 48-bit layout-1 triple
//! `(round(x/255*32768), round(y/255*32768), round((255-x-y)/255*32768))`.

use std::io::Write;

use crate::compress;
use crate::context::{Compression, Context, Layout};
use crate::endian;
use crate::error::{ProbabilityError, Result, TranscodeError};
use crate::variant;
use crate::view::View;

/// Builds the 16-bit key → 48-bit triple encoding table.
///
/// Keys with `x + y > 255` cannot occur in well-formed input and map to
/// zero.
#[must_use]
pub fn probability_encoding_table() -> Vec<u64> {
    let mut table = vec![0u64; 65536];
    for x in 0u16..=255 {
        for y in 0..=(255 - x) {
            let z = 255 - x - y;
            let key = (y << 8) | x;
            let a = (f64::from(x) / 255.0 * 32768.0).round() as u64;
            let b = (f64::from(y) / 255.0 * 32768.0).round() as u64;
            let c = (f64::from(z) / 255.0 * 32768.0).round() as u64;
            table[key as usize] = a | (b << 16) | (c << 32);
        }
    }
    table
}

/// Transcodes every variant the view serves into a layout-1 stream.
///
/// The output header carries the input's sample count and free data,
/// with flags forced to layout 1 + zlib and no sample-identifier block.
/// Returns the number of variants written.
pub fn transcode_v11<W, F>(
    view: &mut View,
    out: &mut W,
    compression_level: u32,
    mut progress: F,
) -> Result<u64>
where
    W: Write,
    F: FnMut(u64, u64),
{
    if view.context().layout != Layout::V2 {
        return Err(TranscodeError::RequiresLayout2.into());
    }

    let output_context = Context {
        layout: Layout::V1,
        compression: Compression::Zlib,
        has_sample_identifiers: false,
        number_of_samples: view.context().number_of_samples,
        number_of_variants: view.number_of_variants(),
        free_data: view.context().free_data.clone(),
    };
    crate::context::write_offset(out, output_context.header_size())?;
    crate::context::write_header_block(out, &output_context)?;

    let table = probability_encoding_table();
    let number_of_samples = output_context.number_of_samples as usize;
    let mut serialisation = vec![0u8; 6 * number_of_samples];
    let mut id_data = Vec::new();

    let total = u64::from(view.number_of_variants());
    let mut count = 0u64;
    while let Some(v) = view.read_variant()? {
        if v.number_of_alleles() != 2 {
            return Err(TranscodeError::RequiresBiallelic(v.number_of_alleles()).into());
        }

        id_data.clear();
        variant::write_snp_identifying_data(
            &mut id_data,
            &output_context,
            &v.snp_id,
            &v.rsid,
            &v.chromosome,
            v.position,
            2,
            |i| v.alleles[i].clone(),
        )?;

        let block = view.read_and_unpack_v2_genotype_data_block()?;
        if block.bits != 8 {
            return Err(TranscodeError::RequiresEightBits(block.bits).into());
        }
        if block.phased {
            return Err(TranscodeError::RequiresUnphased.into());
        }
        let [min_ploidy, max_ploidy] = block.ploidy_extent;
        if min_ploidy != 2 || max_ploidy != 2 {
            return Err(TranscodeError::RequiresDiploid(min_ploidy, max_ploidy).into());
        }
        if block.buffer.len() < 2 * number_of_samples {
            return Err(ProbabilityError::BufferOverrun {
                needed: 2 * number_of_samples,
                have: block.buffer.len(),
            }
            .into());
        }

        for (i, &ploidy_byte) in block.ploidy.iter().enumerate() {
            let slot = &mut serialisation[6 * i..6 * i + 6];
            if ploidy_byte & 0x80 != 0 {
                slot.fill(0);
            } else {
                let key = u16::from_le_bytes([block.buffer[2 * i], block.buffer[2 * i + 1]]);
                let value = table[key as usize];
                slot.copy_from_slice(&value.to_le_bytes()[..6]);
            }
        }

        let compressed = compress::zlib_compress(&serialisation, compression_level)?;
        endian::write_bytes(out, &id_data)?;
        endian::write_u32(out, compressed.len() as u32)?;
        endian::write_bytes(out, &compressed)?;

        count += 1;
        progress(count, total);
    }
    Ok(count)
}
