//! Output transcoders
//!
//! Three ways out of a BGEN file: a fast layout-2 → layout-1 rewrite
//! ([`v11`]), VCF text ([`vcf`]), and the no-transcode path here, which
//! serves a query by copying raw byte ranges without ever touching a
//! probability payload.

pub mod v11;
pub mod vcf;

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::context;
use crate::error::Result;
use crate::index::query::Plan;

/// Copies the planned byte ranges verbatim, preceded by the original
/// header with its variant count overwritten to the plan's size.
///
/// This is the common case and pays no decode cost: the header is
/// re-encoded, the sample-identifier block and every variant are
/// byte-for-byte copies.
pub fn copy_selected<W, F>(
    bgen_path: &Path,
    plan: &Plan,
    out: &mut W,
    mut progress: F,
) -> Result<u64>
where
    W: Write,
    F: FnMut(u64, u64),
{
    let mut file = BufReader::new(File::open(bgen_path)?);
    let offset = context::read_offset(&mut file)?;
    let (mut ctx, header_size) = context::read_header_block(&mut file)?;

    ctx.number_of_variants = plan.number_of_variants() as u32;
    context::write_offset(out, offset)?;
    context::write_header_block(out, &ctx)?;

    // everything between the header and the variant stream (the
    // sample-identifier block, if any) is copied untouched
    io::copy(
        &mut file.by_ref().take(u64::from(offset) - header_size as u64),
        out,
    )?;

    let total = plan.number_of_variants() as u64;
    for (i, (file_start, length)) in plan.iter().enumerate() {
        file.seek(SeekFrom::Start(file_start))?;
        io::copy(&mut file.by_ref().take(length), out)?;
        progress(i as u64 + 1, total);
    }
    Ok(total)
}
