//! Multi-file concatenation
//!
//! Copies the first file whole, then appends the post-header stream of
//! each further file after checking that its sample count and flags
//! match. The output header is rewritten in place at the end with the
//! summed variant count.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::context::{self, Context};
use crate::error::{HeaderError, Result};

/// Header adjustments applied to the output before copying
#[derive(Debug, Clone, Default)]
pub struct CatOptions {
    /// Replace the free data carried over from the first file
    pub set_free_data: Option<Vec<u8>>,
    /// Drop the first file's sample-identifier block from the output
    pub omit_sample_identifier_block: bool,
}

/// Concatenates `inputs` into `output_path`, returning the output's
/// final context.
pub fn concatenate(
    inputs: &[PathBuf],
    output_path: &Path,
    options: &CatOptions,
) -> Result<Context> {
    if inputs.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "no input files").into());
    }

    let mut out = BufWriter::new(File::create(output_path)?);

    // first file: keep its header, adjusted per the options
    let mut first = BufReader::new(File::open(&inputs[0])?);
    let mut offset = context::read_offset(&mut first)?;
    let (mut result, _) = context::read_header_block(&mut first)?;

    log::info!(
        "Adding file \"{}\" (1 of {}, {} variants)",
        inputs[0].display(),
        inputs.len(),
        result.number_of_variants
    );

    if options.omit_sample_identifier_block {
        result.has_sample_identifiers = false;
        first.seek(SeekFrom::Start(u64::from(offset) + 4))?;
        offset = result.header_size();
    }
    if let Some(free_data) = &options.set_free_data {
        offset = offset + free_data.len() as u32 - result.free_data.len() as u32;
        result.free_data = free_data.clone();
    }

    context::write_offset(&mut out, offset)?;
    context::write_header_block(&mut out, &result)?;
    io::copy(&mut first, &mut out)?;
    drop(first);

    for (i, input) in inputs.iter().enumerate().skip(1) {
        let mut file = BufReader::new(File::open(input)?);
        let offset = context::read_offset(&mut file)?;
        let (ctx, _) = context::read_header_block(&mut file)?;

        log::info!(
            "Adding file \"{}\" ({} of {}, {} variants)",
            input.display(),
            i + 1,
            inputs.len(),
            ctx.number_of_variants
        );

        if ctx.number_of_samples != result.number_of_samples {
            return Err(HeaderError::IncompatibleSampleCount {
                filename: input.display().to_string(),
                expected: result.number_of_samples,
                got: ctx.number_of_samples,
            }
            .into());
        }
        if ctx.flags() != result.flags() {
            return Err(HeaderError::IncompatibleFlags {
                filename: input.display().to_string(),
                expected: result.flags(),
                got: ctx.flags(),
            }
            .into());
        }

        // skip to the variant stream and append it whole
        file.seek(SeekFrom::Start(u64::from(offset) + 4))?;
        io::copy(&mut file, &mut out)?;

        result.number_of_variants += ctx.number_of_variants;
    }

    // fix the variant count; the header starts at byte 4
    out.flush()?;
    let mut file = out.into_inner().map_err(|e| e.into_error())?;
    file.seek(SeekFrom::Start(4))?;
    context::write_header_block(&mut file, &result)?;
    file.flush()?;
    Ok(result)
}
