//! In-place header edits
//!
//! Both operations rewrite bytes inside an existing file without moving
//! anything: the free-data field is overwritten at its fixed position,
//! and sample-identifier removal clears the flag bit and zeroes the
//! identifier block. A dry run performs every check but writes nothing.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::context;
use crate::endian;
use crate::error::{HeaderError, Result};

/// Overwrites the free-data field with `new_value`.
///
/// The replacement must have exactly the length of the existing free
/// data, so the header size and every later byte stay put.
pub fn edit_free_data(path: &Path, new_value: &[u8], really: bool) -> Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    file.seek(SeekFrom::Start(4))?;
    let (ctx, _) = context::read_header_block(&mut file)?;
    if ctx.free_data.len() != new_value.len() {
        return Err(HeaderError::FreeDataSizeMismatch {
            expected: ctx.free_data.len(),
            got: new_value.len(),
        }
        .into());
    }

    if really {
        // free data always starts at byte 20
        file.seek(SeekFrom::Start(20))?;
        endian::write_bytes(&mut file, new_value)?;
        file.flush()?;
    }
    Ok(())
}

/// Clears the sample-identifier flag and zeroes the identifier block.
///
/// Returns `true` if the file carried identifiers (i.e. an edit was
/// performed or would be performed), `false` for a no-op.
pub fn remove_sample_identifiers(path: &Path, really: bool) -> Result<bool> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let offset = context::read_offset(&mut file)?;
    let (mut ctx, header_size) = context::read_header_block(&mut file)?;

    if !ctx.has_sample_identifiers {
        return Ok(false);
    }

    if really {
        ctx.has_sample_identifiers = false;
        file.seek(SeekFrom::Start(4))?;
        context::write_header_block(&mut file, &ctx)?;

        let zeros = vec![0u8; offset as usize - header_size];
        file.seek(SeekFrom::Start(header_size as u64 + 4))?;
        endian::write_bytes(&mut file, &zeros)?;
        file.flush()?;
    }
    Ok(true)
}
