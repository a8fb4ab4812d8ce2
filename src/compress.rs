//! Compression codec
//!
//! Stateless zlib and zstd wrappers over byte buffers. The container
//! always records the decompressed size next to a compressed payload, so
//! every decompression verifies the decoded length against it.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::context::Compression;
use crate::error::{CompressionError, Result};

/// Compresses `bytes` with zlib at the given level (0..=9).
pub fn zlib_compress(bytes: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::new(level));
    encoder
        .write_all(bytes)
        .and_then(|()| encoder.finish())
        .map_err(|e| CompressionError::Codec(e.to_string()).into())
}

/// Inflates a zlib payload, verifying the decoded length.
pub fn zlib_decompress(bytes: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut out = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CompressionError::Codec(e.to_string()))?;
    check_length(out, expected_size)
}

/// Compresses `bytes` with zstd at the given level.
pub fn zstd_compress(bytes: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::stream::encode_all(bytes, level)
        .map_err(|e| CompressionError::Codec(e.to_string()).into())
}

/// Decompresses a zstd payload, verifying the decoded length.
pub fn zstd_decompress(bytes: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let out = zstd::stream::decode_all(bytes)
        .map_err(|e| CompressionError::Codec(e.to_string()))?;
    check_length(out, expected_size)
}

fn check_length(out: Vec<u8>, expected_size: usize) -> Result<Vec<u8>> {
    if out.len() != expected_size {
        return Err(CompressionError::LengthMismatch {
            expected: expected_size,
            got: out.len(),
        }
        .into());
    }
    Ok(out)
}

/// Compresses through the codec named in the header flags.
///
/// `Compression::None` passes the buffer through unchanged.
pub fn compress(kind: Compression, bytes: &[u8], level: u32) -> Result<Vec<u8>> {
    match kind {
        Compression::None => Ok(bytes.to_vec()),
        Compression::Zlib => zlib_compress(bytes, level),
        Compression::Zstd => zstd_compress(bytes, level as i32),
    }
}

/// Decompresses through the codec named in the header flags.
pub fn decompress(kind: Compression, bytes: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    match kind {
        Compression::None => check_length(bytes.to_vec(), expected_size),
        Compression::Zlib => zlib_decompress(bytes, expected_size),
        Compression::Zstd => zstd_decompress(bytes, expected_size),
    }
}
