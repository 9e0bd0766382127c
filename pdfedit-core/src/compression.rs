//! Flate (zlib) helpers for stream bodies

use crate::error::{PdfError, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compress with the default zlib level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    compress_with_level(data, Compression::default())
}

pub fn compress_with_level(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level);
    encoder.write_all(data).map_err(PdfError::Io)?;
    encoder.finish().map_err(PdfError::Io)
}

/// Strict zlib decompression.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(PdfError::Io)?;
    Ok(decompressed)
}

/// Decompression for bodies found in the wild.
///
/// Producers regularly write zlib streams with a broken checksum or a
/// truncated tail, and a few omit the zlib header entirely. Whatever could be
/// inflated before the error is returned; raw deflate is tried when the zlib
/// header is unusable. Fails only when nothing at all could be recovered.
pub fn decompress_lenient(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut output = Vec::new();
    let zlib_error = match ZlibDecoder::new(data).read_to_end(&mut output) {
        Ok(_) => return Ok(output),
        Err(e) => e,
    };
    if !output.is_empty() {
        tracing::debug!("Flate stream ended early ({zlib_error}); keeping {} bytes", output.len());
        return Ok(output);
    }

    let mut raw = Vec::new();
    match DeflateDecoder::new(data).read_to_end(&mut raw) {
        Ok(_) => Ok(raw),
        Err(_) if !raw.is_empty() => Ok(raw),
        Err(_) => Err(zlib_error),
    }
}
