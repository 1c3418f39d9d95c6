//! Zstandard streaming compressor
//!
//! Data moves through a single buffer of `chunk_size` bytes, so memory use
//! does not grow with the payload beyond the codec's own window. The
//! in-memory [`Compressor`] methods are thin wrappers over the stream ones.

use std::io::{Read, Write};

use tracing::trace;

use super::{CompressionAlgorithm, Compressor, DEFAULT_CHUNK_SIZE};
use crate::error::{Error, Result};

/// Zstandard compressor with a tunable level
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
    chunk_size: usize,
}

impl ZstdCompressor {
    /// Create with the library's default level
    pub fn new() -> Self {
        Self {
            level: zstd::DEFAULT_COMPRESSION_LEVEL,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create with a custom level; see [`zstd::compression_level_range`]
    pub fn with_level(level: i32) -> Result<Self> {
        let range = zstd::compression_level_range();
        if !range.contains(&level) {
            return Err(Error::Config(format!(
                "zstd level must be within {}..={}, got {}",
                range.start(),
                range.end(),
                level
            )));
        }
        Ok(Self {
            level,
            ..Self::new()
        })
    }

    /// Set the streaming buffer size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn corrupt(reason: impl ToString) -> Error {
        Error::corrupt(CompressionAlgorithm::Zstd.name(), reason)
    }

    /// Compress everything `reader` yields into `writer`.
    ///
    /// Returns the writer once the frame is complete, and the number of
    /// input bytes consumed.
    pub fn compress_stream<R: Read, W: Write>(&self, mut reader: R, writer: W) -> Result<(W, u64)> {
        let mut encoder = zstd::stream::write::Encoder::new(writer, self.level)?;
        encoder.include_checksum(true)?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0u64;
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            encoder.write_all(&buf[..n])?;
            total += n as u64;
        }

        let writer = encoder.finish()?;
        trace!(bytes_in = total, level = self.level, "zstd stream compressed");
        Ok((writer, total))
    }

    /// Decompress a zstd stream from `reader` into `writer`.
    ///
    /// Returns the writer and the number of bytes produced. A truncated or
    /// foreign stream is [`Error::CorruptPayload`].
    pub fn decompress_stream<R: Read, W: Write>(&self, reader: R, mut writer: W) -> Result<(W, u64)> {
        let mut decoder = zstd::stream::read::Decoder::new(reader).map_err(Self::corrupt)?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0u64;
        loop {
            let n = decoder.read(&mut buf).map_err(Self::corrupt)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
            total += n as u64;
        }

        trace!(bytes_out = total, "zstd stream decompressed");
        Ok((writer, total))
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for ZstdCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Zstd
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let out = Vec::with_capacity(data.len() / 2 + 32);
        let (out, _) = self.compress_stream(data, out)?;
        Ok(out)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Err(Self::corrupt("empty input"));
        }
        let (out, _) = self.decompress_stream(data, Vec::with_capacity(data.len() * 2))?;
        Ok(out)
    }
}
