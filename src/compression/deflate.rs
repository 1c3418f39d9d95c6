//! gzip compressor

use std::io::{Read, Write};

use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::{CompressionAlgorithm, Compressor};
use crate::error::{Error, Result};

/// gzip compressor (deflate with CRC-checked framing)
#[derive(Debug, Clone, Copy)]
pub struct DeflateCompressor {
    level: u32,
}

impl DeflateCompressor {
    /// Create new gzip compressor with default settings
    pub fn new() -> Self {
        Self { level: 6 }
    }

    /// Create with custom compression level (0-9)
    pub fn with_level(level: i32) -> Result<Self> {
        if !(0..=9).contains(&level) {
            return Err(Error::Config(format!(
                "gzip level must be within 0..=9, got {}",
                level
            )));
        }
        Ok(Self {
            level: level as u32,
        })
    }
}

impl Default for DeflateCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for DeflateCompressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Gzip
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(
            Vec::with_capacity(data.len() / 2 + 32),
            Compression::new(self.level),
        );
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut rest = data;
        let mut out = Vec::with_capacity(data.len() * 2);
        GzDecoder::new(&mut rest)
            .read_to_end(&mut out)
            .map_err(|e| Error::corrupt(CompressionAlgorithm::Gzip.name(), e))?;

        // the decoder stops after one member
        if !rest.is_empty() {
            return Err(Error::corrupt(
                CompressionAlgorithm::Gzip.name(),
                format!("{} trailing bytes after gzip member", rest.len()),
            ));
        }
        Ok(out)
    }
}
