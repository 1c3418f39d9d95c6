//! LZ4 block compressor

use lz4::block::CompressionMode;

use super::{CompressionAlgorithm, Compressor};
use crate::error::{Error, Result};

/// Size of the little-endian length prefix written before each block
const SIZE_PREFIX_LEN: usize = 4;

/// Upper bound of the LZ4 expansion ratio, used to reject absurd size prefixes
const MAX_EXPANSION: usize = 255;

/// Maximum level accepted by LZ4 high-compression mode
pub const LZ4_MAX_LEVEL: i32 = 12;

/// LZ4 compressor (fast compression)
#[derive(Debug, Clone, Copy)]
pub struct Lz4Compressor {
    /// `None` selects the fast mode
    level: Option<i32>,
}

impl Lz4Compressor {
    /// Create new LZ4 compressor in fast mode
    pub fn new() -> Self {
        Self { level: None }
    }

    /// Create in high-compression mode with a level of 1-12
    pub fn high_compression(level: i32) -> Result<Self> {
        if !(1..=LZ4_MAX_LEVEL).contains(&level) {
            return Err(Error::Config(format!(
                "lz4 level must be within 1..={}, got {}",
                LZ4_MAX_LEVEL, level
            )));
        }
        Ok(Self { level: Some(level) })
    }

    fn mode(&self) -> Option<CompressionMode> {
        self.level.map(CompressionMode::HIGHCOMPRESSION)
    }

    fn corrupt(reason: impl ToString) -> Error {
        Error::corrupt(CompressionAlgorithm::Lz4.name(), reason)
    }
}

impl Default for Lz4Compressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for Lz4Compressor {
    fn algorithm(&self) -> CompressionAlgorithm {
        CompressionAlgorithm::Lz4
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::compress(data, self.mode(), true).map_err(|e| Error::CompressionFailed {
            algorithm: CompressionAlgorithm::Lz4.name().into(),
            reason: e.to_string(),
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < SIZE_PREFIX_LEN {
            return Err(Self::corrupt("missing size prefix"));
        }

        let declared = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let body = data.len() - SIZE_PREFIX_LEN;
        if declared < 0 || declared as usize > body.saturating_mul(MAX_EXPANSION) {
            return Err(Self::corrupt(format!(
                "declared size {} impossible for {} compressed bytes",
                declared, body
            )));
        }

        let out = lz4::block::decompress(data, None).map_err(Self::corrupt)?;
        if out.len() != declared as usize {
            return Err(Self::corrupt(format!(
                "expected {} bytes, decoded {}",
                declared,
                out.len()
            )));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_DATA: &[u8] = b"Hello, this is test data that should compress well. \
        It has some repetition: Hello, this is test data that should compress well.";

    #[test]
    fn test_lz4_roundtrip() {
        let compressor = Lz4Compressor::new();

        let compressed = compressor.compress(TEST_DATA).unwrap();
        assert!(compressed.len() < TEST_DATA.len());

        let decompressed = compressor.decompress(&compressed).unwrap();
        assert_eq!(decompressed, TEST_DATA);
    }

    #[test]
    fn test_high_compression_roundtrip() {
        let compressor = Lz4Compressor::high_compression(9).unwrap();
        let compressed = compressor.compress(TEST_DATA).unwrap();
        assert_eq!(compressor.decompress(&compressed).unwrap(), TEST_DATA);
    }

    #[test]
    fn test_absurd_size_prefix_rejected() {
        let mut bogus = i32::MAX.to_le_bytes().to_vec();
        bogus.extend_from_slice(&[0x10, 0x41]);

        let err = Lz4Compressor::new().decompress(&bogus).unwrap_err();
        assert!(matches!(err, Error::CorruptPayload { .. }));
    }

    #[test]
    fn test_short_input_rejected() {
        let err = Lz4Compressor::new().decompress(&[1, 2]).unwrap_err();
        assert!(matches!(err, Error::CorruptPayload { .. }));
    }
}
