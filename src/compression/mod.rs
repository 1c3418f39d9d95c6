//! Payload Compression
//!
//! Reversible byte transforms applied after serialization.
//!
//! - [`DeflateCompressor`] - gzip, favors ratio; adds ~20 bytes of framing,
//!   so tiny payloads grow
//! - [`Lz4Compressor`] - LZ4 block, favors speed
//! - [`ZstdCompressor`] - Zstandard with a tunable level, streams through a
//!   bounded buffer
//!
//! # Example
//!
//! ```
//! use usercache::compression::{CompressionAlgorithm, CompressionConfig, Compressor};
//!
//! let compressor = CompressionConfig::new(CompressionAlgorithm::Zstd).build().unwrap();
//!
//! let data = b"Hello, this is test data that should compress well!";
//! let compressed = compressor.compress(data).unwrap();
//! let decompressed = compressor.decompress(&compressed).unwrap();
//! assert_eq!(decompressed, data);
//! ```

mod deflate;
mod lz4_block;
mod zstd_stream;

pub use deflate::DeflateCompressor;
pub use lz4_block::Lz4Compressor;
pub use zstd_stream::ZstdCompressor;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default buffer size for streaming compressors (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

// =============================================================================
// Compression Algorithm
// =============================================================================

/// Supported compression algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// gzip - general purpose, best for ratio
    Gzip,
    /// LZ4 - fast compression
    Lz4,
    /// Zstandard - tunable speed/ratio
    #[default]
    Zstd,
}

impl CompressionAlgorithm {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CompressionAlgorithm::Gzip => "gzip",
            CompressionAlgorithm::Lz4 => "lz4",
            CompressionAlgorithm::Zstd => "zstd",
        }
    }

    /// Level used when none is configured
    pub fn default_level(&self) -> Option<i32> {
        match self {
            CompressionAlgorithm::Gzip => Some(6),
            // fast mode, no level
            CompressionAlgorithm::Lz4 => None,
            CompressionAlgorithm::Zstd => Some(zstd::DEFAULT_COMPRESSION_LEVEL),
        }
    }

    /// Get list of available algorithms
    pub fn available_algorithms() -> Vec<Self> {
        vec![Self::Gzip, Self::Lz4, Self::Zstd]
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for CompressionAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "deflate" => Ok(CompressionAlgorithm::Gzip),
            "lz4" => Ok(CompressionAlgorithm::Lz4),
            "zstd" => Ok(CompressionAlgorithm::Zstd),
            other => Err(Error::Config(format!(
                "unknown compression algorithm '{}'",
                other
            ))),
        }
    }
}

// =============================================================================
// Compression Configuration
// =============================================================================

/// Configuration for compression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Algorithm to use
    pub algorithm: CompressionAlgorithm,
    /// Compression level (algorithm-specific, `None` = algorithm default)
    pub level: Option<i32>,
    /// Buffer size for streaming algorithms
    pub chunk_size: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self::new(CompressionAlgorithm::default())
    }
}

impl CompressionConfig {
    /// Config for `algorithm` with its default level
    pub fn new(algorithm: CompressionAlgorithm) -> Self {
        Self {
            algorithm,
            level: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create a config optimized for speed.
    pub fn fast() -> Self {
        Self::new(CompressionAlgorithm::Lz4)
    }

    /// Create a config optimized for compression ratio.
    pub fn high_ratio() -> Self {
        Self {
            level: Some(19),
            ..Self::new(CompressionAlgorithm::Zstd)
        }
    }

    /// Override the level
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    /// Build the compressor, validating the level
    pub fn build(&self) -> Result<Box<dyn Compressor>> {
        if self.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be positive".into()));
        }

        let level = self.level.or(self.algorithm.default_level());
        let compressor: Box<dyn Compressor> = match (self.algorithm, level) {
            (CompressionAlgorithm::Lz4, None) => Box::new(Lz4Compressor::new()),
            (CompressionAlgorithm::Lz4, Some(level)) => {
                Box::new(Lz4Compressor::high_compression(level)?)
            }
            (CompressionAlgorithm::Gzip, level) => {
                Box::new(DeflateCompressor::with_level(level.unwrap_or(6))?)
            }
            (CompressionAlgorithm::Zstd, level) => Box::new(
                ZstdCompressor::with_level(level.unwrap_or(zstd::DEFAULT_COMPRESSION_LEVEL))?
                    .with_chunk_size(self.chunk_size),
            ),
        };
        Ok(compressor)
    }
}

// =============================================================================
// Compressor Trait
// =============================================================================

/// Trait for compression implementations
pub trait Compressor: Send + Sync + std::fmt::Debug {
    /// Get the algorithm identifier
    fn algorithm(&self) -> CompressionAlgorithm;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data; truncated or foreign input is [`Error::CorruptPayload`]
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}
