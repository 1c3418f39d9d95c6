//! Codec Pipeline
//!
//! Composes one [`Codec`] with at most one [`Compressor`]:
//!
//! ```text
//! encode:  value ──▶ codec.serialize ──▶ compressor.compress ──▶ bytes
//! decode:  bytes ──▶ compressor.decompress ──▶ codec.deserialize ──▶ value
//! ```
//!
//! Absent values encode to zero bytes and zero bytes decode to `None`; the
//! compressor is bypassed in both directions for empty payloads. A pipeline
//! holds no per-call state and can be shared behind an `Arc`.
//!
//! # Example
//!
//! ```
//! use usercache::codec::CodecFormat;
//! use usercache::compression::{CompressionAlgorithm, CompressionConfig};
//! use usercache::domain::CacheProjection;
//! use usercache::pipeline::{CodecPipeline, PipelineConfig};
//!
//! let pipeline = CodecPipeline::new(PipelineConfig {
//!     codec: CodecFormat::CompactMap,
//!     compression: Some(CompressionConfig::new(CompressionAlgorithm::Gzip)),
//! })
//! .unwrap();
//!
//! let value = CacheProjection::new(42, "alice", true);
//! let bytes = pipeline.encode_value(&value).unwrap();
//! let back: CacheProjection = pipeline.decode_value(&bytes).unwrap();
//! assert_eq!(back, value);
//! ```

#[cfg(test)]
mod proptest;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::codec::{Codec, CodecFormat, ValueCodec};
use crate::compression::{CompressionConfig, Compressor};
use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Which codec and compressor a pipeline uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Serialization format
    pub codec: CodecFormat,
    /// Compression applied after serialization, if any
    pub compression: Option<CompressionConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            codec: CodecFormat::CompactMap,
            compression: Some(CompressionConfig::default()),
        }
    }
}

impl PipelineConfig {
    /// Pipeline without a compressor
    pub fn uncompressed(codec: CodecFormat) -> Self {
        Self {
            codec,
            compression: None,
        }
    }

    /// Pipeline with `codec` and `compression`
    pub fn compressed(codec: CodecFormat, compression: CompressionConfig) -> Self {
        Self {
            codec,
            compression: Some(compression),
        }
    }

    /// Short label such as `compact-map+zstd`
    pub fn describe(&self) -> String {
        match &self.compression {
            Some(c) => format!("{}+{}", self.codec, c.algorithm),
            None => self.codec.to_string(),
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Serialize/compress pair used by every cache operation
#[derive(Debug)]
pub struct CodecPipeline {
    config: PipelineConfig,
    codec: ValueCodec,
    compressor: Option<Box<dyn Compressor>>,
}

impl CodecPipeline {
    /// Build a pipeline, validating the compression settings
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let compressor = config
            .compression
            .as_ref()
            .map(CompressionConfig::build)
            .transpose()?;

        Ok(Self {
            codec: config.codec.codec(),
            compressor,
            config,
        })
    }

    /// Get configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Short label such as `graph+gzip`
    pub fn describe(&self) -> String {
        self.config.describe()
    }

    /// Encode a possibly absent value
    pub fn encode<T: Serialize>(&self, value: Option<&T>) -> Result<Vec<u8>> {
        let serialized = self.codec.serialize(value)?;
        if serialized.is_empty() {
            return Ok(serialized);
        }

        match &self.compressor {
            Some(compressor) => {
                let compressed = compressor.compress(&serialized)?;
                trace!(
                    pipeline = %self.describe(),
                    serialized = serialized.len(),
                    compressed = compressed.len(),
                    "encoded payload"
                );
                Ok(compressed)
            }
            None => Ok(serialized),
        }
    }

    /// Decode bytes; empty input is `None`
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Option<T>> {
        if bytes.is_empty() {
            return Ok(None);
        }

        match &self.compressor {
            Some(compressor) => {
                let decompressed = compressor.decompress(bytes)?;
                self.codec.deserialize(&decompressed)
            }
            None => self.codec.deserialize(bytes),
        }
    }

    /// Encode a present value
    pub fn encode_value<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        self.encode(Some(value))
    }

    /// Decode bytes that must hold a value
    pub fn decode_value<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        self.decode(bytes)?.ok_or_else(|| {
            Error::serialization(self.config.codec.name(), "payload is empty")
        })
    }
}

/// Every codec combined with every compressor, plus the uncompressed cases
pub fn all_configs() -> Vec<PipelineConfig> {
    use crate::compression::CompressionAlgorithm;

    let mut configs = Vec::new();
    for codec in CodecFormat::available_formats() {
        configs.push(PipelineConfig::uncompressed(codec));
        for algorithm in CompressionAlgorithm::available_algorithms() {
            configs.push(PipelineConfig::compressed(
                codec,
                CompressionConfig::new(algorithm),
            ));
        }
    }
    configs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionAlgorithm;
    use crate::domain::CacheProjection;
    use assert_matches::assert_matches;

    #[test]
    fn test_all_configs_cover_every_pair() {
        let configs = all_configs();
        assert_eq!(configs.len(), 8);
        assert!(configs.contains(&PipelineConfig::uncompressed(CodecFormat::Graph)));
    }

    #[test]
    fn test_empty_contract_for_every_pipeline() {
        for config in all_configs() {
            let pipeline = CodecPipeline::new(config).unwrap();

            let bytes = pipeline.encode::<CacheProjection>(None).unwrap();
            assert!(bytes.is_empty(), "{}", pipeline.describe());

            let value: Option<CacheProjection> = pipeline.decode(&[]).unwrap();
            assert!(value.is_none(), "{}", pipeline.describe());
        }
    }

    #[test]
    fn test_roundtrip_for_every_pipeline() {
        let values = [
            CacheProjection::new(0, "zero", false),
            CacheProjection::new(999_999, "", true),
            CacheProjection::empty(),
        ];

        for config in all_configs() {
            let pipeline = CodecPipeline::new(config).unwrap();
            for value in &values {
                let bytes = pipeline.encode_value(value).unwrap();
                let back: CacheProjection = pipeline.decode_value(&bytes).unwrap();
                assert!(back.same_fields(value), "{}", pipeline.describe());
            }
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(PipelineConfig::default().describe(), "compact-map+zstd");
        assert_eq!(
            PipelineConfig::uncompressed(CodecFormat::Graph).describe(),
            "graph"
        );
    }

    #[test]
    fn test_invalid_compression_rejected() {
        let config = PipelineConfig::compressed(
            CodecFormat::Graph,
            CompressionConfig::new(CompressionAlgorithm::Gzip).with_level(42),
        );
        assert_matches!(CodecPipeline::new(config), Err(Error::Config(_)));
    }

    #[test]
    fn test_decode_value_on_empty() {
        let pipeline = CodecPipeline::new(PipelineConfig::default()).unwrap();
        let err = pipeline.decode_value::<CacheProjection>(&[]).unwrap_err();
        assert_matches!(err, Error::Serialization { .. });
    }

    #[test]
    fn test_wrong_compressor_is_corrupt() {
        let gzip = CodecPipeline::new(PipelineConfig::compressed(
            CodecFormat::CompactMap,
            CompressionConfig::new(CompressionAlgorithm::Gzip),
        ))
        .unwrap();
        let zstd = CodecPipeline::new(PipelineConfig::default()).unwrap();

        let bytes = gzip
            .encode_value(&CacheProjection::new(3, "judy", true))
            .unwrap();
        assert_matches!(
            zstd.decode::<CacheProjection>(&bytes),
            Err(Error::CorruptPayload { .. })
        );
    }

    #[test]
    fn test_config_from_json() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"codec":"graph","compression":{"algorithm":"lz4"}}"#,
        )
        .unwrap();
        assert_eq!(config.codec, CodecFormat::Graph);
        let compression = config.compression.unwrap();
        assert_eq!(compression.algorithm, CompressionAlgorithm::Lz4);
        assert_eq!(compression.level, None);
        assert_eq!(compression.chunk_size, crate::compression::DEFAULT_CHUNK_SIZE);
        assert!(CodecPipeline::new(PipelineConfig {
            codec: config.codec,
            compression: Some(compression),
        })
        .is_ok());
    }
}
