//! Property-Based Tests for the Codec Pipeline
//!
//! # Test Properties
//!
//! 1. **Roundtrip Correctness**: decode(encode(v)) = v for every pipeline
//! 2. **Field Fidelity**: every field survives, not only the identifier
//! 3. **Compressor Roundtrip**: decompress(compress(b)) = b for all bytes
//! 4. **Truncation Safety**: dropping the last byte never yields a value

#![cfg(test)]

use proptest::prelude::*;

use super::{all_configs, CodecPipeline};
use crate::compression::{CompressionAlgorithm, CompressionConfig};
use crate::domain::CacheProjection;
use crate::error::Error;

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for projections, including ones with absent fields.
fn projection_strategy() -> impl Strategy<Value = CacheProjection> {
    (
        prop::option::of(0i64..i64::MAX),
        prop::option::of("\\PC{0,40}"),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(id, name, marketing)| CacheProjection {
            id,
            name,
            marketing,
        })
}

/// Strategy for index into [`all_configs`].
fn config_index_strategy() -> impl Strategy<Value = usize> {
    0..all_configs().len()
}

/// Strategy for compression algorithms.
fn algorithm_strategy() -> impl Strategy<Value = CompressionAlgorithm> {
    prop::sample::select(CompressionAlgorithm::available_algorithms())
}

/// Strategy for generating raw payloads of various sizes.
fn data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

// =============================================================================
// Roundtrip Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: a single projection survives every pipeline unchanged.
    #[test]
    fn prop_roundtrip_projection(
        index in config_index_strategy(),
        value in projection_strategy(),
    ) {
        let config = all_configs().swap_remove(index);
        let pipeline = CodecPipeline::new(config)?;

        let bytes = pipeline.encode_value(&value)?;
        prop_assert!(!bytes.is_empty());

        let back: CacheProjection = pipeline.decode_value(&bytes)?;
        prop_assert_eq!(&back, &value);
        prop_assert!(back.same_fields(&value));
    }

    /// Property: lists of projections survive every pipeline unchanged.
    #[test]
    fn prop_roundtrip_list(
        index in config_index_strategy(),
        values in prop::collection::vec(projection_strategy(), 0..64),
    ) {
        let config = all_configs().swap_remove(index);
        let pipeline = CodecPipeline::new(config)?;

        let bytes = pipeline.encode_value(&values)?;
        let back: Vec<CacheProjection> = pipeline.decode_value(&bytes)?;

        prop_assert_eq!(back.len(), values.len());
        for (a, b) in back.iter().zip(&values) {
            prop_assert!(a.same_fields(b));
        }
    }

    /// Property: compressors are lossless for arbitrary bytes, empty included.
    #[test]
    fn prop_compressor_roundtrip(
        algorithm in algorithm_strategy(),
        data in data_strategy(),
    ) {
        let compressor = CompressionConfig::new(algorithm).build()?;

        let compressed = compressor.compress(&data)?;
        let decompressed = compressor.decompress(&compressed)?;
        prop_assert_eq!(decompressed, data);
    }

    /// Property: a payload missing its last byte is rejected, never decoded.
    #[test]
    fn prop_truncation_rejected(
        algorithm in algorithm_strategy(),
        values in prop::collection::vec(projection_strategy(), 1..32),
    ) {
        let config = super::PipelineConfig::compressed(
            crate::codec::CodecFormat::CompactMap,
            CompressionConfig::new(algorithm),
        );
        let pipeline = CodecPipeline::new(config)?;

        let bytes = pipeline.encode_value(&values)?;
        let result = pipeline.decode::<Vec<CacheProjection>>(&bytes[..bytes.len() - 1]);

        prop_assert!(
            matches!(result, Err(Error::CorruptPayload { .. })),
            "{} accepted a truncated payload: {:?}",
            algorithm,
            result
        );
    }
}

// =============================================================================
// Determinism
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: encoding is deterministic, so equal values dedupe in a set.
    #[test]
    fn prop_deterministic_encoding(
        index in config_index_strategy(),
        value in projection_strategy(),
    ) {
        let config = all_configs().swap_remove(index);
        let pipeline = CodecPipeline::new(config)?;

        prop_assert_eq!(pipeline.encode_value(&value)?, pipeline.encode_value(&value)?);
    }
}
