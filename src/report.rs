//! Size comparison
//!
//! Encodes one list of projections with every pipeline and records the
//! payload sizes, next to a JSON baseline. Each measurement is decoded again
//! and checked, so a report only contains sizes of payloads that round-trip.

use serde::Serialize;
use tracing::info;

use crate::compression::{Compressor, DeflateCompressor};
use crate::domain::{CacheProjection, User};
use crate::error::{Error, Result};
use crate::pipeline::{CodecPipeline, PipelineConfig};

/// Label of the plain JSON baseline
pub const JSON_LABEL: &str = "json";

/// Label of the gzip-compressed JSON baseline
pub const JSON_GZIP_LABEL: &str = "json+gzip";

/// Users `1..=count` with their id as name and every second one opted in.
pub fn generate_users(count: usize) -> Vec<User> {
    (1..=count as i64)
        .map(|id| User::with_id(id, id.to_string(), id % 2 == 0))
        .collect()
}

/// Projections of [`generate_users`].
pub fn generate_projections(count: usize) -> Vec<CacheProjection> {
    generate_users(count).iter().map(CacheProjection::from).collect()
}

/// One measured encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeEntry {
    /// Pipeline label, e.g. `graph+gzip`
    pub label: String,
    /// Encoded size in bytes
    pub bytes: usize,
}

/// Sizes of the same input under several encodings
#[derive(Debug, Clone, Default, Serialize)]
pub struct SizeReport {
    /// Number of projections encoded
    pub records: usize,
    /// Measurements in the order they were taken
    pub entries: Vec<SizeEntry>,
}

impl SizeReport {
    /// Measure `values` with each pipeline in `configs` plus the JSON baselines.
    pub fn measure(values: &[CacheProjection], configs: &[PipelineConfig]) -> Result<Self> {
        // graph payloads record the root type, so encode and decode as Vec
        let values: Vec<CacheProjection> = values.to_vec();
        let mut report = SizeReport {
            records: values.len(),
            entries: Vec::with_capacity(configs.len() + 2),
        };

        let json = serde_json::to_vec(&values)
            .map_err(|e| Error::serialization(JSON_LABEL, e))?;
        let json_gzip = DeflateCompressor::new().compress(&json)?;
        report.push(JSON_LABEL, json.len());
        report.push(JSON_GZIP_LABEL, json_gzip.len());

        for config in configs {
            let pipeline = CodecPipeline::new(config.clone())?;
            let bytes = pipeline.encode_value(&values)?;

            let decoded: Vec<CacheProjection> = pipeline.decode_value(&bytes)?;
            if decoded.len() != values.len() {
                return Err(Error::serialization(
                    config.codec.name(),
                    format!("decoded {} of {} records", decoded.len(), values.len()),
                ));
            }

            report.push(&pipeline.describe(), bytes.len());
        }

        Ok(report)
    }

    fn push(&mut self, label: &str, bytes: usize) {
        self.entries.push(SizeEntry {
            label: label.to_string(),
            bytes,
        });
    }

    /// Size recorded for `label`
    pub fn size_of(&self, label: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.bytes)
    }

    /// Smallest measurement
    pub fn smallest(&self) -> Option<&SizeEntry> {
        self.entries.iter().min_by_key(|e| e.bytes)
    }

    /// Write every measurement to the log
    pub fn log(&self) {
        for entry in &self.entries {
            info!(
                records = self.records,
                encoding = %entry.label,
                bytes = entry.bytes,
                mb = %format!("{:.2}", entry.bytes as f64 / 1_048_576.0),
                "payload size"
            );
        }
    }
}

impl std::fmt::Display for SizeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} records", self.records)?;
        for entry in &self.entries {
            writeln!(f, "  {:<20} {:>12} bytes", entry.label, entry.bytes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecFormat;
    use crate::pipeline::all_configs;

    #[test]
    fn test_generate_users() {
        let users = generate_users(3);
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].id().unwrap(), 1);
        assert_eq!(users[1].name(), "2");
        assert!(users[1].marketing());
        assert!(!users[2].marketing());
    }

    #[test]
    fn test_measure_every_pipeline() {
        let values = generate_projections(200);
        let report = SizeReport::measure(&values, &all_configs()).unwrap();

        assert_eq!(report.records, 200);
        assert_eq!(report.entries.len(), all_configs().len() + 2);
        assert!(report.size_of("compact-map+zstd").is_some());
        assert!(report.size_of(JSON_LABEL).unwrap() > report.size_of(JSON_GZIP_LABEL).unwrap());
        assert!(report.size_of("nope").is_none());
    }

    #[test]
    fn test_json_gzip_baseline_matches_compressor() {
        let values = generate_projections(50);
        let report = SizeReport::measure(&values, &[]).unwrap();

        let json = serde_json::to_vec(&values).unwrap();
        let expected = DeflateCompressor::new().compress(&json).unwrap();
        assert_eq!(report.size_of(JSON_GZIP_LABEL), Some(expected.len()));
    }

    #[test]
    fn test_graph_is_larger_than_compact() {
        let values = generate_projections(100);
        let report = SizeReport::measure(
            &values,
            &[
                PipelineConfig::uncompressed(CodecFormat::Graph),
                PipelineConfig::uncompressed(CodecFormat::CompactMap),
            ],
        )
        .unwrap();

        assert!(report.size_of("graph").unwrap() > report.size_of("compact-map").unwrap());
        assert!(report.to_string().contains("compact-map"));
    }
}
