//! usercache - Bucketed User Marketing Cache
//!
//! Caches a small projection of each user in a key-value store. Users are
//! grouped into buckets of a thousand identifiers and every bucket is one
//! set of encoded payloads. Payloads go through a configurable pipeline of
//! one serialization format and an optional compressor.
//!
//! # Architecture
//!
//! ```text
//! User ─▶ Projection ─▶ Codec ─▶ Compressor ─▶ BucketKey ─▶ CacheStore.set_add
//!                                                           CacheStore.set_members
//!                                                                  │
//! Projection ◀─ Codec ◀─ Compressor ◀──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - In-memory and Redis implementations of the store ports
//! - [`bucket`] - Identifier to bucket key mapping
//! - [`codec`] - Graph and compact-map serialization formats
//! - [`compression`] - gzip, LZ4 and Zstandard compressors
//! - [`domain`] - User entity, cache projection and store ports
//! - [`error`] - Error types
//! - [`pipeline`] - Codec + compressor composition
//! - [`report`] - Payload size comparison
//! - [`service`] - Store and fetch orchestration

pub mod adapters;
pub mod bucket;
pub mod codec;
pub mod compression;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod service;

// Re-export commonly used types
pub use bucket::{BucketKey, DELIMITER};
pub use codec::CodecFormat;
pub use compression::{CompressionAlgorithm, CompressionConfig};
pub use domain::{CacheProjection, User};
pub use error::{Error, Result};
pub use pipeline::{CodecPipeline, PipelineConfig};
pub use service::{DecodeFailurePolicy, DuplicatePolicy, UserCacheService};
