//! Value Codecs
//!
//! A codec turns a value (usually a [`crate::domain::CacheProjection`] or a
//! list of them) into bytes and back. Two formats are available:
//!
//! - [`GraphCodec`] - self-describing object graph with type metadata,
//!   larger but schema-free
//! - [`CompactMapCodec`] - MessagePack map keyed by field name, compact
//!
//! Both share the same contract: an absent value serializes to zero bytes,
//! zero bytes deserialize to an absent value, and anything else that goes
//! wrong becomes [`crate::Error::Serialization`].
//!
//! # Example
//!
//! ```
//! use usercache::codec::{Codec, CodecFormat};
//! use usercache::domain::CacheProjection;
//!
//! let codec = CodecFormat::CompactMap.codec();
//! let value = CacheProjection::new(7, "alice", true);
//!
//! let bytes = codec.serialize(Some(&value)).unwrap();
//! let back: Option<CacheProjection> = codec.deserialize(&bytes).unwrap();
//! assert_eq!(back, Some(value));
//! ```

mod compact;
mod graph;

pub use compact::CompactMapCodec;
pub use graph::GraphCodec;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Date/time fields written as epoch milliseconds.
///
/// Use with `#[serde(with = "usercache::codec::timestamp")]` on
/// `DateTime<Utc>` fields so both codecs store a plain integer instead of a
/// nested structure.
pub use chrono::serde::ts_milliseconds as timestamp;

/// Optional date/time fields written as epoch milliseconds.
pub use chrono::serde::ts_milliseconds_option as timestamp_option;

// =============================================================================
// Codec Format
// =============================================================================

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodecFormat {
    /// Self-describing binary object graph
    Graph,
    /// Schema-less MessagePack map
    #[default]
    CompactMap,
}

impl CodecFormat {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CodecFormat::Graph => "graph",
            CodecFormat::CompactMap => "compact-map",
        }
    }

    /// Get list of available formats
    pub fn available_formats() -> Vec<Self> {
        vec![Self::Graph, Self::CompactMap]
    }

    /// Build the codec for this format
    pub fn codec(&self) -> ValueCodec {
        match self {
            CodecFormat::Graph => ValueCodec::Graph(GraphCodec),
            CodecFormat::CompactMap => ValueCodec::CompactMap(CompactMapCodec),
        }
    }
}

impl std::fmt::Display for CodecFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for CodecFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "graph" => Ok(CodecFormat::Graph),
            "compact-map" | "compact" | "msgpack" => Ok(CodecFormat::CompactMap),
            other => Err(Error::Config(format!("unknown codec format '{}'", other))),
        }
    }
}

// =============================================================================
// Codec Trait
// =============================================================================

/// Trait for serialization formats
pub trait Codec: Send + Sync {
    /// Get the format identifier
    fn format(&self) -> CodecFormat;

    /// Serialize a value. `None` yields an empty byte vector.
    fn serialize<T: Serialize>(&self, value: Option<&T>) -> Result<Vec<u8>>;

    /// Deserialize a value. Empty input yields `None`.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Option<T>>;
}

/// One of the supported codecs, chosen by [`CodecFormat::codec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueCodec {
    Graph(GraphCodec),
    CompactMap(CompactMapCodec),
}

impl Codec for ValueCodec {
    fn format(&self) -> CodecFormat {
        match self {
            ValueCodec::Graph(c) => c.format(),
            ValueCodec::CompactMap(c) => c.format(),
        }
    }

    fn serialize<T: Serialize>(&self, value: Option<&T>) -> Result<Vec<u8>> {
        match self {
            ValueCodec::Graph(c) => c.serialize(value),
            ValueCodec::CompactMap(c) => c.serialize(value),
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Option<T>> {
        match self {
            ValueCodec::Graph(c) => c.deserialize(bytes),
            ValueCodec::CompactMap(c) => c.deserialize(bytes),
        }
    }
}
