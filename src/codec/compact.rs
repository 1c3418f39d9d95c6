//! Compact map codec (MessagePack)
//!
//! Structs are written as maps keyed by field name, so payloads survive
//! added or removed fields:
//!
//! - fields marked `skip_serializing_if = "Option::is_none"` are omitted
//! - unknown fields are ignored when decoding
//! - date/time fields use [`super::timestamp`] and become integers
//! - types marked `#[serde(default)]` fill in missing fields on decode

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Codec, CodecFormat};
use crate::error::{Error, Result};

/// Schema-less MessagePack map codec
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactMapCodec;

impl CompactMapCodec {
    fn fail(reason: impl ToString) -> Error {
        Error::serialization(CodecFormat::CompactMap.name(), reason)
    }
}

impl Codec for CompactMapCodec {
    fn format(&self) -> CodecFormat {
        CodecFormat::CompactMap
    }

    fn serialize<T: Serialize>(&self, value: Option<&T>) -> Result<Vec<u8>> {
        match value {
            None => Ok(Vec::new()),
            Some(value) => rmp_serde::to_vec_named(value).map_err(Self::fail),
        }
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<Option<T>> {
        if bytes.is_empty() {
            return Ok(None);
        }

        let mut rest = bytes;
        let value = rmp_serde::from_read(&mut rest).map_err(Self::fail)?;
        if !rest.is_empty() {
            return Err(Self::fail(format!(
                "{} trailing bytes after value",
                rest.len()
            )));
        }
        Ok(Some(value))
    }
}
