//! Bucketing scheme
//!
//! Users are grouped into buckets of [`DELIMITER`] consecutive identifiers;
//! each bucket is one set in the store under `user:marketing:<bucket>`.
//! Write and read paths must both derive the key through this module.

use std::ops::RangeInclusive;

use crate::domain::User;
use crate::error::{Error, Result};

/// Identifiers per bucket
pub const DELIMITER: i64 = 1_000;

/// Namespace of bucket keys in the store
pub const KEY_PREFIX: &str = "user:marketing:";

/// Coarse bucket an identifier falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey(i64);

impl BucketKey {
    /// Bucket of `id`. Negative identifiers are rejected.
    pub fn for_id(id: i64) -> Result<Self> {
        if id < 0 {
            return Err(Error::InvalidIdentifier(id));
        }
        Ok(Self(id.div_euclid(DELIMITER)))
    }

    /// Bucket of a user, failing fast if its identifier is unset.
    pub fn of(user: &User) -> Result<Self> {
        Self::for_id(user.id()?)
    }

    /// A bucket given by its index, e.g. when reading a whole bucket.
    pub fn from_index(index: i64) -> Result<Self> {
        if index < 0 {
            return Err(Error::InvalidIdentifier(index));
        }
        Ok(Self(index))
    }

    /// Bucket index
    pub fn index(&self) -> i64 {
        self.0
    }

    /// Identifiers covered by this bucket. The top bucket ends at `i64::MAX`.
    pub fn id_range(&self) -> RangeInclusive<i64> {
        let start = self.0.saturating_mul(DELIMITER);
        start..=start.saturating_add(DELIMITER - 1)
    }

    /// Key of this bucket's set in the store
    pub fn store_key(&self) -> String {
        format!("{}{}", KEY_PREFIX, self.0)
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
