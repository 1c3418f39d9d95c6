//! User cache service
//!
//! Orchestrates the write and read paths:
//!
//! ```text
//! store:        User ─▶ BucketKey ─▶ project ─▶ encode ─▶ SADD user:marketing:<k>
//! fetch_bucket: SMEMBERS user:marketing:<k> ─▶ decode each ─▶ Vec<CacheProjection>
//! ```
//!
//! Writes go one member at a time, so a failed `store_all` may leave a
//! prefix of its users stored.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::bucket::BucketKey;
use crate::domain::{project, CacheProjection, CacheStore, User};
use crate::error::Result;
use crate::pipeline::CodecPipeline;

/// How entries with the same identifier but different bytes are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Rely on the store's byte-level dedup. An entry whose name or flag
    /// changed is added next to the stale one.
    #[default]
    RawBytes,
    /// Remove members with the same identifier before adding.
    ReplaceById,
}

/// What `fetch_bucket` does with a member that fails to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeFailurePolicy {
    /// Fail the whole fetch with the first error
    #[default]
    Abort,
    /// Log the member and leave it out of the result
    Skip,
}

/// Caches user projections in bucketed sets
pub struct UserCacheService {
    store: Arc<dyn CacheStore>,
    pipeline: Arc<CodecPipeline>,
    duplicates: DuplicatePolicy,
    decode_failures: DecodeFailurePolicy,
}

impl UserCacheService {
    /// Create a service with the default policies.
    pub fn new(store: Arc<dyn CacheStore>, pipeline: Arc<CodecPipeline>) -> Self {
        Self {
            store,
            pipeline,
            duplicates: DuplicatePolicy::default(),
            decode_failures: DecodeFailurePolicy::default(),
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    pub fn with_decode_failure_policy(mut self, policy: DecodeFailurePolicy) -> Self {
        self.decode_failures = policy;
        self
    }

    pub fn pipeline(&self) -> &CodecPipeline {
        &self.pipeline
    }

    /// Cache one user.
    ///
    /// Fails with `IdentifierUnset` before touching the store if the user
    /// has no identifier. Returns whether the store gained a new member.
    /// Under `ReplaceById` an undecodable member in the bucket is handled
    /// per the decode-failure policy, as on the read path.
    pub async fn store(&self, user: &User) -> Result<bool> {
        let bucket = BucketKey::of(user)?;
        let key = bucket.store_key();
        let projection = project(user);
        let payload = self.pipeline.encode_value(&projection)?;

        if self.duplicates == DuplicatePolicy::ReplaceById {
            self.remove_stale(&key, &projection, &payload).await?;
        }

        let added = self.store.set_add(&key, payload).await?;
        debug!(
            key = %key,
            id = ?projection.id,
            added,
            pipeline = %self.pipeline.describe(),
            "stored user projection"
        );
        Ok(added)
    }

    /// Cache several users in order, stopping at the first failure.
    ///
    /// Returns how many new members were added.
    pub async fn store_all(&self, users: &[User]) -> Result<usize> {
        let mut added = 0;
        for user in users {
            if self.store(user).await? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// All projections cached in `bucket`, in no particular order.
    pub async fn fetch_bucket(&self, bucket: BucketKey) -> Result<Vec<CacheProjection>> {
        let key = bucket.store_key();
        let members = self.store.set_members(&key).await?;

        let mut projections = Vec::with_capacity(members.len());
        for member in &members {
            match self.pipeline.decode_value::<CacheProjection>(member) {
                Ok(projection) => projections.push(projection),
                Err(e) if self.decode_failures == DecodeFailurePolicy::Skip && e.is_recoverable() => {
                    warn!(key = %key, bytes = member.len(), error = %e, "skipping undecodable member");
                }
                Err(e) => return Err(e),
            }
        }

        debug!(key = %key, count = projections.len(), "fetched bucket");
        Ok(projections)
    }

    /// Cached projection for one identifier, if any.
    ///
    /// With duplicates present the first decoded match wins.
    pub async fn fetch_for(&self, id: i64) -> Result<Option<CacheProjection>> {
        let bucket = BucketKey::for_id(id)?;
        let projections = self.fetch_bucket(bucket).await?;
        Ok(projections.into_iter().find(|p| p.id == Some(id)))
    }

    async fn remove_stale(&self, key: &str, projection: &CacheProjection, payload: &[u8]) -> Result<()> {
        for member in self.store.set_members(key).await? {
            if member.as_slice() == payload {
                continue;
            }
            let existing = match self.pipeline.decode_value::<CacheProjection>(&member) {
                Ok(existing) => existing,
                Err(e) if self.decode_failures == DecodeFailurePolicy::Skip && e.is_recoverable() => {
                    warn!(key, bytes = member.len(), error = %e, "keeping undecodable member");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if existing == *projection {
                self.store.set_remove(key, &member).await?;
                debug!(key, id = ?projection.id, "removed stale projection");
            }
        }
        Ok(())
    }
}
