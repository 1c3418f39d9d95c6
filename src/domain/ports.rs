//! Domain Ports (Port/Adapter Pattern)
//!
//! The cache core only talks to the key-value store through these traits.
//! Infrastructure adapters in [`crate::adapters`] implement them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │          CacheStore        │       ValueStore        │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │      InMemoryCacheStore    │    RedisCacheStore      │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::error::Result;

// =============================================================================
// Set Store Port
// =============================================================================

/// Port for the set operations of the key-value store.
///
/// Members are deduplicated by raw byte equality. Every failure surfaces as
/// [`crate::Error::StoreUnavailable`]; adapters never retry.
///
/// # Example
///
/// ```ignore
/// let added = store.set_add("user:marketing:3", payload).await?;
/// let members = store.set_members("user:marketing:3").await?;
/// ```
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Add a member to the set at `key`.
    ///
    /// Returns `true` if the member was not present before.
    async fn set_add(&self, key: &str, value: Vec<u8>) -> Result<bool>;

    /// All members of the set at `key`, in no particular order.
    ///
    /// A missing key yields an empty list.
    async fn set_members(&self, key: &str) -> Result<Vec<Vec<u8>>>;

    /// Remove a member from the set at `key`.
    ///
    /// Returns `true` if the member existed.
    async fn set_remove(&self, key: &str, value: &[u8]) -> Result<bool>;
}

// =============================================================================
// Value Store Port
// =============================================================================

/// Port for plain byte-string values.
///
/// Only used for size-comparison runs. Its keys must stay outside the
/// `user:marketing:` namespace and carry no bucketing meaning.
#[async_trait]
pub trait ValueStore: Send + Sync {
    /// Read the value at `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Overwrite the value at `key`.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
}
