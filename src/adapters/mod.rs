//! Infrastructure Adapters
//!
//! Implementations of the store ports from [`crate::domain::ports`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │             CacheStore      │      ValueStore               │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │        InMemoryCacheStore     │     RedisCacheStore         │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use usercache::adapters::RedisCacheStore;
//! use usercache::domain::CacheStore;
//!
//! let store = RedisCacheStore::from_url("redis://127.0.0.1:6379")?;
//! let members = store.set_members("user:marketing:0").await?;
//! ```

mod memory;
mod redis;

pub use self::memory::{InMemoryCacheStore, InMemoryStoreStats};
pub use self::redis::RedisCacheStore;
