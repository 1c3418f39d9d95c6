//! Domain Layer
//!
//! # Architecture
//!
//! The domain layer is organized into:
//!
//! - **User** (`user.rs`) - The cached entity and its identifier lifecycle
//! - **Projection** (`projection.rs`) - The cache-safe snapshot of a user
//! - **Ports** (`ports.rs`) - Trait abstractions for the key-value store
//!
//! # Usage
//!
//! ```
//! use usercache::domain::{project, User};
//!
//! let mut user = User::new("alice", true);
//! user.register_id(1_234).unwrap();
//!
//! let projection = project(&user);
//! assert_eq!(projection.id, Some(1_234));
//! ```

pub mod ports;
pub mod projection;
pub mod user;

pub use ports::{CacheStore, ValueStore};
pub use projection::{project, CacheProjection};
pub use user::User;
