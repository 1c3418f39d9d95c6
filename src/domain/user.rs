//! User entity
//!
//! Only the fields the marketing cache needs are modelled. The identifier
//! follows a one-shot lifecycle: a user is created without one, receives it
//! exactly once, and it never changes afterwards.

use crate::error::{Error, Result};

/// A user whose marketing data gets cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: Option<i64>,
    name: String,
    marketing: bool,
}

impl User {
    /// Create a user that has not been assigned an identifier yet.
    pub fn new(name: impl Into<String>, marketing: bool) -> Self {
        Self {
            id: None,
            name: name.into(),
            marketing,
        }
    }

    /// Create a user with an identifier already assigned.
    pub fn with_id(id: i64, name: impl Into<String>, marketing: bool) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            marketing,
        }
    }

    /// Assign the identifier. Fails if one was already assigned.
    pub fn register_id(&mut self, id: i64) -> Result<()> {
        match self.id {
            Some(existing) => Err(Error::IdentifierAlreadyAssigned(existing)),
            None => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    /// The assigned identifier.
    ///
    /// Reading it before [`User::register_id`] is a programming error and
    /// yields [`Error::IdentifierUnset`].
    pub fn id(&self) -> Result<i64> {
        self.id.ok_or(Error::IdentifierUnset)
    }

    /// Identifier without the fail-fast check.
    pub fn id_opt(&self) -> Option<i64> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn marketing(&self) -> bool {
        self.marketing
    }
}
