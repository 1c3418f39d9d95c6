//! Cache projection of a [`User`].

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::user::User;

/// Minimal snapshot of a user as it is written to the cache.
///
/// Identity is the identifier alone: two projections with the same `id`
/// compare equal and hash alike even when `name` or `marketing` differ.
/// Absent fields are left out of compact encodings and default to `None`
/// when missing from stored bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheProjection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketing: Option<bool>,
}

impl CacheProjection {
    /// Projection with every field absent.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a projection from its parts.
    pub fn new(id: i64, name: impl Into<String>, marketing: bool) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            marketing: Some(marketing),
        }
    }

    /// Compare every field, not just identity.
    pub fn same_fields(&self, other: &Self) -> bool {
        self.id == other.id && self.name == other.name && self.marketing == other.marketing
    }
}

/// Project a user into its cache form. Never fails; an unassigned
/// identifier becomes an absent `id`.
pub fn project(user: &User) -> CacheProjection {
    CacheProjection::from(user)
}

impl From<&User> for CacheProjection {
    fn from(user: &User) -> Self {
        Self {
            id: user.id_opt(),
            name: Some(user.name().to_string()),
            marketing: Some(user.marketing()),
        }
    }
}

impl PartialEq for CacheProjection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CacheProjection {}

impl Hash for CacheProjection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_is_id_only() {
        let a = CacheProjection::new(1, "old", false);
        let b = CacheProjection::new(1, "new", true);
        assert_eq!(a, b);
        assert!(!a.same_fields(&b));

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_project_assigned_user() {
        let user = User::with_id(5, "eve", true);
        let projection = project(&user);
        assert!(projection.same_fields(&CacheProjection::new(5, "eve", true)));
    }

    #[test]
    fn test_project_unassigned_user() {
        let user = User::new("mallory", false);
        let projection = project(&user);
        assert_eq!(projection.id, None);
        assert_eq!(projection.name.as_deref(), Some("mallory"));
        assert_eq!(projection, CacheProjection::empty());
    }
}
