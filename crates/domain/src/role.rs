use serde::{Deserialize, Serialize};
use trellis_core::{NonEmptyString, RoleId};

/// A role in the flat role namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Stable role identifier.
    pub id: RoleId,
    /// Unique role name.
    pub name: NonEmptyString,
}

impl Role {
    /// Creates a role with a fresh identifier.
    #[must_use]
    pub fn new(name: NonEmptyString) -> Self {
        Self {
            id: RoleId::new(),
            name,
        }
    }
}
