//! Token Family Value Object
//!
//! Identifies a refresh-token lineage: every token descended from one
//! original login shares the family, which is what cascading revocation
//! keys on. Generated fresh at login/registration, inherited on every
//! rotation.

use std::fmt;
use uuid::Uuid;

/// Refresh token family identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenFamily(Uuid);

impl TokenFamily {
    /// Generate a fresh family (new session lineage)
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID (e.g., from database)
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TokenFamily {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TokenFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
