//! Refresh Token Record Entity
//!
//! Server-side record of one issued refresh token. Only the SHA-256
//! hash of the opaque token is stored; the raw value exists client-side
//! only. Records are revoked in place, never deleted, so a family's
//! lineage stays auditable; a periodic sweep removes long-expired rows.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{account_id::AccountId, token_family::TokenFamily};
use platform::client::DeviceContext;

/// Refresh token record entity
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    /// SHA-256 hash of the raw opaque token, unique
    pub token_hash: Vec<u8>,
    /// Owning account
    pub account_id: AccountId,
    /// Session lineage this token belongs to
    pub family_id: TokenFamily,
    /// Expiration (days-scale)
    pub expires_at: DateTime<Utc>,
    /// Set on rotation, logout, or cascading revocation
    pub revoked: bool,
    /// Client IP at issuance (for session display / audit)
    pub client_ip: Option<String>,
    /// User-Agent at issuance
    pub user_agent: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Create a new record for a freshly issued token
    pub fn new(
        token_hash: Vec<u8>,
        account_id: AccountId,
        family_id: TokenFamily,
        ttl: Duration,
        device: &DeviceContext,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_hash,
            account_id,
            family_id,
            expires_at: now + ttl,
            revoked: false,
            client_ip: device.ip_string(),
            user_agent: device.user_agent.clone(),
            created_at: now,
        }
    }

    /// Check if the record has expired (evaluated lazily on read)
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
