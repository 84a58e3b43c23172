//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure
//! layer. Every method is one store round-trip; operations that must be
//! atomic across instances (conditional revocation) are expressed as
//! single conditional updates, not read-modify-write sequences.

use crate::domain::entity::{account::Account, refresh_token::RefreshTokenRecord};
use crate::domain::value_object::{
    account_id::AccountId, email::Email, token_family::TokenFamily,
};
use crate::error::AuthResult;

/// Account repository trait
#[trait_variant::make(AccountRepository: Send)]
pub trait LocalAccountRepository {
    /// Create a new account
    async fn create(&self, account: &Account) -> AuthResult<()>;

    /// Find account by ID
    async fn find_by_id(&self, account_id: &AccountId) -> AuthResult<Option<Account>>;

    /// Find account by normalized email
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<Account>>;

    /// Check if an email is already registered
    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool>;

    /// Update account (lockout counters, last login, password)
    async fn update(&self, account: &Account) -> AuthResult<()>;
}

/// Refresh token repository trait
#[trait_variant::make(RefreshTokenRepository: Send)]
pub trait LocalRefreshTokenRepository {
    /// Persist a freshly issued token record
    async fn create(&self, record: &RefreshTokenRecord) -> AuthResult<()>;

    /// Find a record by the hash of the presented raw token
    async fn find_by_hash(&self, token_hash: &[u8]) -> AuthResult<Option<RefreshTokenRecord>>;

    /// Atomically revoke the record iff it is not revoked yet
    ///
    /// Compare-and-swap on the `revoked` flag: of two concurrent calls
    /// on the same hash, exactly one returns true. The loser must be
    /// treated as a reuse (replay) of an already-rotated token.
    async fn revoke_if_active(&self, token_hash: &[u8]) -> AuthResult<bool>;

    /// Revoke every active record in one family (cascading revocation)
    async fn revoke_family(
        &self,
        account_id: &AccountId,
        family_id: &TokenFamily,
    ) -> AuthResult<u64>;

    /// Revoke every active record for an account, across all families
    async fn revoke_all_for_account(&self, account_id: &AccountId) -> AuthResult<u64>;

    /// Delete records whose expiry has passed (periodic sweep)
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
