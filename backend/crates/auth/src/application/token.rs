//! Token Service
//!
//! Issues access/refresh token pairs, rotates refresh tokens, and
//! detects reuse of rotated tokens.
//!
//! Access tokens are self-contained JWTs validated by signature and
//! claims alone, so per-request validation never touches the store.
//! Refresh tokens are opaque 256-bit random strings; the store holds
//! only their SHA-256 hash. All tokens descended from one login share a
//! family id, and presenting an already-rotated member of a family
//! revokes the entire lineage.

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::config::AuthConfig;
use crate::domain::entity::refresh_token::RefreshTokenRecord;
use crate::domain::repository::{AccountRepository, RefreshTokenRepository};
use crate::domain::value_object::{account_id::AccountId, token_family::TokenFamily};
use crate::error::{AuthError, AuthResult};
use platform::client::DeviceContext;
use platform::crypto::{random_bytes, sha256, to_base64url};

/// Claim value distinguishing access tokens from anything else signed
/// with the same secret
const TOKEN_TYPE_ACCESS: &str = "access";

/// Size of the raw refresh token in bytes (256 bits of entropy)
const REFRESH_TOKEN_BYTES: usize = 32;

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Token issuer
    pub iss: String,
    /// Intended audience
    pub aud: String,
    /// Subject - account ID
    pub sub: String,
    /// JWT ID - unique per token
    pub jti: String,
    /// Issued at (Unix epoch seconds)
    pub iat: i64,
    /// Expiration (Unix epoch seconds)
    pub exp: i64,
    /// Token type, always "access"
    pub typ: String,
}

/// Access + refresh token pair returned to the client
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Signed JWT, minutes-scale lifetime
    pub access_token: String,
    /// Opaque base64url string, days-scale lifetime
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub access_expires_in: u64,
    /// Refresh token lifetime in seconds
    pub refresh_expires_in: u64,
}

/// Token issuance, verification, rotation, and revocation
pub struct TokenService<A, R>
where
    A: AccountRepository,
    R: RefreshTokenRepository,
{
    account_repo: Arc<A>,
    token_repo: Arc<R>,
    config: Arc<AuthConfig>,
}

impl<A, R> TokenService<A, R>
where
    A: AccountRepository,
    R: RefreshTokenRepository,
{
    pub fn new(account_repo: Arc<A>, token_repo: Arc<R>, config: Arc<AuthConfig>) -> Self {
        Self {
            account_repo,
            token_repo,
            config,
        }
    }

    /// Issue a new access/refresh pair
    ///
    /// `family` is `None` at login/registration (a fresh lineage starts)
    /// and `Some` when rotating, so the successor stays in the
    /// presented token's family.
    pub async fn issue_pair(
        &self,
        account_id: AccountId,
        device: &DeviceContext,
        family: Option<TokenFamily>,
    ) -> AuthResult<TokenPair> {
        let family_id = family.unwrap_or_default();

        let access_token = self.encode_access_token(&account_id)?;

        // Opaque refresh token; only its hash is persisted
        let raw_refresh = to_base64url(&random_bytes(REFRESH_TOKEN_BYTES));
        let token_hash = sha256(raw_refresh.as_bytes()).to_vec();

        let refresh_ttl = chrono::Duration::from_std(self.config.refresh_ttl)
            .map_err(|e| AuthError::Internal(format!("Invalid refresh TTL: {e}")))?;

        let record =
            RefreshTokenRecord::new(token_hash, account_id, family_id, refresh_ttl, device);
        self.token_repo.create(&record).await?;

        Ok(TokenPair {
            access_token,
            refresh_token: raw_refresh,
            access_expires_in: self.config.access_ttl_secs(),
            refresh_expires_in: self.config.refresh_ttl_secs(),
        })
    }

    /// Verify an access token by signature and claims alone
    pub fn verify_access(&self, token: &str) -> AuthResult<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.audience]);

        let token_data = decode::<AccessClaims>(
            token,
            &DecodingKey::from_secret(&self.config.token_secret),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

        if token_data.claims.typ != TOKEN_TYPE_ACCESS {
            return Err(AuthError::InvalidToken);
        }

        Ok(token_data.claims)
    }

    /// Rotate a refresh token: revoke the presented record and issue a
    /// successor in the same family
    ///
    /// Presenting a revoked or expired record is treated as evidence of
    /// capture (a legitimate client only ever holds the newest token),
    /// so the whole family is revoked before the error is returned.
    pub async fn refresh(&self, raw_token: &str, device: &DeviceContext) -> AuthResult<TokenPair> {
        let token_hash = sha256(raw_token.as_bytes());

        let record = self
            .token_repo
            .find_by_hash(&token_hash)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if record.revoked {
            let revoked = self
                .token_repo
                .revoke_family(&record.account_id, &record.family_id)
                .await?;
            tracing::warn!(
                account_id = %record.account_id,
                family_id = %record.family_id,
                revoked = revoked,
                "Rotated refresh token presented again; family revoked"
            );
            return Err(AuthError::InvalidToken);
        }

        if record.is_expired() {
            self.token_repo
                .revoke_family(&record.account_id, &record.family_id)
                .await?;
            return Err(AuthError::TokenExpired);
        }

        // Lockout gate: a locked account cannot rotate its way past the
        // credential check
        let mut account = self
            .account_repo
            .find_by_id(&record.account_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if account.clear_expired_lockout() {
            self.account_repo.update(&account).await?;
        }
        if account.is_locked() {
            self.token_repo
                .revoke_family(&record.account_id, &record.family_id)
                .await?;
            return Err(AuthError::AccountLocked);
        }

        // Conditional revocation: of two concurrent calls with the same
        // raw token, exactly one passes. The loser sees the token as
        // already rotated, which is indistinguishable from replay.
        if !self.token_repo.revoke_if_active(&token_hash).await? {
            let revoked = self
                .token_repo
                .revoke_family(&record.account_id, &record.family_id)
                .await?;
            tracing::warn!(
                account_id = %record.account_id,
                family_id = %record.family_id,
                revoked = revoked,
                "Lost rotation race; family revoked"
            );
            return Err(AuthError::InvalidToken);
        }

        let pair = self
            .issue_pair(record.account_id, device, Some(record.family_id))
            .await?;

        tracing::info!(
            account_id = %record.account_id,
            family_id = %record.family_id,
            "Refresh token rotated"
        );

        Ok(pair)
    }

    /// Revoke exactly one token (no cascade)
    ///
    /// Returns whether a live record was revoked. When `account_id` is
    /// given, a token belonging to a different account is left alone.
    pub async fn logout(
        &self,
        raw_token: &str,
        account_id: Option<&AccountId>,
    ) -> AuthResult<bool> {
        let token_hash = sha256(raw_token.as_bytes());

        let Some(record) = self.token_repo.find_by_hash(&token_hash).await? else {
            return Ok(false);
        };

        if let Some(owner) = account_id {
            if record.account_id != *owner {
                tracing::warn!(
                    account_id = %owner,
                    "Logout presented a token owned by another account"
                );
                return Ok(false);
            }
        }

        let revoked = self.token_repo.revoke_if_active(&token_hash).await?;
        if revoked {
            tracing::info!(account_id = %record.account_id, "Refresh token revoked");
        }
        Ok(revoked)
    }

    /// Revoke every active token for the account, across all families
    ///
    /// Used directly for "sign out everywhere" and unconditionally
    /// after a password change.
    pub async fn logout_all(&self, account_id: &AccountId) -> AuthResult<u64> {
        let revoked = self.token_repo.revoke_all_for_account(account_id).await?;
        tracing::info!(
            account_id = %account_id,
            revoked = revoked,
            "All refresh tokens revoked"
        );
        Ok(revoked)
    }

    /// Sign access token claims for the account
    fn encode_access_token(&self, account_id: &AccountId) -> AuthResult<String> {
        let now = Utc::now().timestamp();

        let claims = AccessClaims {
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            sub: account_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.access_ttl_secs() as i64,
            typ: TOKEN_TYPE_ACCESS.to_string(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.config.token_secret),
        )
        .map_err(|e| AuthError::Internal(format!("Failed to sign access token: {e}")))
    }
}

// TokenService holds Arcs only, so cloning is cheap and lets the
// orchestrator use cases share one instance
impl<A, R> Clone for TokenService<A, R>
where
    A: AccountRepository,
    R: RefreshTokenRepository,
{
    fn clone(&self) -> Self {
        Self {
            account_repo: Arc::clone(&self.account_repo),
            token_repo: Arc::clone(&self.token_repo),
            config: Arc::clone(&self.config),
        }
    }
}
