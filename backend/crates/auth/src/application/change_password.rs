//! Change Password Use Case
//!
//! Re-hashes the credential and invalidates every existing session. The
//! `logout_all` call is unconditional: after a password change, no
//! previously issued refresh token may survive.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::token::TokenService;
use crate::domain::repository::{AccountRepository, RefreshTokenRepository};
use crate::domain::value_object::{
    account_id::AccountId,
    account_password::{AccountPassword, RawPassword},
};
use crate::error::{AuthError, AuthResult};

/// Change password use case
pub struct ChangePasswordUseCase<A, R>
where
    A: AccountRepository,
    R: RefreshTokenRepository,
{
    account_repo: Arc<A>,
    token_service: TokenService<A, R>,
    config: Arc<AuthConfig>,
}

impl<A, R> ChangePasswordUseCase<A, R>
where
    A: AccountRepository,
    R: RefreshTokenRepository,
{
    pub fn new(
        account_repo: Arc<A>,
        token_service: TokenService<A, R>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            account_repo,
            token_service,
            config,
        }
    }

    pub async fn execute(
        &self,
        account_id: &AccountId,
        old_password: String,
        new_password: String,
    ) -> AuthResult<()> {
        let mut account = self
            .account_repo
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::AuthenticationFailed)?;

        let old = RawPassword::for_verification(old_password);
        if !account.password_hash.verify(&old, self.config.pepper()) {
            return Err(AuthError::AuthenticationFailed);
        }

        let new_raw = RawPassword::new(new_password)
            .map_err(|e| AuthError::Validation(e.message().to_string()))?;

        if account.password_hash.verify(&new_raw, self.config.pepper()) {
            return Err(AuthError::Validation(
                "New password must differ from the current password".to_string(),
            ));
        }

        let new_hash = AccountPassword::from_raw(&new_raw, self.config.pepper())
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        account.set_password(new_hash);
        self.account_repo.update(&account).await?;

        // Every existing session dies with the old password
        let revoked = self.token_service.logout_all(account_id).await?;

        tracing::info!(
            account_id = %account_id,
            sessions_revoked = revoked,
            "Password changed"
        );

        Ok(())
    }
}
