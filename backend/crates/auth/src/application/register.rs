//! Register Use Case
//!
//! Creates a new account and starts its first session.

use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::token::{TokenPair, TokenService};
use crate::domain::entity::account::Account;
use crate::domain::repository::{AccountRepository, RefreshTokenRepository};
use crate::domain::value_object::{
    account_password::{AccountPassword, RawPassword},
    email::Email,
};
use crate::error::{AuthError, AuthResult};
use platform::client::DeviceContext;

/// Register input
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Register output
pub struct RegisterOutput {
    pub account: Account,
    pub tokens: TokenPair,
}

/// Register use case
pub struct RegisterUseCase<A, R>
where
    A: AccountRepository,
    R: RefreshTokenRepository,
{
    account_repo: Arc<A>,
    token_service: TokenService<A, R>,
    config: Arc<AuthConfig>,
}

impl<A, R> RegisterUseCase<A, R>
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
        input: RegisterInput,
        device: DeviceContext,
    ) -> AuthResult<RegisterOutput> {
        let email =
            Email::new(&input.email).map_err(|e| AuthError::Validation(e.message().to_string()))?;

        if self.account_repo.exists_by_email(&email).await? {
            return Err(AuthError::UserAlreadyExists);
        }

        // Validate and hash password
        let raw_password = RawPassword::new(input.password)
            .map_err(|e| AuthError::Validation(e.message().to_string()))?;
        let password_hash = AccountPassword::from_raw(&raw_password, self.config.pepper())
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let account = Account::new(email, password_hash, input.first_name, input.last_name);

        // The unique email index backstops the exists check; a racing
        // duplicate insert surfaces as UserAlreadyExists from the repo
        self.account_repo.create(&account).await?;

        let tokens = self
            .token_service
            .issue_pair(account.account_id, &device, None)
            .await?;

        tracing::info!(
            account_id = %account.account_id,
            email = %account.email,
            "Account registered"
        );

        Ok(RegisterOutput { account, tokens })
    }
}
