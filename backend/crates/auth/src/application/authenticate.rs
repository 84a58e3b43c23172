//! Authenticate Use Case
//!
//! Verifies credentials against the lockout gate and starts a session.
//!
//! The failure paths are ordered deliberately:
//! 1. unknown email burns a dummy hash verification so its latency
//!    matches the wrong-password path (user enumeration resistance);
//! 2. a locked account is rejected before the password is ever checked;
//! 3. a failed password check persists the incremented attempt counter
//!    before the error is returned, so retries cannot bypass lockout
//!    accounting.

use std::sync::{Arc, OnceLock};

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

/// Authenticate input
pub struct AuthenticateInput {
    pub email: String,
    pub password: String,
}

/// Authenticate output
pub struct AuthenticateOutput {
    pub account: Account,
    pub tokens: TokenPair,
}

/// Authenticate use case
pub struct AuthenticateUseCase<A, R>
where
    A: AccountRepository,
    R: RefreshTokenRepository,
{
    account_repo: Arc<A>,
    token_service: TokenService<A, R>,
    config: Arc<AuthConfig>,
}

impl<A, R> AuthenticateUseCase<A, R>
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
        input: AuthenticateInput,
        device: DeviceContext,
    ) -> AuthResult<AuthenticateOutput> {
        let email = Email::new(&input.email).map_err(|_| AuthError::AuthenticationFailed)?;

        // No policy check here: the guess must reach the verifier (and
        // the lockout counter) even if it could never have been set
        let password = RawPassword::for_verification(input.password);

        let Some(mut account) = self.account_repo.find_by_email(&email).await? else {
            dummy_password_check(&password, self.config.pepper());
            return Err(AuthError::AuthenticationFailed);
        };

        if account.clear_expired_lockout() {
            self.account_repo.update(&account).await?;
        }
        if account.is_locked() {
            // Password is never checked while locked
            return Err(AuthError::AccountLocked);
        }

        if !account.password_hash.verify(&password, self.config.pepper()) {
            account.record_failure();
            // Durably persist the counter before surfacing the error
            self.account_repo.update(&account).await?;

            if account.is_locked() {
                tracing::warn!(
                    account_id = %account.account_id,
                    attempts = account.login_attempts,
                    "Account locked after repeated failed logins"
                );
            }
            return Err(AuthError::AuthenticationFailed);
        }

        account.record_login(device.ip_string());
        self.account_repo.update(&account).await?;

        let tokens = self
            .token_service
            .issue_pair(account.account_id, &device, None)
            .await?;

        tracing::info!(
            account_id = %account.account_id,
            "Authentication succeeded"
        );

        Ok(AuthenticateOutput { account, tokens })
    }
}

/// Burn one Argon2 verification against a fixed sentinel hash
///
/// Keeps the unknown-email path's latency in line with the
/// known-email-wrong-password path.
fn dummy_password_check(password: &RawPassword, pepper: Option<&[u8]>) {
    static SENTINEL: OnceLock<AccountPassword> = OnceLock::new();

    let sentinel = SENTINEL.get_or_init(|| {
        let raw = RawPassword::new("Sentinel-Equalizer-7!".to_string())
            .expect("sentinel password satisfies the policy");
        AccountPassword::from_raw(&raw, None).expect("hashing a constant input cannot fail")
    });

    // The result is irrelevant; only the work matters
    let _ = sentinel.verify(password, pepper);
}
