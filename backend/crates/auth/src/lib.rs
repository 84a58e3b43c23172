//! Auth (Authentication / Session Security) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - Database implementations
//!
//! ## Features
//! - Registration and credential authentication with email + password
//! - Brute-force lockout (5 failures, 15 minute lazy-unlock)
//! - Short-lived self-contained access tokens (HS256 JWT)
//! - Opaque refresh tokens with rotation, family lineage, and
//!   reuse (theft) detection with cascading revocation
//! - Per-route sliding/fixed-window rate limiting over a shared store
//!
//! ## Security Model
//! - Passwords hashed with Argon2id (NIST SP 800-63B compliant)
//! - Refresh tokens stored hashed only; rotation is a conditional
//!   update, safe across concurrent service instances
//! - Credential failures are generic; lockout never reveals unlock time
//! - Rate limiter fails open on store faults (availability over
//!   strictness), credential stores fail hard

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;


// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::rate_limit::{RateLimitDecision, RateLimiter, RouteLimits};
pub use application::token::{AccessClaims, TokenPair, TokenService};
pub use application::{AuthenticateUseCase, ChangePasswordUseCase, RegisterUseCase};
pub use error::{AuthError, AuthResult};
pub use infra::postgres::{PgAuthRepository, PgRateLimitStore};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

// Convenience re-exports
pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
}

pub mod store {
    pub use crate::infra::postgres::PgAuthRepository as AuthStore;
    pub use crate::infra::postgres::PgRateLimitStore as RateLimitCounterStore;
}
