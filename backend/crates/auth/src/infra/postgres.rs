//! PostgreSQL Repository Implementations
//!
//! All cross-instance atomicity lives here: conditional revocation is a
//! single `UPDATE ... WHERE NOT revoked`, the fixed-window counter is
//! one upsert, and the sliding-window sequence runs inside a
//! transaction serialized per key with an advisory lock.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{account::Account, refresh_token::RefreshTokenRecord};
use crate::domain::repository::{AccountRepository, RefreshTokenRepository};
use crate::domain::value_object::{
    account_id::AccountId, account_password::AccountPassword, email::Email,
    token_family::TokenFamily,
};
use crate::error::{AuthError, AuthResult};
use platform::rate_limit::{RateLimitConfig, RateLimitResult, RateLimitStore, RateLimitStrategy};

/// Buckets older than this are swept (well past any configured window)
const STALE_BUCKET_WINDOW_MS: i64 = 3600_000; // 1 hour

/// PostgreSQL-backed account and refresh token repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Account Repository Implementation
// ============================================================================

impl AccountRepository for PgAuthRepository {
    async fn create(&self, account: &Account) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                account_id,
                email,
                password_hash,
                first_name,
                last_name,
                login_attempts,
                locked_until,
                last_login_at,
                last_login_ip,
                password_changed_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(account.account_id.as_uuid())
        .bind(account.email.as_str())
        .bind(account.password_hash.as_phc_string())
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.login_attempts as i16)
        .bind(account.locked_until)
        .bind(account.last_login_at)
        .bind(&account.last_login_ip)
        .bind(account.password_changed_at)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            // Unique email index backstops the pre-insert existence
            // check under concurrent registration
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AuthError::UserAlreadyExists
            }
            _ => AuthError::from(e),
        })?;

        Ok(())
    }

    async fn find_by_id(&self, account_id: &AccountId) -> AuthResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT
                account_id,
                email,
                password_hash,
                first_name,
                last_name,
                login_attempts,
                locked_until,
                last_login_at,
                last_login_ip,
                password_changed_at,
                created_at,
                updated_at
            FROM accounts
            WHERE account_id = $1
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_account()).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT
                account_id,
                email,
                password_hash,
                first_name,
                last_name,
                login_attempts,
                locked_until,
                last_login_at,
                last_login_ip,
                password_changed_at,
                created_at,
                updated_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_account()).transpose()
    }

    async fn exists_by_email(&self, email: &Email) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM accounts WHERE email = $1)",
        )
        .bind(email.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn update(&self, account: &Account) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE accounts SET
                password_hash = $2,
                first_name = $3,
                last_name = $4,
                login_attempts = $5,
                locked_until = $6,
                last_login_at = $7,
                last_login_ip = $8,
                password_changed_at = $9,
                updated_at = $10
            WHERE account_id = $1
            "#,
        )
        .bind(account.account_id.as_uuid())
        .bind(account.password_hash.as_phc_string())
        .bind(&account.first_name)
        .bind(&account.last_name)
        .bind(account.login_attempts as i16)
        .bind(account.locked_until)
        .bind(account.last_login_at)
        .bind(&account.last_login_ip)
        .bind(account.password_changed_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Refresh Token Repository Implementation
// ============================================================================

impl RefreshTokenRepository for PgAuthRepository {
    async fn create(&self, record: &RefreshTokenRecord) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                token_hash,
                account_id,
                family_id,
                expires_at,
                revoked,
                client_ip,
                user_agent,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.token_hash)
        .bind(record.account_id.as_uuid())
        .bind(record.family_id.as_uuid())
        .bind(record.expires_at)
        .bind(record.revoked)
        .bind(&record.client_ip)
        .bind(&record.user_agent)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &[u8]) -> AuthResult<Option<RefreshTokenRecord>> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT
                token_hash,
                account_id,
                family_id,
                expires_at,
                revoked,
                client_ip,
                user_agent,
                created_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_record()))
    }

    async fn revoke_if_active(&self, token_hash: &[u8]) -> AuthResult<bool> {
        // Compare-and-swap on the revoked flag; of two concurrent
        // rotations exactly one sees rows_affected = 1
        let updated = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE token_hash = $1 AND revoked = FALSE",
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    async fn revoke_family(
        &self,
        account_id: &AccountId,
        family_id: &TokenFamily,
    ) -> AuthResult<u64> {
        let revoked = sqlx::query(
            r#"
            UPDATE refresh_tokens SET revoked = TRUE
            WHERE account_id = $1 AND family_id = $2 AND revoked = FALSE
            "#,
        )
        .bind(account_id.as_uuid())
        .bind(family_id.as_uuid())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(revoked)
    }

    async fn revoke_all_for_account(&self, account_id: &AccountId) -> AuthResult<u64> {
        let revoked = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE account_id = $1 AND revoked = FALSE",
        )
        .bind(account_id.as_uuid())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(revoked)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(tokens_deleted = deleted, "Cleaned up expired refresh tokens");

        Ok(deleted)
    }
}

// ============================================================================
// Rate Limit Store Implementation
// ============================================================================

/// PostgreSQL-backed rate limit counter store
#[derive(Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fixed window: one atomic upsert per request on the bucket
    /// `floor(now / window)`; the counter may pass the limit, rejection
    /// happens on the returned value
    async fn record_fixed(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, sqlx::Error> {
        let window_ms = config.window_ms();
        let window_start = (now_ms / window_ms) * window_ms;

        let (count,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO rate_limit_buckets (bucket_key, window_start_ms, request_count)
            VALUES ($1, $2, 1)
            ON CONFLICT (bucket_key, window_start_ms)
            DO UPDATE SET request_count = rate_limit_buckets.request_count + 1
            RETURNING request_count
            "#,
        )
        .bind(key)
        .bind(window_start)
        .fetch_one(&self.pool)
        .await?;

        let count = count as u32;

        Ok(RateLimitResult {
            allowed: count <= config.max_requests,
            limit: config.max_requests,
            remaining: config.max_requests.saturating_sub(count),
            reset_at_ms: window_start + window_ms,
        })
    }

    /// Sliding window: trim, count, and conditionally record inside one
    /// transaction; the per-key advisory lock serializes concurrent
    /// requests so a rejected request is never recorded
    async fn record_sliding(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, sqlx::Error> {
        let window_ms = config.window_ms();
        let cutoff = now_ms - window_ms;

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM rate_limit_events WHERE bucket_key = $1 AND requested_at_ms <= $2")
            .bind(key)
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

        let (count, oldest): (i64, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), MIN(requested_at_ms) FROM rate_limit_events WHERE bucket_key = $1",
        )
        .bind(key)
        .fetch_one(&mut *tx)
        .await?;

        let count = count as u32;

        if count >= config.max_requests {
            tx.commit().await?;
            // Capacity frees up when the oldest recorded request slides
            // out of the window
            let reset_at_ms = oldest.map(|o| o + window_ms).unwrap_or(now_ms + window_ms);
            return Ok(RateLimitResult {
                allowed: false,
                limit: config.max_requests,
                remaining: 0,
                reset_at_ms,
            });
        }

        sqlx::query("INSERT INTO rate_limit_events (bucket_key, requested_at_ms) VALUES ($1, $2)")
            .bind(key)
            .bind(now_ms)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(RateLimitResult {
            allowed: true,
            limit: config.max_requests,
            remaining: config.max_requests - count - 1,
            reset_at_ms: oldest.unwrap_or(now_ms) + window_ms,
        })
    }

    /// Sweep counters no live window can still reference
    pub async fn cleanup_stale(&self) -> Result<u64, sqlx::Error> {
        let cutoff = Utc::now().timestamp_millis() - STALE_BUCKET_WINDOW_MS;

        let buckets = sqlx::query("DELETE FROM rate_limit_buckets WHERE window_start_ms < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let events = sqlx::query("DELETE FROM rate_limit_events WHERE requested_at_ms < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(
            buckets_deleted = buckets,
            events_deleted = events,
            "Cleaned up stale rate limit counters"
        );

        Ok(buckets + events)
    }
}

impl RateLimitStore for PgRateLimitStore {
    async fn check_and_record(
        &self,
        key: &str,
        config: &RateLimitConfig,
    ) -> Result<RateLimitResult, Box<dyn std::error::Error + Send + Sync>> {
        let now_ms = Utc::now().timestamp_millis();

        let result = match config.strategy {
            RateLimitStrategy::FixedWindow => self.record_fixed(key, config, now_ms).await?,
            RateLimitStrategy::SlidingWindow => self.record_sliding(key, config, now_ms).await?,
        };

        Ok(result)
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct AccountRow {
    account_id: Uuid,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    login_attempts: i16,
    locked_until: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
    last_login_ip: Option<String>,
    password_changed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self) -> AuthResult<Account> {
        let password_hash = AccountPassword::from_phc_string(self.password_hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Account {
            account_id: AccountId::from_uuid(self.account_id),
            email: Email::from_db(self.email),
            password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            login_attempts: self.login_attempts as u16,
            locked_until: self.locked_until,
            last_login_at: self.last_login_at,
            last_login_ip: self.last_login_ip,
            password_changed_at: self.password_changed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRow {
    token_hash: Vec<u8>,
    account_id: Uuid,
    family_id: Uuid,
    expires_at: DateTime<Utc>,
    revoked: bool,
    client_ip: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    fn into_record(self) -> RefreshTokenRecord {
        RefreshTokenRecord {
            token_hash: self.token_hash,
            account_id: AccountId::from_uuid(self.account_id),
            family_id: TokenFamily::from_uuid(self.family_id),
            expires_at: self.expires_at,
            revoked: self.revoked,
            client_ip: self.client_ip,
            user_agent: self.user_agent,
            created_at: self.created_at,
        }
    }
}
