//! Account Entity
//!
//! Identity, credentials, and lockout state for one registered user.
//! The lockout state machine is embedded here: Active while
//! `locked_until` is unset or elapsed, Locked otherwise. All
//! transitions go through the methods below; unlock is evaluated lazily
//! on access, never by a timer.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{
    account_id::AccountId, account_password::AccountPassword, email::Email,
};

/// Account entity
///
/// Owned exclusively by the auth use cases; mutated only through
/// login-attempt, lockout, and password-change transitions.
#[derive(Debug, Clone)]
pub struct Account {
    /// Account ID (UUID v4)
    pub account_id: AccountId,
    /// Normalized email, unique across accounts
    pub email: Email,
    /// Hashed password
    pub password_hash: AccountPassword,
    /// Optional profile fields
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Consecutive failed login attempts
    pub login_attempts: u16,
    /// Account locked until (temporary lockout after failures)
    pub locked_until: Option<DateTime<Utc>>,
    /// Last successful login
    pub last_login_at: Option<DateTime<Utc>>,
    /// IP of the last successful login
    pub last_login_ip: Option<String>,
    /// When the password was last changed
    pub password_changed_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Maximum login failures before temporary lockout
    pub const MAX_LOGIN_ATTEMPTS: u16 = 5;
    /// Lockout duration in minutes
    pub const LOCKOUT_MINUTES: i64 = 15;

    /// Create a new account
    pub fn new(
        email: Email,
        password_hash: AccountPassword,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            account_id: AccountId::new(),
            email,
            password_hash,
            first_name,
            last_name,
            login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            last_login_ip: None,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account is currently locked
    ///
    /// Must be evaluated fresh on every access (never cached) since
    /// unlock is time-based.
    pub fn is_locked(&self) -> bool {
        if let Some(locked_until) = self.locked_until {
            Utc::now() < locked_until
        } else {
            false
        }
    }

    /// Lazily transition Locked -> Active once the lockout has elapsed
    ///
    /// Clears the attempt counter together with `locked_until` so the
    /// two stay consistent. Returns true if state changed and needs to
    /// be persisted.
    pub fn clear_expired_lockout(&mut self) -> bool {
        match self.locked_until {
            Some(locked_until) if Utc::now() >= locked_until => {
                self.login_attempts = 0;
                self.locked_until = None;
                self.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Record a failed login attempt
    ///
    /// The caller persists this *before* returning the error, so a
    /// retried request cannot bypass lockout accounting.
    pub fn record_failure(&mut self) {
        let now = Utc::now();
        self.login_attempts += 1;
        self.updated_at = now;

        // Lock account after too many failures
        if self.login_attempts >= Self::MAX_LOGIN_ATTEMPTS {
            self.locked_until = Some(now + chrono::Duration::minutes(Self::LOCKOUT_MINUTES));
        }
    }

    /// Record a successful login: reset lockout state, stamp last login
    pub fn record_login(&mut self, ip: Option<String>) {
        let now = Utc::now();
        self.login_attempts = 0;
        self.locked_until = None;
        self.last_login_at = Some(now);
        self.last_login_ip = ip;
        self.updated_at = now;
    }

    /// Replace the password hash and stamp the change time
    pub fn set_password(&mut self, new_password: AccountPassword) {
        let now = Utc::now();
        self.password_hash = new_password;
        self.password_changed_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::account_password::RawPassword;

    fn test_account() -> Account {
        let email = Email::new("user@example.com").unwrap();
        let raw = RawPassword::new("TestPassword123!".to_string()).unwrap();
        let hash = AccountPassword::from_raw(&raw, None).unwrap();
        Account::new(email, hash, None, None)
    }

    #[test]
    fn test_new_account_is_active() {
        let account = test_account();
        assert_eq!(account.login_attempts, 0);
        assert!(account.locked_until.is_none());
        assert!(!account.is_locked());
        assert!(account.last_login_at.is_none());
    }

    #[test]
    fn test_failures_below_threshold_do_not_lock() {
        let mut account = test_account();
        for _ in 0..(Account::MAX_LOGIN_ATTEMPTS - 1) {
            account.record_failure();
        }
        assert_eq!(account.login_attempts, 4);
        assert!(!account.is_locked());
    }

    #[test]
    fn test_fifth_failure_locks() {
        let mut account = test_account();
        for _ in 0..Account::MAX_LOGIN_ATTEMPTS {
            account.record_failure();
        }
        assert!(account.is_locked());

        let locked_until = account.locked_until.unwrap();
        let expected = Utc::now() + chrono::Duration::minutes(Account::LOCKOUT_MINUTES);
        let delta = (expected - locked_until).num_seconds().abs();
        assert!(delta <= 1, "lockout should be ~15 minutes out");
    }

    #[test]
    fn test_lazy_unlock_resets_attempts() {
        let mut account = test_account();
        for _ in 0..Account::MAX_LOGIN_ATTEMPTS {
            account.record_failure();
        }

        // Not elapsed yet: no transition
        assert!(!account.clear_expired_lockout());
        assert!(account.is_locked());

        // Force the lockout into the past
        account.locked_until = Some(Utc::now() - chrono::Duration::seconds(1));
        assert!(account.clear_expired_lockout());
        assert!(!account.is_locked());
        assert_eq!(account.login_attempts, 0);
        assert!(account.locked_until.is_none());
    }

    #[test]
    fn test_successful_login_resets_state() {
        let mut account = test_account();
        account.record_failure();
        account.record_failure();

        account.record_login(Some("192.168.1.1".to_string()));
        assert_eq!(account.login_attempts, 0);
        assert!(account.locked_until.is_none());
        assert!(account.last_login_at.is_some());
        assert_eq!(account.last_login_ip.as_deref(), Some("192.168.1.1"));
    }

    #[test]
    fn test_set_password_stamps_change_time() {
        let mut account = test_account();
        assert!(account.password_changed_at.is_none());

        let raw = RawPassword::new("AnotherPass456#".to_string()).unwrap();
        let hash = AccountPassword::from_raw(&raw, None).unwrap();
        account.set_password(hash);

        assert!(account.password_changed_at.is_some());
        assert!(account.password_hash.verify(&raw, None));
    }
}
